use fibre_di::{
  Activation, ActivationError, ContainerBuilder, Error, Factory, Lazy, Module, Resolver, ServiceKey,
};
use pretty_assertions::assert_eq;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

// --- Test Fixtures ---

trait Plugin: Send + Sync {
  fn name(&self) -> &'static str;
}

struct Audit;
impl Plugin for Audit {
  fn name(&self) -> &'static str {
    "audit"
  }
}

struct Metrics;
impl Plugin for Metrics {
  fn name(&self) -> &'static str {
    "metrics"
  }
}

struct Tracing;
impl Plugin for Tracing {
  fn name(&self) -> &'static str {
    "tracing"
  }
}

struct Host {
  plugins: Vec<Arc<dyn Plugin>>,
}

fn plugin_builder() -> ContainerBuilder {
  let mut builder = ContainerBuilder::new();
  builder
    .register_type(|_| Ok(Audit))
    .as_service(|p| p as Arc<dyn Plugin>)
    .single_instance();
  builder
    .register_type(|_| Ok(Metrics))
    .as_service(|p| p as Arc<dyn Plugin>);
  builder
    .register_type(|_| Ok(Tracing))
    .as_service(|p| p as Arc<dyn Plugin>)
    .instance_per_lifetime_scope();
  builder
}

// --- Collection Tests ---

#[test]
fn test_resolve_all_preserves_registration_order() {
  // Arrange
  let container = plugin_builder().build();

  // Act
  let names: Vec<_> = container
    .resolve_all::<dyn Plugin>()
    .unwrap()
    .iter()
    .map(|p| p.name())
    .collect();

  // Assert
  assert_eq!(names, vec!["audit", "metrics", "tracing"]);
  // The last registration is the default.
  assert_eq!(container.resolve::<dyn Plugin>().unwrap().name(), "tracing");
}

#[test]
fn test_resolve_all_honors_each_lifetime() {
  // Arrange
  let container = plugin_builder().build();
  let scope = container.begin_scope().unwrap();

  // Act
  let first = scope.resolve_all::<dyn Plugin>().unwrap();
  let second = scope.resolve_all::<dyn Plugin>().unwrap();

  // Assert
  assert!(Arc::ptr_eq(&first[0], &second[0]), "singleton is shared");
  assert!(!Arc::ptr_eq(&first[1], &second[1]), "transient is fresh");
  assert!(Arc::ptr_eq(&first[2], &second[2]), "per-scope is shared in scope");
}

#[test]
fn test_collection_dependency_and_empty_collection() {
  // Arrange
  let mut builder = plugin_builder();
  builder
    .register_type(|deps| Ok(Host { plugins: deps.all::<dyn Plugin>(0)? }))
    .depends_on_all::<dyn Plugin>();
  let container = builder.build();

  // Act
  let host = container.resolve::<Host>().unwrap();
  let nothing = container.resolve_all::<String>().unwrap();

  // Assert
  assert_eq!(host.plugins.len(), 3);
  assert_eq!(host.plugins[1].name(), "metrics");
  assert!(nothing.is_empty());
}

#[test]
fn test_preserve_existing_defaults() {
  // Arrange
  let mut builder = ContainerBuilder::new();
  builder
    .register_type(|_| Ok(Audit))
    .as_service(|p| p as Arc<dyn Plugin>);
  builder
    .register_type(|_| Ok(Metrics))
    .as_service(|p| p as Arc<dyn Plugin>)
    .preserve_existing_defaults();
  let container = builder.build();

  // Act
  let default = container.resolve::<dyn Plugin>().unwrap();
  let all: Vec<_> = container
    .resolve_all::<dyn Plugin>()
    .unwrap()
    .iter()
    .map(|p| p.name())
    .collect();

  // Assert
  assert_eq!(default.name(), "audit");
  assert_eq!(all, vec!["audit", "metrics"]);
}

#[test]
fn test_registration_served_as_contract_and_self_is_built_once() {
  // Arrange
  let counter = Arc::new(AtomicUsize::new(0));
  let observed = Arc::clone(&counter);
  let mut builder = ContainerBuilder::new();
  builder
    .register_type(move |_| {
      observed.fetch_add(1, Ordering::SeqCst);
      Ok(Audit)
    })
    .as_service(|p| p as Arc<dyn Plugin>)
    .as_self()
    .single_instance();
  let container = builder.build();

  // Act
  let as_plugin = container.resolve::<dyn Plugin>().unwrap();
  let as_audit = container.resolve::<Audit>().unwrap();

  // Assert
  assert_eq!(counter.load(Ordering::SeqCst), 1);
  assert_eq!(
    Arc::as_ptr(&as_plugin) as *const (),
    Arc::as_ptr(&as_audit) as *const ()
  );
}

#[test]
fn test_as_service_alone_hides_the_implementation_type() {
  // Arrange
  let container = plugin_builder().build();

  // Act
  let result = container.resolve::<Audit>();

  // Assert
  assert!(matches!(result, Err(Error::ServiceNotRegistered(_))));
  assert!(container.is_registered(&ServiceKey::of::<dyn Plugin>()));
  assert!(!container.is_registered(&ServiceKey::of::<Audit>()));
}

#[test]
fn test_named_services() {
  // Arrange
  let mut builder = ContainerBuilder::new();
  builder
    .register_type(|_| Ok(Audit))
    .as_named::<dyn Plugin, _>("primary", |p| p as Arc<dyn Plugin>);
  builder
    .register_type(|_| Ok(Metrics))
    .as_named::<dyn Plugin, _>("secondary", |p| p as Arc<dyn Plugin>);
  let container = builder.build();

  // Act
  let primary = container.resolve_named::<dyn Plugin>("primary").unwrap();
  let secondary = container.resolve_named::<dyn Plugin>("secondary").unwrap();
  let unnamed = container.try_resolve::<dyn Plugin>().unwrap();

  // Assert
  assert_eq!(primary.name(), "audit");
  assert_eq!(secondary.name(), "metrics");
  assert!(unnamed.is_none());
}

// --- Delegate and Module Tests ---

#[test]
fn test_delegate_resolves_through_activation() {
  // Arrange
  struct Report {
    title: String,
    plugin: &'static str,
  }
  let mut builder = plugin_builder();
  builder.register_instance(String::from("Quarterly"));
  builder.register_delegate(|activation: &Activation<'_>| {
    let title = activation.resolve::<String>()?;
    let plugin = activation.resolve::<dyn Plugin>()?;
    Ok(Report {
      title: format!("{} for {}", title, activation.key()),
      plugin: plugin.name(),
    })
  });
  let container = builder.build();

  // Act
  let report = container.resolve::<Report>().unwrap();

  // Assert
  assert!(report.title.starts_with("Quarterly for "));
  assert!(report.title.contains("Report"));
  assert_eq!(report.plugin, "tracing");
}

#[test]
fn test_modules_contribute_registrations() {
  // Arrange
  struct PluginModule;
  impl Module for PluginModule {
    fn load(&self, builder: &mut ContainerBuilder) {
      builder
        .register_type(|_| Ok(Audit))
        .as_service(|p| p as Arc<dyn Plugin>);
      builder
        .register_type(|_| Ok(Metrics))
        .as_service(|p| p as Arc<dyn Plugin>);
    }
  }
  let mut builder = ContainerBuilder::new();
  builder.register_module(&PluginModule);
  let container = builder.build();

  // Act
  let plugins = container.resolve_all::<dyn Plugin>().unwrap();

  // Assert
  assert_eq!(plugins.len(), 2);
  assert_eq!(container.resolve::<dyn Plugin>().unwrap().name(), "metrics");
}

// --- Lazy Tests ---

struct Expensive;

struct Consumer {
  expensive: Lazy<Expensive>,
}

#[test]
fn test_lazy_defers_and_memoizes() {
  // Arrange
  let counter = Arc::new(AtomicUsize::new(0));
  let observed = Arc::clone(&counter);
  let mut builder = ContainerBuilder::new();
  builder.register_type(move |_| {
    observed.fetch_add(1, Ordering::SeqCst);
    Ok(Expensive)
  });
  builder
    .register_type(|deps| Ok(Consumer { expensive: deps.lazy::<Expensive>(0)? }))
    .depends_on_lazy::<Expensive>();
  let container = builder.build();

  // Act
  let consumer = container.resolve::<Consumer>().unwrap();
  let before = counter.load(Ordering::SeqCst);
  let created_before = consumer.expensive.is_created();
  let first = consumer.expensive.value().unwrap();
  let second = consumer.expensive.value().unwrap();

  // Assert
  assert_eq!(before, 0);
  assert!(!created_before);
  assert!(consumer.expensive.is_created());
  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lazy_for_unregistered_service_fails_up_front() {
  // Arrange
  let mut builder = ContainerBuilder::new();
  builder
    .register_type(|deps| Ok(Consumer { expensive: deps.lazy::<Expensive>(0)? }))
    .depends_on_lazy::<Expensive>();
  let container = builder.build();

  // Act
  let direct = container.resolve_lazy::<Expensive>();
  let nested = container.resolve::<Consumer>();

  // Assert
  assert!(matches!(direct, Err(Error::ServiceNotRegistered(_))));
  match nested {
    Err(Error::ServiceNotRegistered(key)) => assert_eq!(key, ServiceKey::of::<Expensive>()),
    other => panic!("unexpected result: {:?}", other.map(|_| ())),
  }
}

#[test]
fn test_lazy_edge_breaks_a_construction_cycle() {
  // Arrange
  struct Parent {
    child: Lazy<Child>,
  }
  struct Child {
    parent: Arc<Parent>,
  }
  let mut builder = ContainerBuilder::new();
  builder
    .register_type(|deps| Ok(Parent { child: deps.lazy::<Child>(0)? }))
    .depends_on_lazy::<Child>()
    .instance_per_lifetime_scope();
  builder
    .register_type(|deps| Ok(Child { parent: deps.get::<Parent>(0)? }))
    .depends_on::<Parent>();
  let container = builder.build();
  let scope = container.begin_scope().unwrap();

  // Act
  let parent = scope.resolve::<Parent>().unwrap();
  let child = parent.child.value().unwrap();

  // Assert
  assert!(Arc::ptr_eq(&child.parent, &parent));
}

// --- Factory Tests ---

struct Config {
  prefix: &'static str,
}

struct DomainObject {
  value: i32,
  label: String,
}

struct Builder {
  make: Factory<i32, DomainObject>,
}

fn factory_container() -> fibre_di::Container {
  let mut builder = ContainerBuilder::new();
  builder.register_instance(Config { prefix: "obj" });
  builder
    .register_parameterized(|value: i32, deps| {
      let config = deps.get::<Config>(0)?;
      Ok(DomainObject {
        value,
        label: format!("{}-{}", config.prefix, value),
      })
    })
    .depends_on::<Config>();
  builder
    .register_type(|deps| Ok(Builder { make: deps.factory::<i32, DomainObject>(0)? }))
    .depends_on_factory::<DomainObject>();
  builder.build()
}

#[test]
fn test_factory_builds_fresh_instances_from_arguments() {
  // Arrange
  let container = factory_container();
  let builder = container.resolve::<Builder>().unwrap();

  // Act
  let five = builder.make.create(5).unwrap();
  let six = builder.make.create(6).unwrap();
  let five_again = builder.make.create(5).unwrap();

  // Assert
  assert_eq!(five.value, 5);
  assert_eq!(five.label, "obj-5");
  assert_eq!(six.label, "obj-6");
  assert!(!Arc::ptr_eq(&five, &five_again));
}

#[test]
fn test_factory_argument_type_is_checked_at_call_time() {
  // Arrange
  let container = factory_container();
  let wrong = container.resolve_factory::<String, DomainObject>().unwrap();

  // Act
  let result = wrong.create(String::from("five"));

  // Assert
  match result {
    Err(Error::ActivationFailure { key, source }) => {
      assert_eq!(key, ServiceKey::of::<DomainObject>());
      assert_eq!(
        source.downcast_ref::<ActivationError>(),
        Some(&ActivationError::ArgumentMismatch {
          expected: std::any::type_name::<i32>(),
          found: std::any::type_name::<String>(),
        })
      );
    }
    other => panic!("unexpected result: {:?}", other.map(|_| ())),
  }
}

#[test]
fn test_parameterized_service_cannot_be_resolved_directly() {
  // Arrange
  let container = factory_container();

  // Act
  let result = container.resolve::<DomainObject>();

  // Assert
  match result {
    Err(Error::ActivationFailure { source, .. }) => {
      assert!(matches!(
        source.downcast_ref::<ActivationError>(),
        Some(ActivationError::ArgumentRequired { .. })
      ));
    }
    other => panic!("unexpected result: {:?}", other.map(|_| ())),
  }
}

#[test]
fn test_unit_factory_fronts_an_ordinary_registration() {
  // Arrange
  let container = plugin_builder().build();
  let scope = container.begin_scope().unwrap();
  let factory = scope.resolve_factory::<(), dyn Plugin>().unwrap();

  // Act
  let a = factory.create(()).unwrap();
  let b = factory.create(()).unwrap();

  // Assert
  // The default plugin is per-scope, so the factory honors that lifetime.
  assert_eq!(a.name(), "tracing");
  assert!(Arc::ptr_eq(&a, &b));
}
