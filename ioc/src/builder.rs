//! Registration API: the `ContainerBuilder` and its fluent per-registration builders.

use crate::activator::Activation;
use crate::catalog::Catalog;
use crate::container::Container;
use crate::error::BoxError;
use crate::instance::{Dependencies, Dispose, Instance};
use crate::key::{ServiceKey, TypeArg, TypeArgs};
use crate::options::ContainerOptions;
use crate::registration::{
  identity_caster, Caster, Dependency, Disposer, Lifetime, OpenFactoryFn, OpenRegistration,
  Registration, Strategy,
};
use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

/// A reusable group of registrations.
///
/// ```
/// use fibre_di::{ContainerBuilder, Module, Resolver};
///
/// struct Repository;
///
/// struct StorageModule;
///
/// impl Module for StorageModule {
///   fn load(&self, builder: &mut ContainerBuilder) {
///     builder.register_type(|_| Ok(Repository)).single_instance();
///   }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_module(&StorageModule);
/// let container = builder.build();
/// assert!(container.resolve::<Repository>().is_ok());
/// ```
pub trait Module {
  fn load(&self, builder: &mut ContainerBuilder);
}

struct PendingRegistration {
  implementation: &'static str,
  self_service: (ServiceKey, Caster),
  services: Vec<(ServiceKey, Caster)>,
  lifetime: Option<Lifetime>,
  dependencies: Vec<Dependency>,
  strategy: Strategy,
  disposer: Option<Disposer>,
  preserve_existing: bool,
}

struct PendingOpen {
  implementation: &'static str,
  definition: ServiceKey,
  lifetime: Option<Lifetime>,
  arity: usize,
  dependencies: Vec<Dependency>,
  factory: OpenFactoryFn,
  disposer: Option<Disposer>,
  preserve_existing: bool,
}

/// Collects registrations, then freezes them into a [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
  options: ContainerOptions,
  pending: Vec<PendingRegistration>,
  open: Vec<PendingOpen>,
}

impl ContainerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_options(mut self, options: ContainerOptions) -> Self {
    self.options = options;
    self
  }

  pub fn options_mut(&mut self) -> &mut ContainerOptions {
    &mut self.options
  }

  // --- PRIVATE HELPERS ---

  fn push<T: Send + Sync + 'static>(
    &mut self,
    strategy: Strategy,
    lifetime: Option<Lifetime>,
  ) -> RegistrationBuilder<'_, T> {
    self.pending.push(PendingRegistration {
      implementation: type_name::<T>(),
      self_service: (ServiceKey::of::<T>(), identity_caster()),
      services: Vec::new(),
      lifetime,
      dependencies: Vec::new(),
      strategy,
      disposer: None,
      preserve_existing: false,
    });
    let index = self.pending.len() - 1;
    RegistrationBuilder {
      pending: &mut self.pending[index],
      _marker: PhantomData,
    }
  }

  // --- PUBLIC API ---

  /// Registers `T`, built by `constructor` from the dependencies declared
  /// with the `depends_on*` methods, in declaration order.
  ///
  /// Unless `as_service`/`as_named` is called, `T` is served as itself.
  pub fn register_type<T, F>(&mut self, constructor: F) -> RegistrationBuilder<'_, T>
  where
    T: Send + Sync + 'static,
    F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let construct = move |activation: &Activation<'_>| {
      constructor(activation.dependencies()).map(Instance::from_value)
    };
    self.push::<T>(Strategy::Construct(Arc::new(construct)), None)
  }

  /// Registers `T` built by a delegate that resolves what it needs through the
  /// [`Activation`] it receives.
  pub fn register_delegate<T, F>(&mut self, delegate: F) -> RegistrationBuilder<'_, T>
  where
    T: Send + Sync + 'static,
    F: Fn(&Activation<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let construct =
      move |activation: &Activation<'_>| delegate(activation).map(Instance::from_value);
    self.push::<T>(Strategy::Construct(Arc::new(construct)), None)
  }

  /// Registers `T` whose construction needs an argument of type `A` known only
  /// at call time. Consumers obtain a [`crate::Factory<A, T>`] and call it.
  pub fn register_parameterized<A, T, F>(&mut self, constructor: F) -> RegistrationBuilder<'_, T>
  where
    A: Send + 'static,
    T: Send + Sync + 'static,
    F: Fn(A, &Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let build = move |value: Box<dyn Any + Send>, activation: &Activation<'_>| -> Result<Instance, BoxError> {
      let argument = value
        .downcast::<A>()
        .map_err(|_| BoxError::from(format!("expected an argument of type {}", type_name::<A>())))?;
      constructor(*argument, activation.dependencies()).map(Instance::from_value)
    };
    self.push::<T>(
      Strategy::Parameterized {
        argument: TypeArg::of::<A>(),
        build: Arc::new(build),
      },
      None,
    )
  }

  /// Registers an already-built value as a singleton. The container never
  /// disposes it unless `disposable` is requested explicitly.
  pub fn register_instance<T: Send + Sync + 'static>(&mut self, value: T) -> RegistrationBuilder<'_, T> {
    let value = Arc::new(value);
    let construct = move |_: &Activation<'_>| Ok::<_, BoxError>(Instance::new(Arc::clone(&value)));
    self.push::<T>(
      Strategy::Construct(Arc::new(construct)),
      Some(Lifetime::SingleInstance),
    )
  }

  /// Registers an open-generic implementation for the contract marker `C`.
  ///
  /// The factory receives the type arguments of each requested closed key
  /// (for example `i32` in `ServiceKey::generic::<C>(TypeArgs::of::<i32>())`)
  /// and returns the instance for that closing. Each distinct argument list is
  /// closed once into its own registration. Only requests with exactly one
  /// type argument match unless [`OpenGenericBuilder::arity`] says otherwise.
  pub fn register_open_generic<C, F>(&mut self, factory: F) -> OpenGenericBuilder<'_>
  where
    C: ?Sized + 'static,
    F: Fn(&TypeArgs, &Activation<'_>) -> Result<Instance, BoxError> + Send + Sync + 'static,
  {
    self.open.push(PendingOpen {
      implementation: type_name::<C>(),
      definition: ServiceKey::generic::<C>(TypeArgs::new()),
      lifetime: None,
      arity: 1,
      dependencies: Vec::new(),
      factory: Arc::new(factory),
      disposer: None,
      preserve_existing: false,
    });
    let index = self.open.len() - 1;
    OpenGenericBuilder {
      pending: &mut self.open[index],
    }
  }

  pub fn register_module<M: Module + ?Sized>(&mut self, module: &M) -> &mut Self {
    module.load(self);
    self
  }

  /// Freezes the catalog and returns the container owning the root scope.
  pub fn build(self) -> Container {
    let default_lifetime = self.options.default_lifetime;
    let registrations = self
      .pending
      .into_iter()
      .enumerate()
      .map(|(id, pending)| {
        let services = if pending.services.is_empty() {
          vec![pending.self_service]
        } else {
          pending.services
        };
        Registration {
          id: id as u64,
          implementation: pending.implementation,
          services,
          lifetime: pending.lifetime.unwrap_or(default_lifetime),
          dependencies: pending.dependencies,
          strategy: pending.strategy,
          disposer: pending.disposer,
          preserve_existing: pending.preserve_existing,
        }
      })
      .collect();
    let open = self
      .open
      .into_iter()
      .map(|pending| OpenRegistration {
        implementation: pending.implementation,
        definition: pending.definition,
        lifetime: pending.lifetime.unwrap_or(default_lifetime),
        arity: pending.arity,
        dependencies: pending.dependencies,
        factory: pending.factory,
        disposer: pending.disposer,
        preserve_existing: pending.preserve_existing,
      })
      .collect();
    Container::new(Catalog::new(registrations, open), self.options)
  }
}

/// Fluent configuration of one registration of implementation `T`.
pub struct RegistrationBuilder<'a, T> {
  pending: &'a mut PendingRegistration,
  _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Send + Sync + 'static> RegistrationBuilder<'a, T> {
  fn serve(self, key: ServiceKey, caster: Caster) -> Self {
    self.pending.services.retain(|(existing, _)| *existing != key);
    self.pending.services.push((key, caster));
    self
  }

  /// Serves the instance as `S`, typically a trait object:
  /// `.as_service(|log| log as Arc<dyn Log>)`.
  pub fn as_service<S, C>(self, cast: C) -> Self
  where
    S: ?Sized + Send + Sync + 'static,
    C: Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static,
  {
    self.serve(ServiceKey::of::<S>(), service_caster(cast))
  }

  /// Serves the instance as `S` under `name`.
  pub fn as_named<S, C>(self, name: &str, cast: C) -> Self
  where
    S: ?Sized + Send + Sync + 'static,
    C: Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static,
  {
    self.serve(ServiceKey::named::<S>(name), service_caster(cast))
  }

  /// Also serves the instance as `T` itself.
  pub fn as_self(self) -> Self {
    let (key, caster) = self.pending.self_service.clone();
    self.serve(key, caster)
  }

  pub fn depends_on<S: ?Sized + 'static>(self) -> Self {
    self.depends_on_key(Dependency::Service(ServiceKey::of::<S>()))
  }

  pub fn depends_on_named<S: ?Sized + 'static>(self, name: &str) -> Self {
    self.depends_on_key(Dependency::Service(ServiceKey::named::<S>(name)))
  }

  pub fn depends_on_all<S: ?Sized + 'static>(self) -> Self {
    self.depends_on_key(Dependency::All(ServiceKey::of::<S>()))
  }

  pub fn depends_on_lazy<S: ?Sized + 'static>(self) -> Self {
    self.depends_on_key(Dependency::Lazy(ServiceKey::of::<S>()))
  }

  pub fn depends_on_factory<S: ?Sized + 'static>(self) -> Self {
    self.depends_on_key(Dependency::Factory(ServiceKey::of::<S>()))
  }

  pub fn depends_on_key(self, dependency: Dependency) -> Self {
    self.pending.dependencies.push(dependency);
    self
  }

  pub fn lifetime(self, lifetime: Lifetime) -> Self {
    self.pending.lifetime = Some(lifetime);
    self
  }

  pub fn single_instance(self) -> Self {
    self.lifetime(Lifetime::SingleInstance)
  }

  pub fn instance_per_lifetime_scope(self) -> Self {
    self.lifetime(Lifetime::InstancePerLifetimeScope)
  }

  pub fn instance_per_dependency(self) -> Self {
    self.lifetime(Lifetime::Transient)
  }

  /// Keeps an earlier default for the same keys; this registration is still
  /// part of every "all implementations" request.
  pub fn preserve_existing_defaults(self) -> Self {
    self.pending.preserve_existing = true;
    self
  }

  /// Runs `release` on each instance when the scope that created it closes.
  pub fn on_release<R>(self, release: R) -> Self
  where
    R: Fn(&T) + Send + Sync + 'static,
  {
    let disposer = move |instance: &Instance| {
      if let Some(value) = instance.downcast::<T>() {
        release(&value);
      }
    };
    self.pending.disposer = Some(Arc::new(disposer));
    self
  }
}

impl<'a, T: Dispose + 'static> RegistrationBuilder<'a, T> {
  /// Tracks instances for [`Dispose::dispose`] when their scope closes.
  pub fn disposable(self) -> Self {
    self.on_release(|value: &T| value.dispose())
  }
}

fn service_caster<T, S, C>(cast: C) -> Caster
where
  T: Send + Sync + 'static,
  S: ?Sized + Send + Sync + 'static,
  C: Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static,
{
  Arc::new(move |instance: &Instance| instance.downcast::<T>().map(|value| Instance::new(cast(value))))
}

/// Fluent configuration of one open-generic registration.
pub struct OpenGenericBuilder<'a> {
  pending: &'a mut PendingOpen,
}

impl<'a> OpenGenericBuilder<'a> {
  /// Serves the contract under `name` (requests must carry the same name).
  pub fn named(self, name: &str) -> Self {
    self.pending.definition = self.pending.definition.clone().with_name(name);
    self
  }

  /// Number of type parameters of the contract. A request with any other
  /// number of type arguments does not match this registration.
  pub fn arity(self, arity: usize) -> Self {
    self.pending.arity = arity;
    self
  }

  pub fn depends_on<S: ?Sized + 'static>(self) -> Self {
    self.depends_on_key(Dependency::Service(ServiceKey::of::<S>()))
  }

  pub fn depends_on_key(self, dependency: Dependency) -> Self {
    self.pending.dependencies.push(dependency);
    self
  }

  pub fn lifetime(self, lifetime: Lifetime) -> Self {
    self.pending.lifetime = Some(lifetime);
    self
  }

  pub fn single_instance(self) -> Self {
    self.lifetime(Lifetime::SingleInstance)
  }

  pub fn instance_per_lifetime_scope(self) -> Self {
    self.lifetime(Lifetime::InstancePerLifetimeScope)
  }

  pub fn instance_per_dependency(self) -> Self {
    self.lifetime(Lifetime::Transient)
  }

  pub fn preserve_existing_defaults(self) -> Self {
    self.pending.preserve_existing = true;
    self
  }

  /// Runs `release` on each closed instance when the scope that created it
  /// closes. The instance is the one the factory returned.
  pub fn on_release<R>(self, release: R) -> Self
  where
    R: Fn(&Instance) + Send + Sync + 'static,
  {
    self.pending.disposer = Some(Arc::new(release));
    self
  }
}
