use fibre_di::{Container, ContainerBuilder, Error, Instance, Resolver, ServiceKey, TypeArgs};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Mutex,
};

// --- Test Fixtures ---

/// Contract marker for "a repository of T".
struct RepositoryOf;

#[derive(Default)]
struct Repository<T> {
  items: Mutex<Vec<T>>,
}

struct Clock {
  now: u64,
}

struct Stamped<T> {
  at: u64,
  _marker: std::marker::PhantomData<T>,
}

fn repository_container(closings: &Arc<AtomicUsize>) -> Container {
  let closings = Arc::clone(closings);
  let mut builder = ContainerBuilder::new();
  builder
    .register_open_generic::<RepositoryOf, _>(move |args, _| {
      closings.fetch_add(1, Ordering::SeqCst);
      if args.is::<i32>(0) {
        Ok(Instance::from_value(Repository::<i32>::default()))
      } else if args.is::<String>(0) {
        Ok(Instance::from_value(Repository::<String>::default()))
      } else {
        Err(format!("no repository for {}", args).into())
      }
    })
    .single_instance();
  builder.build()
}

// --- Open Generic Tests ---

#[test]
fn test_each_closing_is_distinct_and_honors_lifetime() {
  // Arrange
  let closings = Arc::new(AtomicUsize::new(0));
  let container = repository_container(&closings);

  // Act
  let ints = container
    .resolve_generic::<RepositoryOf, Repository<i32>>(TypeArgs::of::<i32>())
    .unwrap();
  let ints_again = container
    .resolve_generic::<RepositoryOf, Repository<i32>>(TypeArgs::of::<i32>())
    .unwrap();
  let strings = container
    .resolve_generic::<RepositoryOf, Repository<String>>(TypeArgs::of::<String>())
    .unwrap();
  ints.items.lock().unwrap().push(7);
  strings.items.lock().unwrap().push("seven".to_string());

  // Assert
  assert!(Arc::ptr_eq(&ints, &ints_again));
  assert_eq!(*ints_again.items.lock().unwrap(), vec![7]);
  assert_eq!(strings.items.lock().unwrap().len(), 1);
  assert_eq!(closings.load(Ordering::SeqCst), 2);
}

#[test]
fn test_transient_closings_are_independent() {
  // Arrange
  struct ListOf;
  let mut builder = ContainerBuilder::new();
  builder.register_open_generic::<ListOf, _>(|args, _| {
    if args.is::<i32>(0) {
      Ok(Instance::from_value(Mutex::new(Vec::<i32>::new())))
    } else if args.is::<String>(0) {
      Ok(Instance::from_value(Mutex::new(Vec::<String>::new())))
    } else {
      Err(format!("no list of {}", args).into())
    }
  });
  let container = builder.build();
  let scope = container.begin_scope().unwrap();

  // Act
  let ints = scope
    .resolve_generic::<ListOf, Mutex<Vec<i32>>>(TypeArgs::of::<i32>())
    .unwrap();
  let more_ints = scope
    .resolve_generic::<ListOf, Mutex<Vec<i32>>>(TypeArgs::of::<i32>())
    .unwrap();
  let strings = scope
    .resolve_generic::<ListOf, Mutex<Vec<String>>>(TypeArgs::of::<String>())
    .unwrap();
  ints.lock().unwrap().push(1);
  ints.lock().unwrap().push(2);
  more_ints.lock().unwrap().push(3);
  strings.lock().unwrap().push("a".to_string());

  // Assert
  assert!(!Arc::ptr_eq(&ints, &more_ints));
  assert_eq!(*ints.lock().unwrap(), vec![1, 2]);
  assert_eq!(*more_ints.lock().unwrap(), vec![3]);
  assert_eq!(*strings.lock().unwrap(), vec!["a".to_string()]);
}

#[test]
fn test_unsupported_closing_fails_to_activate() {
  // Arrange
  let closings = Arc::new(AtomicUsize::new(0));
  let container = repository_container(&closings);
  let key = ServiceKey::generic::<RepositoryOf>(TypeArgs::of::<u8>());

  // Act
  let result = container.resolve_as::<Repository<u8>>(&key);

  // Assert
  match result {
    Err(Error::ActivationFailure { key: failed, source }) => {
      assert_eq!(failed, key);
      assert_eq!(source.to_string(), "no repository for <u8>");
    }
    other => panic!("unexpected result: {:?}", other.map(|_| ())),
  }
}

#[test]
fn test_open_shape_and_unknown_contracts_are_not_registered() {
  // Arrange
  struct CacheOf;
  let closings = Arc::new(AtomicUsize::new(0));
  let container = repository_container(&closings);

  // Act
  let open = container.resolve_generic::<RepositoryOf, Repository<i32>>(TypeArgs::new());
  let other = container.resolve_generic::<CacheOf, Repository<i32>>(TypeArgs::of::<i32>());

  // Assert
  assert!(matches!(open, Err(Error::ServiceNotRegistered(_))));
  assert!(matches!(other, Err(Error::ServiceNotRegistered(_))));
  assert!(container.is_registered(&ServiceKey::generic::<RepositoryOf>(TypeArgs::of::<i32>())));
  assert_eq!(closings.load(Ordering::SeqCst), 0);
}

#[test]
fn test_wrong_view_of_a_closing_is_a_type_mismatch() {
  // Arrange
  let closings = Arc::new(AtomicUsize::new(0));
  let container = repository_container(&closings);

  // Act
  let result =
    container.resolve_generic::<RepositoryOf, Repository<String>>(TypeArgs::of::<i32>());

  // Assert
  assert!(matches!(result, Err(Error::ActivationFailure { .. })));
}

#[test]
fn test_closings_resolve_their_dependencies() {
  // Arrange
  struct StampedOf;
  let mut builder = ContainerBuilder::new();
  builder.register_instance(Clock { now: 42 });
  builder
    .register_open_generic::<StampedOf, _>(|args, activation| {
      let clock = activation.dependencies().get::<Clock>(0)?;
      if args.is::<String>(0) {
        Ok(Instance::from_value(Stamped::<String> {
          at: clock.now,
          _marker: std::marker::PhantomData,
        }))
      } else {
        Err(format!("cannot stamp {}", args).into())
      }
    })
    .depends_on::<Clock>();
  let container = builder.build();
  let scope = container.begin_scope().unwrap();

  // Act
  let stamped = scope
    .resolve_generic::<StampedOf, Stamped<String>>(TypeArgs::of::<String>())
    .unwrap();

  // Assert
  assert_eq!(stamped.at, 42);
}

#[test]
fn test_named_open_generic_and_multiple_arguments() {
  // Arrange
  struct PairOf;
  let mut builder = ContainerBuilder::new();
  builder
    .register_open_generic::<PairOf, _>(|args, _| {
      let names: Vec<_> = args.iter().map(|arg| arg.name()).collect();
      Ok(Instance::from_value(names.join(",")))
    })
    .arity(2)
    .named("pairs");
  let container = builder.build();
  let args = TypeArgs::of::<i32>().with::<bool>();
  let named = ServiceKey::generic::<PairOf>(args.clone()).with_name("pairs");
  let unnamed = ServiceKey::generic::<PairOf>(args);

  // Act
  let joined = container.resolve_as::<String>(&named).unwrap();
  let missing = container.try_resolve_as::<String>(&unnamed).unwrap();

  // Assert
  assert_eq!(*joined, "i32,bool");
  assert!(missing.is_none());
}

#[test]
fn test_all_implementations_of_a_closed_contract() {
  // Arrange
  struct HandlerOf;
  let mut builder = ContainerBuilder::new();
  builder.register_open_generic::<HandlerOf, _>(|args, _| {
    Ok(Instance::from_value(format!("logging{}", args)))
  });
  builder.register_open_generic::<HandlerOf, _>(|args, _| {
    Ok(Instance::from_value(format!("auditing{}", args)))
  });
  let container = builder.build();
  let key = ServiceKey::generic::<HandlerOf>(TypeArgs::of::<u32>());

  // Act
  let all: Vec<String> = container
    .resolve_all_keys(&key)
    .unwrap()
    .iter()
    .map(|instance| (*instance.downcast::<String>().unwrap()).clone())
    .collect();
  let default = container.resolve_as::<String>(&key).unwrap();

  // Assert
  assert_eq!(all, vec!["logging<u32>".to_string(), "auditing<u32>".to_string()]);
  assert_eq!(*default, "auditing<u32>");
}

#[test]
fn test_argument_count_must_match_the_arity() {
  // Arrange
  let closings = Arc::new(AtomicUsize::new(0));
  let container = repository_container(&closings);
  let two = ServiceKey::generic::<RepositoryOf>(TypeArgs::of::<i32>().with::<u8>());

  // Act
  let resolved = container.resolve_as::<Repository<i32>>(&two);
  let optional = container.try_resolve_as::<Repository<i32>>(&two).unwrap();
  let all = container.resolve_all_keys(&two).unwrap();

  // Assert
  assert!(matches!(resolved, Err(Error::ServiceNotRegistered(key)) if key == two));
  assert!(optional.is_none());
  assert!(all.is_empty());
  assert!(!container.is_registered(&two));
  assert_eq!(closings.load(Ordering::SeqCst), 0);
}

#[test]
fn test_released_closings_run_when_their_scope_closes() {
  // Arrange
  struct BufferOf;
  let released = Arc::new(Mutex::new(Vec::<String>::new()));
  let observed = Arc::clone(&released);
  let mut builder = ContainerBuilder::new();
  builder
    .register_open_generic::<BufferOf, _>(|args, _| Ok(Instance::from_value(format!("buffer{}", args))))
    .instance_per_lifetime_scope()
    .on_release(move |instance| {
      if let Some(name) = instance.downcast::<String>() {
        observed.lock().unwrap().push((*name).clone());
      }
    });
  let container = builder.build();
  let scope = container.begin_scope().unwrap();

  // Act
  let first = scope
    .resolve_generic::<BufferOf, String>(TypeArgs::of::<u8>())
    .unwrap();
  let again = scope
    .resolve_generic::<BufferOf, String>(TypeArgs::of::<u8>())
    .unwrap();
  let before_close = released.lock().unwrap().len();
  scope.close();

  // Assert
  assert!(Arc::ptr_eq(&first, &again));
  assert_eq!(before_close, 0);
  assert_eq!(*released.lock().unwrap(), vec!["buffer<u8>".to_string()]);
}
