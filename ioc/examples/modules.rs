use fibre_di::{ContainerBuilder, Error, Instance, Module, Resolver, TypeArgs};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

// Contract marker for "a store keyed by T".
struct StoreOf;

#[derive(Default)]
struct Store<K> {
  entries: Mutex<HashMap<K, String>>,
}

trait Notifier: Send + Sync {
  fn notify(&self, message: &str);
}

struct Email;
impl Notifier for Email {
  fn notify(&self, message: &str) {
    println!("[EMAIL]: {}", message);
  }
}

struct Sms;
impl Notifier for Sms {
  fn notify(&self, message: &str) {
    println!("[SMS]: {}", message);
  }
}

struct StorageModule;

impl Module for StorageModule {
  fn load(&self, builder: &mut ContainerBuilder) {
    builder
      .register_open_generic::<StoreOf, _>(|args, _| {
        if args.is::<u64>(0) {
          Ok(Instance::from_value(Store::<u64>::default()))
        } else if args.is::<String>(0) {
          Ok(Instance::from_value(Store::<String>::default()))
        } else {
          Err(format!("no store for keys of {}", args).into())
        }
      })
      .single_instance();
  }
}

struct NotificationModule;

impl Module for NotificationModule {
  fn load(&self, builder: &mut ContainerBuilder) {
    builder
      .register_type(|_| Ok(Email))
      .as_service(|n| n as Arc<dyn Notifier>);
    builder
      .register_type(|_| Ok(Sms))
      .as_service(|n| n as Arc<dyn Notifier>);
  }
}

fn main() -> Result<(), Error> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut builder = ContainerBuilder::new();
  builder
    .register_module(&StorageModule)
    .register_module(&NotificationModule);
  let container = builder.build();

  let users = container.resolve_generic::<StoreOf, Store<u64>>(TypeArgs::of::<u64>())?;
  users
    .entries
    .lock()
    .expect("store lock poisoned")
    .insert(1, "ada".to_string());

  let same = container.resolve_generic::<StoreOf, Store<u64>>(TypeArgs::of::<u64>())?;
  println!("Store<u64> is a singleton: {}", Arc::ptr_eq(&users, &same));

  for notifier in container.resolve_all::<dyn Notifier>()? {
    notifier.notify("a user was added");
  }

  match container.resolve_generic::<StoreOf, Store<bool>>(TypeArgs::of::<bool>()) {
    Ok(_) => println!("unexpected store"),
    Err(error) => println!("As expected: {}", error),
  }

  Ok(())
}
