use fibre_di::{resolve, ContainerBuilder, Resolver};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// 1. Define the abstraction (the trait)
trait Log: Send + Sync {
  fn write(&self, message: &str);
}

// 2. Define a concrete implementation
struct ConsoleLog;
impl Log for ConsoleLog {
  fn write(&self, message: &str) {
    println!("[CONSOLE LOG]: {}", message);
  }
}

// 3. Services that depend on the abstraction and on each other
struct Engine {
  log: Arc<dyn Log>,
}

struct Car {
  engine: Arc<Engine>,
}

impl Car {
  fn drive(&self) {
    self.engine.log.write("Engine started.");
  }
}

fn main() {
  // RUST_LOG=fibre_di=trace shows every activation and cache hit.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  // --- Registration ---
  let mut builder = ContainerBuilder::new();

  // One log for the whole application, served as `dyn Log`.
  builder
    .register_type(|_| Ok(ConsoleLog))
    .as_service(|log| log as Arc<dyn Log>)
    .single_instance();

  // One engine per lifetime scope.
  builder
    .register_type(|deps| Ok(Engine { log: deps.get::<dyn Log>(0)? }))
    .depends_on::<dyn Log>()
    .instance_per_lifetime_scope();

  // A new car every time.
  builder
    .register_type(|deps| Ok(Car { engine: deps.get::<Engine>(0)? }))
    .depends_on::<Engine>();

  let container = builder.build();

  // --- Resolution and Usage ---
  for trip in 1..=2 {
    let scope = container.begin_scope_tagged("trip").expect("container is open");
    let first = resolve!(scope, Car);
    let second = resolve!(scope, Car);
    println!(
      "Trip {}: two cars share one engine: {}",
      trip,
      Arc::ptr_eq(&first.engine, &second.engine)
    );
    first.drive();
    // The scope closes here, releasing its engine.
  }

  let log = container.resolve::<dyn Log>().expect("log is registered");
  log.write("All trips finished.");
}
