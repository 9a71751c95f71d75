use fibre_di::{ContainerBuilder, Dispose, Factory, Lazy, Resolver};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// A connection that must be released when its unit of work ends.
struct Connection {
  id: u32,
}

impl Dispose for Connection {
  fn dispose(&self) {
    println!("[CONNECTION {}]: closed", self.id);
  }
}

// Built per call from a caller-supplied title.
struct Report {
  title: String,
  connection: Arc<Connection>,
}

// Expensive to build, and not every run needs it.
struct Archive;

struct ReportService {
  reports: Factory<String, Report>,
  archive: Lazy<Archive>,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut builder = ContainerBuilder::new();
  builder
    .register_type(|_| Ok(Connection { id: 7 }))
    .instance_per_lifetime_scope()
    .disposable();
  builder
    .register_parameterized(|title: String, deps| {
      Ok(Report {
        title,
        connection: deps.get::<Connection>(0)?,
      })
    })
    .depends_on::<Connection>();
  builder.register_type(|_| {
    println!("[ARCHIVE]: warming up");
    Ok(Archive)
  });
  builder
    .register_type(|deps| {
      Ok(ReportService {
        reports: deps.factory::<String, Report>(0)?,
        archive: deps.lazy::<Archive>(1)?,
      })
    })
    .depends_on_factory::<Report>()
    .depends_on_lazy::<Archive>()
    .instance_per_lifetime_scope();
  let container = builder.build();

  {
    let unit_of_work = container.begin_scope_tagged("unit-of-work").expect("container is open");
    let service = unit_of_work
      .resolve::<ReportService>()
      .expect("report service is registered");

    for title in ["Sales", "Inventory"] {
      match service.reports.create(title.to_string()) {
        Ok(report) => println!(
          "[REPORT]: '{}' on connection {}",
          report.title, report.connection.id
        ),
        Err(error) => eprintln!("[REPORT]: failed: {}", error),
      }
    }

    println!("[ARCHIVE]: created yet? {}", service.archive.is_created());
    if service.archive.value().is_ok() {
      println!("[ARCHIVE]: created yet? {}", service.archive.is_created());
    }
    // Leaving the block disposes the connection.
  }

  println!("Done.");
}
