//! # Fibre DI
//!
//! A thread-safe dependency-injection container built around lifetime scopes.
//!
//! Services are registered once on a [`ContainerBuilder`] and frozen into a
//! [`Container`]. Resolution then walks a tree of [`LifetimeScope`]s: the
//! container owns the root, and each child scope caches its own per-scope
//! instances, shares singletons with the whole tree, and disposes what it
//! created when it closes.
//!
//! ## Core Concepts
//!
//! - **Registration**: an implementation, the keys it is served under, its
//!   [`Lifetime`] and its declared [`Dependency`] list.
//! - **Lifetimes**: `Transient` (new every time), `SingleInstance` (one per
//!   container) and `InstancePerLifetimeScope` (one per scope).
//! - **Relationships**: dependencies may ask for every implementation, a
//!   [`Lazy`] handle or a [`Factory`] taking a call-time argument.
//! - **Open generics**: a contract parameterized by [`TypeArgs`], closed on
//!   first request for each distinct argument list.
//! - **Disposal**: instances of [`Dispose`] registrations are released in
//!   reverse creation order when their owning scope closes.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_di::{ContainerBuilder, Resolver};
//! use std::sync::Arc;
//!
//! trait Log: Send + Sync {
//!   fn write(&self, line: &str) -> String;
//! }
//!
//! struct ConsoleLog;
//!
//! impl Log for ConsoleLog {
//!   fn write(&self, line: &str) -> String {
//!     format!("[console] {}", line)
//!   }
//! }
//!
//! struct Engine {
//!   log: Arc<dyn Log>,
//! }
//!
//! struct Car {
//!   engine: Arc<Engine>,
//! }
//!
//! impl Car {
//!   fn drive(&self) -> String {
//!     self.engine.log.write("vroom")
//!   }
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder
//!   .register_type(|_| Ok(ConsoleLog))
//!   .as_service(|log| log as Arc<dyn Log>)
//!   .single_instance();
//! builder
//!   .register_type(|deps| Ok(Engine { log: deps.get::<dyn Log>(0)? }))
//!   .depends_on::<dyn Log>()
//!   .instance_per_lifetime_scope();
//! builder
//!   .register_type(|deps| Ok(Car { engine: deps.get::<Engine>(0)? }))
//!   .depends_on::<Engine>();
//! let container = builder.build();
//!
//! let scope = container.begin_scope().unwrap();
//! let car = scope.resolve::<Car>().unwrap();
//! assert_eq!(car.drive(), "[console] vroom");
//!
//! // Same scope, same engine.
//! let other = scope.resolve::<Car>().unwrap();
//! assert!(Arc::ptr_eq(&car.engine, &other.engine));
//! ```

mod activator;
mod builder;
mod catalog;
mod container;
mod error;
mod instance;
mod key;
mod macros;
mod options;
mod registration;
mod resolver;
mod scope;

pub use activator::Activation;
pub use builder::{ContainerBuilder, Module, OpenGenericBuilder, RegistrationBuilder};
pub use container::Container;
pub use error::{ActivationError, BoxError, Error, Result};
pub use instance::{Dependencies, Dispose, Factory, Instance, Lazy};
pub use key::{Contract, ServiceKey, TypeArg, TypeArgs};
pub use options::ContainerOptions;
pub use registration::{Dependency, Lifetime};
pub use resolver::Resolver;
pub use scope::{LifetimeScope, ScopeHandle};
