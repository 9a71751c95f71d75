//! Public macros for ergonomic service resolution.

/// Resolves a required service from a container, scope or activation.
///
/// Panics with the resolution error if the service cannot be produced. Use
/// [`try_resolve!`] or the [`Resolver`](crate::Resolver) methods directly to
/// handle failures.
///
/// # Examples
///
/// ```
/// use fibre_di::{resolve, ContainerBuilder};
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(String::from("hello"));
/// builder
///   .register_instance(String::from("bonjour"))
///   .as_named::<String, _>("french", |s| s);
/// let container = builder.build();
///
/// assert_eq!(*resolve!(container, String), "hello");
/// assert_eq!(*resolve!(container, String, "french"), "bonjour");
/// ```
///
/// ```
/// use fibre_di::{resolve, ContainerBuilder};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// let mut builder = ContainerBuilder::new();
/// builder
///   .register_type(|_| Ok(EnglishGreeter))
///   .as_service(|g| g as Arc<dyn Greeter>);
/// let container = builder.build();
///
/// let greeter = resolve!(container, trait Greeter);
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
  // Trait arms come first: `trait X` is not a valid `ty` fragment.
  ($resolver:expr, trait $trait_ident:ident) => {{
    use $crate::Resolver as _;
    ($resolver)
      .resolve::<dyn $trait_ident>()
      .unwrap_or_else(|error| panic!("failed to resolve required service: {}", error))
  }};

  ($resolver:expr, trait $trait_ident:ident, $name:expr) => {{
    use $crate::Resolver as _;
    ($resolver)
      .resolve_named::<dyn $trait_ident>($name)
      .unwrap_or_else(|error| panic!("failed to resolve required service: {}", error))
  }};

  ($resolver:expr, $type:ty) => {{
    use $crate::Resolver as _;
    ($resolver)
      .resolve::<$type>()
      .unwrap_or_else(|error| panic!("failed to resolve required service: {}", error))
  }};

  ($resolver:expr, $type:ty, $name:expr) => {{
    use $crate::Resolver as _;
    ($resolver)
      .resolve_named::<$type>($name)
      .unwrap_or_else(|error| panic!("failed to resolve required service: {}", error))
  }};
}

/// Resolves an optional service: `None` when it is not registered.
///
/// Any other failure (a missing nested dependency, a cycle, a disposed scope)
/// still panics with the resolution error.
///
/// ```
/// use fibre_di::{try_resolve, ContainerBuilder};
///
/// let container = ContainerBuilder::new().build();
/// assert!(try_resolve!(container, String).is_none());
/// ```
#[macro_export]
macro_rules! try_resolve {
  ($resolver:expr, trait $trait_ident:ident) => {{
    use $crate::Resolver as _;
    ($resolver)
      .try_resolve::<dyn $trait_ident>()
      .unwrap_or_else(|error| panic!("failed to resolve optional service: {}", error))
  }};

  ($resolver:expr, $type:ty) => {{
    use $crate::Resolver as _;
    ($resolver)
      .try_resolve::<$type>()
      .unwrap_or_else(|error| panic!("failed to resolve optional service: {}", error))
  }};
}
