//! Error types surfaced by registration and resolution.

use crate::key::ServiceKey;
use thiserror::Error;

/// A boxed error returned by host-supplied constructors and delegates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for the `fibre_di` library.
///
/// Callers can tell apart "nothing registered" ([`Error::ServiceNotRegistered`]),
/// "registered but failed to build" ([`Error::ActivationFailure`],
/// [`Error::CircularDependency`]) and "used after teardown" ([`Error::ScopeDisposed`]).
#[derive(Debug, Error)]
pub enum Error {
  #[error("service not registered: {0}")]
  ServiceNotRegistered(ServiceKey),

  #[error("circular dependency detected: {}", render_chain(.chain))]
  CircularDependency { chain: Vec<ServiceKey> },

  #[error("lifetime scope {scope} has been disposed")]
  ScopeDisposed { scope: u64 },

  #[error("failed to activate {key}: {source}")]
  ActivationFailure {
    key: ServiceKey,
    #[source]
    source: BoxError,
  },
}

impl Error {
  /// Returns `true` if this error only means the requested service is unknown.
  pub fn is_not_registered(&self) -> bool {
    matches!(self, Error::ServiceNotRegistered(_))
  }
}

/// Errors raised by the engine itself while wiring a constructor's inputs.
///
/// These reach callers wrapped in [`Error::ActivationFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
  #[error("no dependency declared at position {index}")]
  MissingDependency { index: usize },

  #[error("dependency {index} is {found}, not {expected}")]
  DependencyKind {
    index: usize,
    expected: &'static str,
    found: &'static str,
  },

  #[error("instance of {found} cannot be used as {expected}")]
  TypeMismatch {
    expected: &'static str,
    found: &'static str,
  },

  #[error("registration requires a call-time argument of type {expected}; resolve it through a factory")]
  ArgumentRequired { expected: &'static str },

  #[error("registration takes an argument of type {expected}, not {found}")]
  ArgumentMismatch {
    expected: &'static str,
    found: &'static str,
  },

  #[error("registration does not accept a call-time argument (got {found})")]
  UnexpectedArgument { found: &'static str },
}

/// A specialized `Result` type for `fibre_di` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

fn render_chain(chain: &[ServiceKey]) -> String {
  chain
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(" -> ")
}
