//! Instance construction and per-resolution cycle tracking.

use crate::error::{ActivationError, BoxError, Error, Result};
use crate::instance::{Dependencies, Instance};
use crate::key::{ServiceKey, TypeArg};
use crate::registration::{Registration, RegistrationId, Strategy};
use crate::resolver::Resolver;
use crate::scope::{ScopeHandle, ScopeInner};
use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::trace;

/// The chain of keys currently being resolved by one top-level call.
///
/// Lazy handles and factories start a fresh context when invoked, so a
/// deferred edge never counts as part of the chain that created it.
#[derive(Default)]
pub(crate) struct ResolutionContext {
  chain: RefCell<Vec<ServiceKey>>,
  /// Registrations under activation. One registration may serve several
  /// keys, so a loop through two aliases only repeats here.
  activating: RefCell<Vec<RegistrationId>>,
}

impl ResolutionContext {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Pushes `key` onto the chain, failing if it is already being resolved.
  pub(crate) fn enter(&self, key: &ServiceKey) -> Result<ContextGuard<'_>> {
    let mut chain = self.chain.borrow_mut();
    if chain.contains(key) {
      let mut cycle = chain.clone();
      cycle.push(key.clone());
      return Err(Error::CircularDependency { chain: cycle });
    }
    chain.push(key.clone());
    Ok(ContextGuard { context: self })
  }

  /// Marks `id` as under activation, failing if it already is.
  pub(crate) fn enter_registration(&self, id: RegistrationId) -> Result<RegistrationGuard<'_>> {
    let mut activating = self.activating.borrow_mut();
    if activating.contains(&id) {
      return Err(Error::CircularDependency {
        chain: self.chain(),
      });
    }
    activating.push(id);
    Ok(RegistrationGuard { context: self })
  }

  /// A snapshot of the keys being resolved, outermost first.
  pub(crate) fn chain(&self) -> Vec<ServiceKey> {
    self.chain.borrow().clone()
  }

  pub(crate) fn depth(&self) -> usize {
    self.chain.borrow().len()
  }
}

/// Pops its key from the chain when dropped, on success and failure alike.
pub(crate) struct ContextGuard<'a> {
  context: &'a ResolutionContext,
}

impl Drop for ContextGuard<'_> {
  fn drop(&mut self) {
    self.context.chain.borrow_mut().pop();
  }
}

pub(crate) struct RegistrationGuard<'a> {
  context: &'a ResolutionContext,
}

impl Drop for RegistrationGuard<'_> {
  fn drop(&mut self) {
    self.context.activating.borrow_mut().pop();
  }
}

/// What a constructor or delegate sees while its instance is being built.
///
/// Besides the pre-resolved [`Dependencies`], an `Activation` is itself a
/// [`Resolver`]: delegate registrations resolve further services through it,
/// inside the same resolution context, so cycles are still detected.
pub struct Activation<'a> {
  scope: &'a Arc<ScopeInner>,
  context: &'a ResolutionContext,
  key: &'a ServiceKey,
  dependencies: Dependencies,
}

impl Activation<'_> {
  /// The key whose resolution triggered this activation.
  pub fn key(&self) -> &ServiceKey {
    self.key
  }

  pub fn dependencies(&self) -> &Dependencies {
    &self.dependencies
  }
}

impl Resolver for Activation<'_> {
  fn resolve_key(&self, key: &ServiceKey) -> Result<Instance> {
    self.scope.resolve_in(key, self.context)
  }

  fn resolve_all_keys(&self, key: &ServiceKey) -> Result<Vec<Instance>> {
    self.scope.resolve_all_in(key, self.context)
  }

  fn scope_handle(&self) -> ScopeHandle {
    ScopeHandle::new(Arc::clone(self.scope))
  }
}

/// Builds one instance of `registration` against `scope`.
///
/// Dependencies are resolved in declared order before the strategy runs.
/// Engine errors raised inside host code pass through unchanged; any other
/// host failure is reported as an activation failure of `key`.
pub(crate) fn activate(
  registration: &Registration,
  scope: &Arc<ScopeInner>,
  key: &ServiceKey,
  context: &ResolutionContext,
  argument: Option<(Box<dyn Any + Send>, TypeArg)>,
) -> Result<Instance> {
  let mut resolved = Vec::with_capacity(registration.dependencies.len());
  for dependency in &registration.dependencies {
    resolved.push(scope.resolve_dependency(dependency, context)?);
  }

  trace!(
    scope = scope.id(),
    key = %key,
    implementation = registration.implementation,
    depth = context.depth(),
    "activating"
  );

  let activation = Activation {
    scope,
    context,
    key,
    dependencies: Dependencies::new(resolved),
  };

  let built = match (&registration.strategy, argument) {
    (Strategy::Construct(construct), None) => construct(&activation),
    (Strategy::Parameterized { argument, build }, Some((value, given))) => {
      if *argument == given {
        build(value, &activation)
      } else {
        Err(Box::new(ActivationError::ArgumentMismatch {
          expected: argument.name(),
          found: given.name(),
        }) as BoxError)
      }
    }
    (Strategy::Parameterized { argument, .. }, None) => {
      Err(Box::new(ActivationError::ArgumentRequired {
        expected: argument.name(),
      }) as BoxError)
    }
    (Strategy::Construct(_), Some((_, given))) => Err(Box::new(ActivationError::UnexpectedArgument {
      found: given.name(),
    }) as BoxError),
  };

  built.map_err(|source| into_error(key, source))
}

fn into_error(key: &ServiceKey, source: BoxError) -> Error {
  match source.downcast::<Error>() {
    Ok(inner) => *inner,
    Err(source) => Error::ActivationFailure {
      key: key.clone(),
      source,
    },
  }
}
