//! Type-erased instances and the handles passed into constructors.

use crate::error::{ActivationError, Error, Result};
use crate::key::{ServiceKey, TypeArg};
use crate::scope::ScopeHandle;
use once_cell::sync::OnceCell;
use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// The disposal contract a service may opt into at registration.
///
/// A scope calls [`Dispose::dispose`] exactly once for every tracked instance
/// it created, in reverse creation order, when the scope closes.
pub trait Dispose: Send + Sync {
  fn dispose(&self);
}

/// A resolved service with its concrete type erased.
///
/// Internally this stores an `Arc<T>` (so `T` may be a trait object), the same
/// way the container's caches hold it.
#[derive(Clone)]
pub struct Instance {
  value: Arc<dyn Any + Send + Sync>,
  type_name: &'static str,
}

impl Instance {
  pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
    Self {
      value: Arc::new(value),
      type_name: type_name::<T>(),
    }
  }

  pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
    Self::new(Arc::new(value))
  }

  /// Recovers the typed handle, or `None` if this instance is not an `Arc<T>`.
  pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
    self.value.downcast_ref::<Arc<T>>().cloned()
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub(crate) fn downcast_for<T: ?Sized + Send + Sync + 'static>(
    &self,
    key: &ServiceKey,
  ) -> Result<Arc<T>> {
    self.downcast::<T>().ok_or_else(|| Error::ActivationFailure {
      key: key.clone(),
      source: Box::new(ActivationError::TypeMismatch {
        expected: type_name::<T>(),
        found: self.type_name,
      }),
    })
  }
}

impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Instance({})", self.type_name)
  }
}

pub(crate) enum Resolved {
  One(Instance),
  Many(Vec<Instance>),
  Lazy { scope: ScopeHandle, key: ServiceKey },
  Factory { scope: ScopeHandle, key: ServiceKey },
}

impl Resolved {
  fn kind(&self) -> &'static str {
    match self {
      Resolved::One(_) => "a service",
      Resolved::Many(_) => "a collection",
      Resolved::Lazy { .. } => "a lazy handle",
      Resolved::Factory { .. } => "a factory",
    }
  }
}

/// The resolved values of a registration's declared dependencies, by position.
pub struct Dependencies {
  items: Vec<Resolved>,
}

impl Dependencies {
  pub(crate) fn new(items: Vec<Resolved>) -> Self {
    Self { items }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  fn item(&self, index: usize) -> Result<&Resolved, ActivationError> {
    self
      .items
      .get(index)
      .ok_or(ActivationError::MissingDependency { index })
  }

  fn wrong_kind(index: usize, expected: &'static str, found: &Resolved) -> ActivationError {
    ActivationError::DependencyKind {
      index,
      expected,
      found: found.kind(),
    }
  }

  /// The service declared at `index` with `depends_on`.
  pub fn get<T: ?Sized + Send + Sync + 'static>(
    &self,
    index: usize,
  ) -> Result<Arc<T>, ActivationError> {
    match self.item(index)? {
      Resolved::One(instance) => cast(instance),
      other => Err(Self::wrong_kind(index, "a service", other)),
    }
  }

  /// Every implementation declared at `index` with `depends_on_all`.
  pub fn all<T: ?Sized + Send + Sync + 'static>(
    &self,
    index: usize,
  ) -> Result<Vec<Arc<T>>, ActivationError> {
    match self.item(index)? {
      Resolved::Many(instances) => instances.iter().map(cast::<T>).collect(),
      other => Err(Self::wrong_kind(index, "a collection", other)),
    }
  }

  /// The deferred handle declared at `index` with `depends_on_lazy`.
  pub fn lazy<T: ?Sized + Send + Sync + 'static>(
    &self,
    index: usize,
  ) -> Result<Lazy<T>, ActivationError> {
    match self.item(index)? {
      Resolved::Lazy { scope, key } => Ok(Lazy::new(scope.clone(), key.clone())),
      other => Err(Self::wrong_kind(index, "a lazy handle", other)),
    }
  }

  /// The factory declared at `index` with `depends_on_factory`.
  pub fn factory<A: Send + 'static, T: ?Sized + Send + Sync + 'static>(
    &self,
    index: usize,
  ) -> Result<Factory<A, T>, ActivationError> {
    match self.item(index)? {
      Resolved::Factory { scope, key } => Ok(Factory::new(scope.clone(), key.clone())),
      other => Err(Self::wrong_kind(index, "a factory", other)),
    }
  }
}

fn cast<T: ?Sized + Send + Sync + 'static>(instance: &Instance) -> Result<Arc<T>, ActivationError> {
  instance
    .downcast::<T>()
    .ok_or(ActivationError::TypeMismatch {
      expected: type_name::<T>(),
      found: instance.type_name(),
    })
}

/// A deferred reference to a service.
///
/// Nothing is resolved until [`Lazy::value`] is first called; the produced
/// instance is then memoized for the lifetime of this handle. Resolution runs
/// against the scope that created the handle.
pub struct Lazy<T: ?Sized> {
  scope: ScopeHandle,
  key: ServiceKey,
  value: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
  pub(crate) fn new(scope: ScopeHandle, key: ServiceKey) -> Self {
    Self {
      scope,
      key,
      value: OnceCell::new(),
    }
  }

  pub fn key(&self) -> &ServiceKey {
    &self.key
  }

  /// Whether the value has already been produced.
  pub fn is_created(&self) -> bool {
    self.value.get().is_some()
  }

  pub fn value(&self) -> Result<Arc<T>> {
    self
      .value
      .get_or_try_init(|| {
        let instance = self.scope.resolve(&self.key)?;
        instance.downcast_for::<T>(&self.key)
      })
      .cloned()
  }
}

impl<T: ?Sized> fmt::Debug for Lazy<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Lazy")
      .field("key", &self.key)
      .field("created", &self.value.get().is_some())
      .finish()
  }
}

/// A callable that builds `T` from a call-time argument of type `A`.
///
/// Backed by a parameterized registration, every call constructs a fresh
/// instance in the scope that created the factory. With `A = ()` a factory can
/// also front an ordinary registration, in which case each call is a plain
/// resolution honoring that registration's lifetime.
pub struct Factory<A, T: ?Sized> {
  scope: ScopeHandle,
  key: ServiceKey,
  _marker: PhantomData<fn(A) -> Arc<T>>,
}

impl<A: Send + 'static, T: ?Sized + Send + Sync + 'static> Factory<A, T> {
  pub(crate) fn new(scope: ScopeHandle, key: ServiceKey) -> Self {
    Self {
      scope,
      key,
      _marker: PhantomData,
    }
  }

  pub fn key(&self) -> &ServiceKey {
    &self.key
  }

  pub fn create(&self, argument: A) -> Result<Arc<T>> {
    let instance = self
      .scope
      .create_with_argument(&self.key, Box::new(argument), TypeArg::of::<A>())?;
    instance.downcast_for::<T>(&self.key)
  }
}

impl<A, T: ?Sized> Clone for Factory<A, T> {
  fn clone(&self) -> Self {
    Self {
      scope: self.scope.clone(),
      key: self.key.clone(),
      _marker: PhantomData,
    }
  }
}

impl<A, T: ?Sized> fmt::Debug for Factory<A, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Factory")
      .field("key", &self.key)
      .field("argument", &type_name::<A>())
      .finish()
  }
}
