//! The resolution façade shared by containers, scopes and activations.

use crate::error::{Error, Result};
use crate::instance::{Factory, Instance, Lazy};
use crate::key::{ServiceKey, TypeArgs};
use crate::scope::ScopeHandle;
use std::sync::Arc;

/// Resolves services. Every top-level call starts a fresh resolution context.
///
/// Implementors provide the three erased operations; the typed methods are
/// built on top of them.
pub trait Resolver {
  /// Resolves the default implementation of `key`.
  fn resolve_key(&self, key: &ServiceKey) -> Result<Instance>;

  /// Resolves every implementation of `key`, in registration order.
  fn resolve_all_keys(&self, key: &ServiceKey) -> Result<Vec<Instance>>;

  /// The scope deferred handles created by this resolver will resolve against.
  fn scope_handle(&self) -> ScopeHandle;

  /// Resolves `T`, failing with [`Error::ServiceNotRegistered`] if unknown.
  fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
    self.resolve_as(&ServiceKey::of::<T>())
  }

  /// Resolves the service registered as `T` under `name`.
  fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
    self.resolve_as(&ServiceKey::named::<T>(name))
  }

  /// Resolves `key` and views the instance as `T`.
  fn resolve_as<T: ?Sized + Send + Sync + 'static>(&self, key: &ServiceKey) -> Result<Arc<T>> {
    self.resolve_key(key)?.downcast_for::<T>(key)
  }

  /// Resolves the open-generic contract `C` closed over `args`, viewed as `T`.
  ///
  /// ```
  /// use fibre_di::{ContainerBuilder, Instance, Resolver, TypeArgs};
  /// use std::sync::{Arc, Mutex};
  ///
  /// struct ListOf;
  ///
  /// let mut builder = ContainerBuilder::new();
  /// builder.register_open_generic::<ListOf, _>(|args, _| {
  ///   if args.is::<i32>(0) {
  ///     Ok(Instance::from_value(Mutex::new(Vec::<i32>::new())))
  ///   } else {
  ///     Err(format!("no list for {}", args).into())
  ///   }
  /// });
  /// let container = builder.build();
  ///
  /// let list: Arc<Mutex<Vec<i32>>> = container
  ///   .resolve_generic::<ListOf, _>(TypeArgs::of::<i32>())
  ///   .unwrap();
  /// list.lock().unwrap().push(2);
  /// ```
  fn resolve_generic<C: ?Sized + 'static, T: ?Sized + Send + Sync + 'static>(
    &self,
    args: TypeArgs,
  ) -> Result<Arc<T>> {
    self.resolve_as(&ServiceKey::generic::<C>(args))
  }

  /// Like [`Resolver::resolve`], but a missing registration for `T` itself
  /// yields `Ok(None)`. Missing nested dependencies, cycles, disposed scopes
  /// and construction failures are still errors.
  fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
    self.try_resolve_as(&ServiceKey::of::<T>())
  }

  fn try_resolve_as<T: ?Sized + Send + Sync + 'static>(
    &self,
    key: &ServiceKey,
  ) -> Result<Option<Arc<T>>> {
    match self.resolve_key(key) {
      Ok(instance) => instance.downcast_for::<T>(key).map(Some),
      Err(Error::ServiceNotRegistered(missing)) if missing == *key => Ok(None),
      Err(error) => Err(error),
    }
  }

  /// Every implementation of `T`, each honoring its own lifetime.
  fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
    let key = ServiceKey::of::<T>();
    self
      .resolve_all_keys(&key)?
      .iter()
      .map(|instance| instance.downcast_for::<T>(&key))
      .collect()
  }

  /// A deferred handle for `T`; only registration is checked up front.
  fn resolve_lazy<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Lazy<T>> {
    let key = ServiceKey::of::<T>();
    let scope = self.scope_handle();
    scope.ensure_registered(&key)?;
    Ok(Lazy::new(scope, key))
  }

  /// A factory building `T` from a call-time argument of type `A`.
  fn resolve_factory<A: Send + 'static, T: ?Sized + Send + Sync + 'static>(
    &self,
  ) -> Result<Factory<A, T>> {
    let key = ServiceKey::of::<T>();
    let scope = self.scope_handle();
    scope.ensure_registered(&key)?;
    Ok(Factory::new(scope, key))
  }
}
