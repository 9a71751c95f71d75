//! The built `Container` and its root lifetime scope.

use crate::builder::ContainerBuilder;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::instance::Instance;
use crate::key::ServiceKey;
use crate::options::ContainerOptions;
use crate::resolver::Resolver;
use crate::scope::{LifetimeScope, ScopeHandle, ScopeInner, Shared};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The Inversion of Control (IoC) container.
///
/// A `Container` owns the frozen registration catalog and the root
/// [`LifetimeScope`]. Singletons live in the root; per-scope services live in
/// the scope that first resolved them. Resolving through the container is the
/// same as resolving through its root scope.
pub struct Container {
  root: LifetimeScope,
}

impl Container {
  /// Shortcut for [`ContainerBuilder::new`].
  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::new()
  }

  pub(crate) fn new(catalog: Catalog, options: ContainerOptions) -> Self {
    let registrations = catalog.len();
    let default_lifetime = options.default_lifetime;
    let shared = Arc::new(Shared::new(catalog, options));
    let root = ScopeInner::new_root(shared);
    debug!(
      scope = root.id(),
      registrations,
      default_lifetime = %default_lifetime,
      "container built"
    );
    Self {
      root: LifetimeScope::from_inner(root),
    }
  }

  /// Opens a child of the root scope.
  pub fn begin_scope(&self) -> Result<LifetimeScope> {
    self.root.begin_scope()
  }

  pub fn begin_scope_tagged(&self, tag: &str) -> Result<LifetimeScope> {
    self.root.begin_scope_tagged(tag)
  }

  /// The root scope.
  pub fn root(&self) -> &LifetimeScope {
    &self.root
  }

  pub fn options(&self) -> &ContainerOptions {
    self.root.options()
  }

  /// Closes the root scope: disposes root-tracked instances (singletons
  /// included) and fails later resolutions with `ScopeDisposed`.
  pub fn close(&self) {
    self.root.close();
  }

  pub fn is_closed(&self) -> bool {
    self.root.is_closed()
  }

  pub fn is_registered(&self, key: &ServiceKey) -> bool {
    self.root.is_registered(key)
  }
}

impl Resolver for Container {
  fn resolve_key(&self, key: &ServiceKey) -> Result<Instance> {
    self.root.resolve_key(key)
  }

  fn resolve_all_keys(&self, key: &ServiceKey) -> Result<Vec<Instance>> {
    self.root.resolve_all_keys(key)
  }

  fn scope_handle(&self) -> ScopeHandle {
    self.root.scope_handle()
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container").field("root", &self.root).finish()
  }
}
