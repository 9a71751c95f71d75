//! Lifetime scopes: the tree of caches and disposal lists behind every resolution.

use crate::activator::{activate, ResolutionContext};
use crate::catalog::Catalog;
use crate::error::{ActivationError, Error, Result};
use crate::instance::{Instance, Resolved};
use crate::key::{ServiceKey, TypeArg};
use crate::options::ContainerOptions;
use crate::registration::{
  Dependency, Disposer, Lifetime, Registration, RegistrationId, Strategy,
};
use crate::resolver::Resolver;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, trace, trace_span};

type Slot = Arc<OnceCell<Instance>>;

/// Identifies one cache slot: the owning scope and the registration.
type SlotKey = (u64, RegistrationId);

/// Who is initializing which cached slot, and which slot each blocked
/// thread is waiting for.
///
/// A thread about to block on a slot follows owner -> awaited slot -> owner
/// from that slot. Reaching itself means every thread on the path would wait
/// forever, so it fails with `CircularDependency` instead of blocking.
#[derive(Default)]
struct InitGraph {
  owners: HashMap<SlotKey, ThreadId>,
  waiting: HashMap<ThreadId, SlotKey>,
}

impl InitGraph {
  fn closes_cycle(&self, thread: ThreadId, slot: SlotKey) -> bool {
    let mut current = slot;
    // Each step visits a distinct waiting thread, so the walk is bounded.
    for _ in 0..=self.waiting.len() {
      let owner = match self.owners.get(&current) {
        Some(owner) => *owner,
        None => return false,
      };
      if owner == thread {
        return true;
      }
      match self.waiting.get(&owner) {
        Some(next) => current = *next,
        None => return false,
      }
    }
    false
  }
}

/// Clears this thread's pending wait when dropped.
struct WaitGuard<'a> {
  graph: &'a Mutex<InitGraph>,
  thread: ThreadId,
}

impl Drop for WaitGuard<'_> {
  fn drop(&mut self) {
    self.graph.lock().waiting.remove(&self.thread);
  }
}

/// Releases ownership of a slot once its initializer returns.
struct OwnerGuard<'a> {
  graph: &'a Mutex<InitGraph>,
  slot: SlotKey,
}

impl Drop for OwnerGuard<'_> {
  fn drop(&mut self) {
    self.graph.lock().owners.remove(&self.slot);
  }
}

/// State shared by every scope of one built container.
pub(crate) struct Shared {
  pub(crate) catalog: Catalog,
  pub(crate) options: ContainerOptions,
  /// Root-owned `SingleInstance` cache, visible to all descendants.
  singletons: DashMap<RegistrationId, Slot>,
  initializing: Mutex<InitGraph>,
  next_scope_id: AtomicU64,
}

impl Shared {
  pub(crate) fn new(catalog: Catalog, options: ContainerOptions) -> Self {
    Self {
      catalog,
      options,
      singletons: DashMap::new(),
      initializing: Mutex::new(InitGraph::default()),
      next_scope_id: AtomicU64::new(0),
    }
  }

  /// Records that this thread is about to block on `slot`.
  fn wait_for(&self, slot: SlotKey, context: &ResolutionContext) -> Result<WaitGuard<'_>> {
    let thread = thread::current().id();
    let mut graph = self.initializing.lock();
    if graph.closes_cycle(thread, slot) {
      return Err(Error::CircularDependency {
        chain: context.chain(),
      });
    }
    graph.waiting.insert(thread, slot);
    Ok(WaitGuard {
      graph: &self.initializing,
      thread,
    })
  }

  /// Records that this thread now runs the initializer of `slot`.
  fn own(&self, slot: SlotKey) -> OwnerGuard<'_> {
    let thread = thread::current().id();
    let mut graph = self.initializing.lock();
    graph.waiting.remove(&thread);
    graph.owners.insert(slot, thread);
    OwnerGuard {
      graph: &self.initializing,
      slot,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
  Open,
  Closed,
}

struct Tracked {
  implementation: &'static str,
  instance: Instance,
  disposer: Disposer,
}

pub(crate) struct ScopeInner {
  id: u64,
  depth: usize,
  tag: Option<Arc<str>>,
  shared: Arc<Shared>,
  /// `None` for the root itself.
  root: Option<Arc<ScopeInner>>,
  parent: Mutex<Option<Arc<ScopeInner>>>,
  /// Resolutions hold a (recursive) read guard; `close` takes the write side,
  /// so in-flight resolutions finish before teardown and later ones fail.
  state: RwLock<ScopeState>,
  instances: DashMap<RegistrationId, Slot>,
  disposables: Mutex<Vec<Tracked>>,
}

impl ScopeInner {
  pub(crate) fn new_root(shared: Arc<Shared>) -> Arc<Self> {
    let id = shared.next_scope_id.fetch_add(1, Ordering::Relaxed);
    Arc::new(Self {
      id,
      depth: 0,
      tag: Some(Arc::from("root")),
      shared,
      root: None,
      parent: Mutex::new(None),
      state: RwLock::new(ScopeState::Open),
      instances: DashMap::new(),
      disposables: Mutex::new(Vec::new()),
    })
  }

  fn begin_child(self: &Arc<Self>, tag: Option<&str>) -> Result<Arc<Self>> {
    let state = self.state.read_recursive();
    if *state == ScopeState::Closed {
      return Err(Error::ScopeDisposed { scope: self.id });
    }
    let id = self.shared.next_scope_id.fetch_add(1, Ordering::Relaxed);
    let child = Arc::new(Self {
      id,
      depth: self.depth + 1,
      tag: tag.map(Arc::from),
      shared: Arc::clone(&self.shared),
      root: Some(self.root()),
      parent: Mutex::new(Some(Arc::clone(self))),
      state: RwLock::new(ScopeState::Open),
      instances: DashMap::new(),
      disposables: Mutex::new(Vec::new()),
    });
    debug!(scope = id, parent = self.id, depth = child.depth, tag = ?tag, "lifetime scope opened");
    Ok(child)
  }

  pub(crate) fn id(&self) -> u64 {
    self.id
  }

  fn root(self: &Arc<Self>) -> Arc<Self> {
    match &self.root {
      Some(root) => Arc::clone(root),
      None => Arc::clone(self),
    }
  }

  fn is_closed(&self) -> bool {
    *self.state.read_recursive() == ScopeState::Closed
  }

  // --- Resolution ---

  pub(crate) fn resolve_in(
    self: &Arc<Self>,
    key: &ServiceKey,
    context: &ResolutionContext,
  ) -> Result<Instance> {
    let state = self.state.read_recursive();
    if *state == ScopeState::Closed {
      return Err(Error::ScopeDisposed { scope: self.id });
    }
    let _span = trace_span!("resolve", scope = self.id, key = %key).entered();
    let _guard = context.enter(key)?;
    let registration = self.shared.catalog.lookup(key)?;
    self.resolve_registration(&registration, key, context)
  }

  /// Every implementation of `key`, each honoring its own lifetime.
  pub(crate) fn resolve_all_in(
    self: &Arc<Self>,
    key: &ServiceKey,
    context: &ResolutionContext,
  ) -> Result<Vec<Instance>> {
    let state = self.state.read_recursive();
    if *state == ScopeState::Closed {
      return Err(Error::ScopeDisposed { scope: self.id });
    }
    let registrations = self.shared.catalog.lookup_all(key);
    trace!(scope = self.id, key = %key, count = registrations.len(), "resolving all");
    let mut instances = Vec::with_capacity(registrations.len());
    for registration in &registrations {
      let _guard = context.enter(key)?;
      instances.push(self.resolve_registration(registration, key, context)?);
    }
    Ok(instances)
  }

  pub(crate) fn resolve_dependency(
    self: &Arc<Self>,
    dependency: &Dependency,
    context: &ResolutionContext,
  ) -> Result<Resolved> {
    match dependency {
      Dependency::Service(key) => self.resolve_in(key, context).map(Resolved::One),
      Dependency::All(key) => self.resolve_all_in(key, context).map(Resolved::Many),
      Dependency::Lazy(key) => {
        self.ensure_registered(key)?;
        Ok(Resolved::Lazy {
          scope: ScopeHandle::new(Arc::clone(self)),
          key: key.clone(),
        })
      }
      Dependency::Factory(key) => {
        self.ensure_registered(key)?;
        Ok(Resolved::Factory {
          scope: ScopeHandle::new(Arc::clone(self)),
          key: key.clone(),
        })
      }
    }
  }

  fn ensure_registered(&self, key: &ServiceKey) -> Result<()> {
    if self.is_closed() {
      return Err(Error::ScopeDisposed { scope: self.id });
    }
    self.shared.catalog.lookup(key).map(|_| ())
  }

  fn resolve_registration(
    self: &Arc<Self>,
    registration: &Arc<Registration>,
    key: &ServiceKey,
    context: &ResolutionContext,
  ) -> Result<Instance> {
    let _activating = context.enter_registration(registration.id)?;
    let canonical = match registration.lifetime {
      Lifetime::Transient => self.create(registration, key, context, None)?,
      Lifetime::SingleInstance => self.root().shared_instance(registration, key, context)?,
      Lifetime::InstancePerLifetimeScope => self.scoped_instance(registration, key, context)?,
    };
    registration
      .cast(key, &canonical)
      .ok_or_else(|| Error::ActivationFailure {
        key: key.clone(),
        source: Box::new(ActivationError::TypeMismatch {
          expected: key.contract().name(),
          found: canonical.type_name(),
        }),
      })
  }

  /// Looks up or creates the singleton; `self` is always the root here.
  fn shared_instance(
    self: &Arc<Self>,
    registration: &Arc<Registration>,
    key: &ServiceKey,
    context: &ResolutionContext,
  ) -> Result<Instance> {
    let state = self.state.read_recursive();
    if *state == ScopeState::Closed {
      return Err(Error::ScopeDisposed { scope: self.id });
    }
    // Clone the slot out so no map shard stays locked during activation.
    let slot = self
      .shared
      .singletons
      .entry(registration.id)
      .or_default()
      .clone();
    if let Some(instance) = slot.get() {
      trace!(key = %key, "singleton cache hit");
      return Ok(instance.clone());
    }
    self.initialize(&slot, (self.id, registration.id), registration, key, context)
  }

  fn scoped_instance(
    self: &Arc<Self>,
    registration: &Arc<Registration>,
    key: &ServiceKey,
    context: &ResolutionContext,
  ) -> Result<Instance> {
    let slot = self.instances.entry(registration.id).or_default().clone();
    if let Some(instance) = slot.get() {
      trace!(scope = self.id, key = %key, "scoped cache hit");
      return Ok(instance.clone());
    }
    self.initialize(&slot, (self.id, registration.id), registration, key, context)
  }

  /// Fills `slot`, or waits for the thread already filling it unless that
  /// wait would close a loop of threads waiting on each other.
  fn initialize(
    self: &Arc<Self>,
    slot: &Slot,
    slot_key: SlotKey,
    registration: &Registration,
    key: &ServiceKey,
    context: &ResolutionContext,
  ) -> Result<Instance> {
    let _waiting = self.shared.wait_for(slot_key, context)?;
    slot
      .get_or_try_init(|| {
        let _owner = self.shared.own(slot_key);
        self.create(registration, key, context, None)
      })
      .cloned()
  }

  /// Activates a fresh instance and, if disposable, tracks it in this scope.
  ///
  /// Tracking happens before the caller can publish the instance to a cache.
  fn create(
    self: &Arc<Self>,
    registration: &Registration,
    key: &ServiceKey,
    context: &ResolutionContext,
    argument: Option<(Box<dyn Any + Send>, TypeArg)>,
  ) -> Result<Instance> {
    let instance = activate(registration, self, key, context, argument)?;
    if let Some(disposer) = &registration.disposer {
      self.disposables.lock().push(Tracked {
        implementation: registration.implementation,
        instance: instance.clone(),
        disposer: Arc::clone(disposer),
      });
    }
    Ok(instance)
  }

  /// Runs a factory call: `key` built with a call-time argument.
  pub(crate) fn create_with_argument(
    self: &Arc<Self>,
    key: &ServiceKey,
    value: Box<dyn Any + Send>,
    given: TypeArg,
  ) -> Result<Instance> {
    let state = self.state.read_recursive();
    if *state == ScopeState::Closed {
      return Err(Error::ScopeDisposed { scope: self.id });
    }
    let context = ResolutionContext::new();
    let _guard = context.enter(key)?;
    let registration = self.shared.catalog.lookup(key)?;
    match &registration.strategy {
      Strategy::Construct(_) if given.is::<()>() => {
        self.resolve_registration(&registration, key, &context)
      }
      _ => {
        let canonical = self.create(&registration, key, &context, Some((value, given)))?;
        registration
          .cast(key, &canonical)
          .ok_or_else(|| Error::ActivationFailure {
            key: key.clone(),
            source: Box::new(ActivationError::TypeMismatch {
              expected: key.contract().name(),
              found: canonical.type_name(),
            }),
          })
      }
    }
  }

  // --- Teardown ---

  /// Closes the scope. Idempotent.
  pub(crate) fn close(&self) {
    {
      let mut state = self.state.write();
      if *state == ScopeState::Closed {
        return;
      }
      *state = ScopeState::Closed;
    }

    let tracked = std::mem::take(&mut *self.disposables.lock());
    let disposed = tracked.len();
    for entry in tracked.into_iter().rev() {
      trace!(scope = self.id, implementation = entry.implementation, "disposing");
      (entry.disposer)(&entry.instance);
    }

    self.instances.clear();
    if self.root.is_none() {
      self.shared.singletons.clear();
    }
    self.parent.lock().take();
    debug!(scope = self.id, disposed, "lifetime scope closed");
  }
}

/// A cloneable, non-owning reference to a scope, held by lazy handles and
/// factories. It never closes the scope it points to.
#[derive(Clone)]
pub struct ScopeHandle {
  inner: Arc<ScopeInner>,
}

impl ScopeHandle {
  pub(crate) fn new(inner: Arc<ScopeInner>) -> Self {
    Self { inner }
  }

  pub fn scope_id(&self) -> u64 {
    self.inner.id
  }

  pub(crate) fn resolve(&self, key: &ServiceKey) -> Result<Instance> {
    self.inner.resolve_in(key, &ResolutionContext::new())
  }

  pub(crate) fn ensure_registered(&self, key: &ServiceKey) -> Result<()> {
    self.inner.ensure_registered(key)
  }

  pub(crate) fn create_with_argument(
    &self,
    key: &ServiceKey,
    value: Box<dyn Any + Send>,
    given: TypeArg,
  ) -> Result<Instance> {
    self.inner.create_with_argument(key, value, given)
  }
}

impl fmt::Debug for ScopeHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ScopeHandle({})", self.inner.id)
  }
}

/// An open node in the scope tree.
///
/// Resolve services through the [`Resolver`] trait; open nested scopes with
/// [`LifetimeScope::begin_scope`]. Dropping the handle closes the scope unless
/// the container was built with `dispose_on_drop` turned off.
pub struct LifetimeScope {
  inner: Arc<ScopeInner>,
}

impl LifetimeScope {
  pub(crate) fn from_inner(inner: Arc<ScopeInner>) -> Self {
    Self { inner }
  }

  /// Container-unique id of this scope.
  pub fn id(&self) -> u64 {
    self.inner.id
  }

  /// Distance from the root scope.
  pub fn depth(&self) -> usize {
    self.inner.depth
  }

  pub fn tag(&self) -> Option<&str> {
    self.inner.tag.as_deref()
  }

  pub fn is_closed(&self) -> bool {
    self.inner.is_closed()
  }

  /// Opens a child scope. The child shares singletons but none of this
  /// scope's per-scope instances.
  pub fn begin_scope(&self) -> Result<LifetimeScope> {
    self.inner.begin_child(None).map(Self::from_inner)
  }

  /// Opens a child scope labelled `tag` in logs.
  pub fn begin_scope_tagged(&self, tag: &str) -> Result<LifetimeScope> {
    self.inner.begin_child(Some(tag)).map(Self::from_inner)
  }

  /// Disposes every tracked instance created in this scope, in reverse
  /// creation order, and rejects further resolutions. Closing twice is a no-op.
  pub fn close(&self) {
    self.inner.close();
  }

  /// Whether `key` has a registration (exact or open-generic).
  pub fn is_registered(&self, key: &ServiceKey) -> bool {
    self.inner.shared.catalog.contains(key)
  }

  pub fn options(&self) -> &ContainerOptions {
    &self.inner.shared.options
  }
}

impl Resolver for LifetimeScope {
  fn resolve_key(&self, key: &ServiceKey) -> Result<Instance> {
    self.inner.resolve_in(key, &ResolutionContext::new())
  }

  fn resolve_all_keys(&self, key: &ServiceKey) -> Result<Vec<Instance>> {
    self.inner.resolve_all_in(key, &ResolutionContext::new())
  }

  fn scope_handle(&self) -> ScopeHandle {
    ScopeHandle::new(Arc::clone(&self.inner))
  }
}

impl Drop for LifetimeScope {
  fn drop(&mut self) {
    if self.inner.shared.options.dispose_on_drop {
      self.inner.close();
    }
  }
}

impl fmt::Debug for LifetimeScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LifetimeScope")
      .field("id", &self.inner.id)
      .field("depth", &self.inner.depth)
      .field("tag", &self.inner.tag)
      .field("closed", &self.inner.is_closed())
      .finish()
  }
}
