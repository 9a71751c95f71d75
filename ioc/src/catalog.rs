//! The registration catalog: frozen at build, read without locks afterwards.

use crate::error::{Error, Result};
use crate::key::ServiceKey;
use crate::registration::{OpenRegistration, Registration, RegistrationId};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) struct Catalog {
  registrations: Vec<Arc<Registration>>,
  /// "The" implementation per key, as an index into `registrations`.
  defaults: HashMap<ServiceKey, usize>,
  /// Every implementation per key, in registration order.
  all: HashMap<ServiceKey, Vec<usize>>,
  open: Vec<Arc<OpenRegistration>>,
  /// Open registrations keyed by definition and arity.
  open_defaults: HashMap<(ServiceKey, usize), usize>,
  open_all: HashMap<(ServiceKey, usize), Vec<usize>>,
  /// Closed registrations synthesized from `open`, keyed by closed key and
  /// the index of the open registration they came from.
  closed: DashMap<(ServiceKey, usize), Arc<Registration>>,
  next_id: AtomicU64,
}

impl Catalog {
  pub(crate) fn new(registrations: Vec<Registration>, open: Vec<OpenRegistration>) -> Self {
    let mut defaults: HashMap<ServiceKey, usize> = HashMap::new();
    let mut all: HashMap<ServiceKey, Vec<usize>> = HashMap::new();
    let next_id = registrations
      .iter()
      .map(|registration| registration.id + 1)
      .max()
      .unwrap_or(0);

    for (index, registration) in registrations.iter().enumerate() {
      for (key, _) in &registration.services {
        all.entry(key.clone()).or_default().push(index);
        if registration.preserve_existing && defaults.contains_key(key) {
          continue;
        }
        defaults.insert(key.clone(), index);
      }
    }

    let mut open_defaults: HashMap<(ServiceKey, usize), usize> = HashMap::new();
    let mut open_all: HashMap<(ServiceKey, usize), Vec<usize>> = HashMap::new();
    for (index, registration) in open.iter().enumerate() {
      let shape = (registration.definition.clone(), registration.arity);
      open_all.entry(shape.clone()).or_default().push(index);
      if registration.preserve_existing && open_defaults.contains_key(&shape) {
        continue;
      }
      open_defaults.insert(shape, index);
    }

    debug!(
      registrations = registrations.len(),
      services = all.len(),
      open_generics = open.len(),
      "catalog built"
    );

    Self {
      registrations: registrations.into_iter().map(Arc::new).collect(),
      defaults,
      all,
      open: open.into_iter().map(Arc::new).collect(),
      open_defaults,
      open_all,
      closed: DashMap::new(),
      next_id: AtomicU64::new(next_id),
    }
  }

  /// The registration that answers a request for exactly `key`.
  pub(crate) fn lookup(&self, key: &ServiceKey) -> Result<Arc<Registration>> {
    if let Some(&index) = self.defaults.get(key) {
      return Ok(Arc::clone(&self.registrations[index]));
    }
    if key.is_generic() {
      if let Some(&index) = self.open_defaults.get(&Self::shape(key)) {
        return Ok(self.close_generic(key, index));
      }
    }
    Err(Error::ServiceNotRegistered(key.clone()))
  }

  /// Every registration satisfying `key`, in registration order.
  pub(crate) fn lookup_all(&self, key: &ServiceKey) -> Vec<Arc<Registration>> {
    let mut found: Vec<Arc<Registration>> = self
      .all
      .get(key)
      .map(|indices| {
        indices
          .iter()
          .map(|&index| Arc::clone(&self.registrations[index]))
          .collect()
      })
      .unwrap_or_default();
    if key.is_generic() {
      if let Some(indices) = self.open_all.get(&Self::shape(key)) {
        found.extend(indices.iter().map(|&index| self.close_generic(key, index)));
      }
    }
    found
  }

  pub(crate) fn contains(&self, key: &ServiceKey) -> bool {
    self.defaults.contains_key(key)
      || (key.is_generic() && self.open_defaults.contains_key(&Self::shape(key)))
  }

  /// The open definition and arity a closed key is looked up under.
  fn shape(key: &ServiceKey) -> (ServiceKey, usize) {
    (key.definition(), key.args().len())
  }

  pub(crate) fn len(&self) -> usize {
    self.registrations.len()
  }

  /// Binds open registration `index` to the arguments of `key`, once.
  fn close_generic(&self, key: &ServiceKey, index: usize) -> Arc<Registration> {
    let cache_key = (key.clone(), index);
    if let Some(existing) = self.closed.get(&cache_key) {
      return Arc::clone(existing.value());
    }
    let entry = self.closed.entry(cache_key).or_insert_with(|| {
      let id: RegistrationId = self.next_id.fetch_add(1, Ordering::Relaxed);
      trace!(key = %key, id, "closing open-generic registration");
      debug_assert!(self.open[index].accepts(key));
      Arc::new(self.open[index].close(id, key))
    });
    Arc::clone(entry.value())
  }
}
