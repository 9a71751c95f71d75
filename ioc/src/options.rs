//! Container-wide options.

use crate::registration::Lifetime;

/// Options applied to every scope of a built container.
///
/// With the `serde` feature enabled these can be loaded from any serde
/// format; unspecified fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContainerOptions {
  /// Lifetime given to registrations that never call a lifetime method.
  pub default_lifetime: Lifetime,
  /// Close a scope (disposing its instances) when its handle is dropped.
  pub dispose_on_drop: bool,
}

impl Default for ContainerOptions {
  fn default() -> Self {
    Self {
      default_lifetime: Lifetime::Transient,
      dispose_on_drop: true,
    }
  }
}

impl ContainerOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn default_lifetime(mut self, lifetime: Lifetime) -> Self {
    self.default_lifetime = lifetime;
    self
  }

  pub fn dispose_on_drop(mut self, enabled: bool) -> Self {
    self.dispose_on_drop = enabled;
    self
  }
}
