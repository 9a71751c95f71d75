//! Immutable registration records and their construction strategies.

use crate::activator::Activation;
use crate::error::BoxError;
use crate::instance::Instance;
use crate::key::{ServiceKey, TypeArg, TypeArgs};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// How long a resolved instance lives and who shares it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lifetime {
  /// A new instance for every resolution.
  #[default]
  Transient,
  /// One instance for the whole scope tree, created against the root scope.
  SingleInstance,
  /// One instance per lifetime scope.
  InstancePerLifetimeScope,
}

impl fmt::Display for Lifetime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Lifetime::Transient => write!(f, "Transient"),
      Lifetime::SingleInstance => write!(f, "SingleInstance"),
      Lifetime::InstancePerLifetimeScope => write!(f, "InstancePerLifetimeScope"),
    }
  }
}

/// A constructor input, resolved by the activator before construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
  /// The default implementation of the key.
  Service(ServiceKey),
  /// Every implementation of the key, in registration order.
  All(ServiceKey),
  /// A deferred handle resolving the key on first access.
  Lazy(ServiceKey),
  /// A callable that builds the key from a call-time argument.
  Factory(ServiceKey),
}

impl Dependency {
  pub fn key(&self) -> &ServiceKey {
    match self {
      Dependency::Service(key)
      | Dependency::All(key)
      | Dependency::Lazy(key)
      | Dependency::Factory(key) => key,
    }
  }
}

impl fmt::Display for Dependency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Dependency::Service(key) => write!(f, "{}", key),
      Dependency::All(key) => write!(f, "all {}", key),
      Dependency::Lazy(key) => write!(f, "lazy {}", key),
      Dependency::Factory(key) => write!(f, "factory {}", key),
    }
  }
}

pub(crate) type RegistrationId = u64;

/// Converts the canonical instance into the type served under one key.
pub(crate) type Caster = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;
pub(crate) type Disposer = Arc<dyn Fn(&Instance) + Send + Sync>;
pub(crate) type ConstructFn =
  Arc<dyn Fn(&Activation<'_>) -> Result<Instance, BoxError> + Send + Sync>;
pub(crate) type ParameterizedFn =
  Arc<dyn Fn(Box<dyn Any + Send>, &Activation<'_>) -> Result<Instance, BoxError> + Send + Sync>;
pub(crate) type OpenFactoryFn =
  Arc<dyn Fn(&TypeArgs, &Activation<'_>) -> Result<Instance, BoxError> + Send + Sync>;

pub(crate) fn identity_caster() -> Caster {
  Arc::new(|instance: &Instance| Some(instance.clone()))
}

pub(crate) enum Strategy {
  /// Direct construction or delegate invocation.
  Construct(ConstructFn),
  /// Construction that needs an argument only known at call time.
  Parameterized {
    argument: TypeArg,
    build: ParameterizedFn,
  },
}

pub(crate) struct Registration {
  pub(crate) id: RegistrationId,
  pub(crate) implementation: &'static str,
  pub(crate) services: Vec<(ServiceKey, Caster)>,
  pub(crate) lifetime: Lifetime,
  pub(crate) dependencies: Vec<Dependency>,
  pub(crate) strategy: Strategy,
  pub(crate) disposer: Option<Disposer>,
  pub(crate) preserve_existing: bool,
}

impl Registration {
  /// Views the canonical instance as the type served under `key`.
  pub(crate) fn cast(&self, key: &ServiceKey, instance: &Instance) -> Option<Instance> {
    self
      .services
      .iter()
      .find(|(service, _)| service == key)
      .and_then(|(_, caster)| caster(instance))
  }
}

impl fmt::Debug for Registration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registration")
      .field("id", &self.id)
      .field("implementation", &self.implementation)
      .field(
        "services",
        &self.services.iter().map(|(key, _)| key).collect::<Vec<_>>(),
      )
      .field("lifetime", &self.lifetime)
      .field("dependencies", &self.dependencies)
      .field("preserve_existing", &self.preserve_existing)
      .finish()
  }
}

/// A registration parameterized over type arguments, closed on first use.
pub(crate) struct OpenRegistration {
  pub(crate) implementation: &'static str,
  pub(crate) definition: ServiceKey,
  pub(crate) lifetime: Lifetime,
  /// Number of type arguments a closed key must carry.
  pub(crate) arity: usize,
  pub(crate) dependencies: Vec<Dependency>,
  pub(crate) factory: OpenFactoryFn,
  pub(crate) disposer: Option<Disposer>,
  pub(crate) preserve_existing: bool,
}

impl OpenRegistration {
  pub(crate) fn accepts(&self, key: &ServiceKey) -> bool {
    key.args().len() == self.arity
  }

  /// Synthesizes the concrete registration serving `key`.
  pub(crate) fn close(&self, id: RegistrationId, key: &ServiceKey) -> Registration {
    let factory = Arc::clone(&self.factory);
    let args = key.args().clone();
    Registration {
      id,
      implementation: self.implementation,
      services: vec![(key.clone(), identity_caster())],
      lifetime: self.lifetime,
      dependencies: self.dependencies.clone(),
      strategy: Strategy::Construct(Arc::new(move |activation: &Activation<'_>| {
        factory(&args, activation)
      })),
      disposer: self.disposer.clone(),
      preserve_existing: self.preserve_existing,
    }
  }
}
