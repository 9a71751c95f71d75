//! Service keys: the identity a consumer asks the container to resolve.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identifies a service contract.
///
/// A contract is any `'static` type: a concrete struct, a trait object such as
/// `dyn Log`, or a marker type standing in for an open-generic contract.
#[derive(Clone, Copy)]
pub struct Contract {
  id: TypeId,
  name: &'static str,
}

impl Contract {
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: type_name::<T>(),
    }
  }

  pub fn type_id(&self) -> TypeId {
    self.id
  }

  pub fn name(&self) -> &'static str {
    self.name
  }
}

impl PartialEq for Contract {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for Contract {}

impl Hash for Contract {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for Contract {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Contract({})", self.name)
  }
}

/// A concrete type argument supplied when closing an open-generic contract.
#[derive(Clone, Copy)]
pub struct TypeArg {
  id: TypeId,
  name: &'static str,
}

impl TypeArg {
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: type_name::<T>(),
    }
  }

  pub fn type_id(&self) -> TypeId {
    self.id
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn is<T: ?Sized + Any>(&self) -> bool {
    self.id == TypeId::of::<T>()
  }
}

impl PartialEq for TypeArg {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for TypeArg {}

impl Hash for TypeArg {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for TypeArg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

/// The ordered type arguments of a closed generic service key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypeArgs(Arc<[TypeArg]>);

impl Default for TypeArgs {
  fn default() -> Self {
    Self(Arc::from(Vec::new()))
  }
}

impl TypeArgs {
  /// An empty argument list, as used by every non-generic key.
  pub fn new() -> Self {
    Self::default()
  }

  /// A single-argument list: `TypeArgs::of::<i32>()` closes `IList<>` as `IList<i32>`.
  pub fn of<A: ?Sized + Any>() -> Self {
    Self::new().with::<A>()
  }

  /// Appends another argument.
  pub fn with<A: ?Sized + Any>(self) -> Self {
    let mut args: Vec<TypeArg> = self.0.iter().copied().collect();
    args.push(TypeArg::of::<A>());
    Self(args.into())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<TypeArg> {
    self.0.get(index).copied()
  }

  /// Returns `true` if the argument at `index` is `A`.
  pub fn is<A: ?Sized + Any>(&self, index: usize) -> bool {
    self.get(index).is_some_and(|arg| arg.is::<A>())
  }

  pub fn iter(&self) -> impl Iterator<Item = &TypeArg> {
    self.0.iter()
  }
}

impl fmt::Debug for TypeArgs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.0.iter()).finish()
  }
}

impl fmt::Display for TypeArgs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("<")?;
    for (i, arg) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      f.write_str(arg.name)?;
    }
    f.write_str(">")
  }
}

/// The identity of a requested capability.
///
/// Two keys are equal iff their contract, their type arguments and their
/// optional service name all match exactly.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
  contract: Contract,
  args: TypeArgs,
  name: Option<Arc<str>>,
}

impl ServiceKey {
  /// The key for the type `T` itself.
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      contract: Contract::of::<T>(),
      args: TypeArgs::new(),
      name: None,
    }
  }

  /// The key for `T` registered under `name`.
  pub fn named<T: ?Sized + Any>(name: &str) -> Self {
    Self::of::<T>().with_name(name)
  }

  /// A closed generic key: the contract marker `C` bound to `args`.
  pub fn generic<C: ?Sized + Any>(args: TypeArgs) -> Self {
    Self {
      contract: Contract::of::<C>(),
      args,
      name: None,
    }
  }

  pub fn with_name(mut self, name: &str) -> Self {
    self.name = Some(Arc::from(name));
    self
  }

  pub fn contract(&self) -> Contract {
    self.contract
  }

  pub fn args(&self) -> &TypeArgs {
    &self.args
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn is_generic(&self) -> bool {
    !self.args.is_empty()
  }

  /// The open shape of this key: same contract and name, no type arguments.
  pub(crate) fn definition(&self) -> ServiceKey {
    Self {
      contract: self.contract,
      args: TypeArgs::new(),
      name: self.name.clone(),
    }
  }
}

impl fmt::Display for ServiceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.contract.name)?;
    if !self.args.is_empty() {
      write!(f, "{}", self.args)?;
    }
    if let Some(name) = &self.name {
      write!(f, "[{}]", name)?;
    }
    Ok(())
  }
}

impl fmt::Debug for ServiceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ServiceKey({})", self)
  }
}
