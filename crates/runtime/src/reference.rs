use std::cell::OnceCell;
use std::fmt;
use std::marker::PhantomData;

use crate::Runtime;
use crate::entity::{EntityId, Handle, Narrow};
use crate::error::{Error, Result};

/// Deferred, typed binding from an entity name to the entity.
///
/// Holds only the name until [`LazyRef::resolve`] succeeds; afterwards the
/// cached handle makes every access a constant-time index into the runtime.
/// Resolve once all entities exist, typically from [`Lifecycle::init`].
///
/// [`Lifecycle::init`]: crate::Lifecycle::init
pub struct LazyRef<T: ?Sized> {
	id: EntityId,
	handle: OnceCell<Handle>,
	_target: PhantomData<fn() -> *const T>,
}

impl<T: ?Sized + Narrow> LazyRef<T> {
	pub fn new(id: impl Into<EntityId>) -> Self {
		Self {
			id: id.into(),
			handle: OnceCell::new(),
			_target: PhantomData,
		}
	}

	pub fn id(&self) -> &EntityId {
		&self.id
	}

	/// Cached handle, once resolved.
	pub fn handle(&self) -> Option<Handle> {
		self.handle.get().copied()
	}

	pub fn is_resolved(&self) -> bool {
		self.handle.get().is_some()
	}

	/// Looks the name up and narrows the entity to `T`.
	///
	/// Fails when no entity has the name, or when it is not a `T`.
	pub fn resolve<'rt>(&self, rt: &'rt Runtime) -> Result<&'rt T> {
		let handle = rt
			.resolve(self.id.as_str())
			.ok_or_else(|| Error::NoSuchEntity(self.id.to_string()))?;
		let target = rt.get::<T>(handle)?;
		let _ = self.handle.set(handle);
		Ok(target)
	}

	/// Returns the target, or `None` before a successful resolve.
	pub fn try_get<'rt>(&self, rt: &'rt Runtime) -> Option<&'rt T> {
		let handle = *self.handle.get()?;
		rt.get::<T>(handle).ok()
	}

	/// Returns the target.
	///
	/// # Panics
	///
	/// Panics when called before [`LazyRef::resolve`] succeeded.
	pub fn get<'rt>(&self, rt: &'rt Runtime) -> &'rt T {
		match self.try_get(rt) {
			Some(target) => target,
			None => panic!("lazy reference to `{}` used before resolve", self.id),
		}
	}
}

impl<T: ?Sized> fmt::Debug for LazyRef<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LazyRef")
			.field("id", &self.id)
			.field("handle", &self.handle.get())
			.finish()
	}
}
