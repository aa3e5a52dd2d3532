//! Entity identity and capability narrowing.
//!
//! # Mental Model
//!
//! - An [`EntityId`] is the human-assigned name from configuration.
//! - A [`Handle`] is the dense index the runtime assigns at construction; it
//!   equals the number of entities registered before it.
//! - Every entity owns an [`EntityContext`] carrying both plus a tracing span
//!   keyed by the id.
//! - Capabilities ([`Lifecycle`], [`Loader`]) are optional traits an entity
//!   exposes through [`Entity::as_lifecycle`] / [`Entity::as_loader`]. The
//!   runtime records them once, at registration, as a [`CapabilitySet`].
//!
//! [`Narrow`] is the single narrowing seam: concrete entity types narrow by
//! downcast, capability trait objects narrow through the accessors above.

use std::any::{Any, type_name};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use tracing::Span;

use crate::lifecycle::Lifecycle;
use crate::loader::Loader;

/// Immutable entity name, unique within one runtime.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Arc<str>);

impl EntityId {
	pub fn new(id: impl Into<Arc<str>>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for EntityId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for EntityId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Borrow<str> for EntityId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for EntityId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for EntityId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for EntityId {
	fn from(id: String) -> Self {
		Self::new(id)
	}
}

impl PartialEq<str> for EntityId {
	fn eq(&self, other: &str) -> bool {
		&*self.0 == other
	}
}

impl PartialEq<&str> for EntityId {
	fn eq(&self, other: &&str) -> bool {
		&*self.0 == *other
	}
}

/// Dense zero-based entity index.
///
/// Handles of live entities always form the contiguous range
/// `[0, entity_count)` and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
	pub const fn new(index: usize) -> Self {
		Self(index)
	}

	pub const fn index(self) -> usize {
		self.0
	}
}

impl fmt::Display for Handle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Identity and logging scope handed to every entity constructor.
#[derive(Debug, Clone)]
pub struct EntityContext {
	id: EntityId,
	handle: Handle,
	span: Span,
}

impl EntityContext {
	pub fn new(id: EntityId, handle: Handle) -> Self {
		let span = tracing::info_span!("entity", id = %id, handle = handle.index());
		Self { id, handle, span }
	}

	pub fn id(&self) -> &EntityId {
		&self.id
	}

	pub fn handle(&self) -> Handle {
		self.handle
	}

	/// Span every log line of this entity should be emitted under.
	pub fn span(&self) -> &Span {
		&self.span
	}
}

/// Base capability of every component owned by the runtime.
pub trait Entity: Any {
	fn context(&self) -> &EntityContext;

	fn id(&self) -> &EntityId {
		self.context().id()
	}

	fn handle(&self) -> Handle {
		self.context().handle()
	}

	/// Exposes the lifecycle capability, if implemented.
	fn as_lifecycle(&self) -> Option<&(dyn Lifecycle + 'static)> {
		None
	}

	/// Exposes the loader capability, if implemented.
	fn as_loader(&self) -> Option<&(dyn Loader + 'static)> {
		None
	}
}

bitflags::bitflags! {
	/// Capabilities recorded for an entity at registration time.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct CapabilitySet: u8 {
		const LIFECYCLE = 1 << 0;
		const LOADER = 1 << 1;
	}
}

impl CapabilitySet {
	/// Probes the optional capabilities of `entity`.
	pub fn of(entity: &dyn Entity) -> Self {
		let mut caps = Self::empty();
		caps.set(Self::LIFECYCLE, entity.as_lifecycle().is_some());
		caps.set(Self::LOADER, entity.as_loader().is_some());
		caps
	}
}

/// Narrowing from a stored entity to a concrete type or a capability.
pub trait Narrow: 'static {
	fn narrow<'a>(entity: &'a (dyn Entity + 'static)) -> Option<&'a Self>;

	/// Capabilities an entity must have recorded to be a candidate.
	fn required() -> CapabilitySet {
		CapabilitySet::empty()
	}

	/// Name used in capability mismatch errors.
	fn describe() -> &'static str {
		type_name::<Self>()
	}
}

impl<T: Entity> Narrow for T {
	fn narrow<'a>(entity: &'a (dyn Entity + 'static)) -> Option<&'a Self> {
		let any: &dyn Any = entity;
		any.downcast_ref::<T>()
	}
}

impl Narrow for dyn Lifecycle {
	fn narrow<'a>(entity: &'a (dyn Entity + 'static)) -> Option<&'a Self> {
		entity.as_lifecycle()
	}

	fn required() -> CapabilitySet {
		CapabilitySet::LIFECYCLE
	}

	fn describe() -> &'static str {
		"Lifecycle"
	}
}

impl Narrow for dyn Loader {
	fn narrow<'a>(entity: &'a (dyn Entity + 'static)) -> Option<&'a Self> {
		entity.as_loader()
	}

	fn required() -> CapabilitySet {
		CapabilitySet::LOADER
	}

	fn describe() -> &'static str {
		"Loader"
	}
}

/// Entity with no behavior beyond its identity.
#[derive(Debug)]
pub struct BasicEntity {
	ctx: EntityContext,
}

impl BasicEntity {
	pub fn new(ctx: EntityContext) -> Self {
		Self { ctx }
	}
}

impl Entity for BasicEntity {
	fn context(&self) -> &EntityContext {
		&self.ctx
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Participant {
		ctx: EntityContext,
	}

	impl Lifecycle for Participant {}

	impl Entity for Participant {
		fn context(&self) -> &EntityContext {
			&self.ctx
		}

		fn as_lifecycle(&self) -> Option<&(dyn Lifecycle + 'static)> {
			Some(self)
		}
	}

	fn ctx(id: &str, index: usize) -> EntityContext {
		EntityContext::new(EntityId::from(id), Handle::new(index))
	}

	#[test]
	fn capability_set_reflects_accessors() {
		let plain = BasicEntity::new(ctx("plain", 0));
		let participant = Participant { ctx: ctx("p", 1) };

		assert_eq!(CapabilitySet::of(&plain), CapabilitySet::empty());
		assert_eq!(CapabilitySet::of(&participant), CapabilitySet::LIFECYCLE);
	}

	#[test]
	fn narrow_by_type_and_capability() {
		let participant: Box<dyn Entity> = Box::new(Participant { ctx: ctx("p", 0) });

		assert!(Participant::narrow(&*participant).is_some());
		assert!(BasicEntity::narrow(&*participant).is_none());
		assert!(<dyn Lifecycle as Narrow>::narrow(&*participant).is_some());
		assert!(<dyn Loader as Narrow>::narrow(&*participant).is_none());
		assert_eq!(<dyn Lifecycle as Narrow>::describe(), "Lifecycle");
	}

	#[test]
	fn entity_id_compares_with_str() {
		let id = EntityId::from("svc");
		assert_eq!(id, "svc");
		assert_eq!(id.to_string(), "svc");
		assert_eq!(format!("{id:?}"), "\"svc\"");
	}
}
