//! Construction of entities from configuration fragments.
//!
//! # Resolution
//!
//! [`Runtime::add_with_loader`] resolves the loader reference of an entity
//! entry in two stages:
//!
//! 1. If the reference names a live entity with the [`Loader`] capability,
//!    that entity builds the new one. The empty reference names the
//!    [`DefaultLoader`] itself, which then looks up a loader function under
//!    the new entity's own id.
//! 2. Otherwise the reference is a key into the [`DefaultLoader`] function
//!    table.
//!
//! # Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`DefaultLoader`] | Builtin entity at handle 0 owning the loader function table. |
//! | [`DynamicLibrary`] | Shared handle to a loaded native module. |
//! | [`LibraryRepository`] | Loader turning `filename` into a [`LibraryEntity`]. |
//! | [`PluginRepository`] | Loader invoking a foreign constructor through [`abi`]. |
//!
//! [`Runtime::add_with_loader`]: crate::Runtime::add_with_loader

pub mod abi;
mod default;
mod library;
mod plugin;
mod repository;

use serde::de::DeserializeOwned;

pub use default::DefaultLoader;
pub use library::{DynamicLibrary, LibraryEntity, LibraryFn};
pub use plugin::PluginRepository;
pub use repository::LibraryRepository;

use crate::Runtime;
use crate::config::Fragment;
use crate::entity::{Entity, EntityContext};
use crate::error::Result;

/// Id of the builtin [`DefaultLoader`] entity.
pub const DEFAULT_LOADER_ID: &str = "";

/// Builtin loader function configuring the logging subsystem.
pub const LOGGER: &str = "LOGGER";

/// Loader function key producing a [`LibraryRepository`].
pub const LIBRARY_REPOSITORY: &str = "LIBRARY_REPOSITORY";

/// Loader function key producing a [`PluginRepository`].
pub const PLUGIN_REPOSITORY: &str = "PLUGIN_REPOSITORY";

/// Entity capability: builds other entities from configuration.
pub trait Loader {
	/// Builds the entity described by `ctx` from `fragment`.
	///
	/// The returned entity must carry `ctx` (same id and handle).
	fn load(&self, ctx: EntityContext, fragment: &Fragment, rt: &Runtime) -> Result<Box<dyn Entity>>;
}

/// Type-erased loader function stored in the [`DefaultLoader`] table.
pub type LoaderFn = Box<dyn Fn(&Fragment, EntityContext, &Runtime) -> Result<Box<dyn Entity>>>;

/// Entity constructible from a typed configuration fragment.
///
/// Registered with [`Runtime::register_typed_loader`].
///
/// [`Runtime::register_typed_loader`]: crate::Runtime::register_typed_loader
pub trait FromFragment: Entity + Sized {
	type Config: DeserializeOwned;

	fn from_fragment(config: Self::Config, ctx: EntityContext, rt: &Runtime) -> Result<Self>;
}

/// Registers the repository loader functions.
pub fn register_standard(rt: &mut Runtime) -> Result<()> {
	rt.register_loader(LIBRARY_REPOSITORY, |_, ctx, _| {
		let entity: Box<dyn Entity> = Box::new(LibraryRepository::new(ctx));
		Ok(entity)
	})?;
	rt.register_loader(PLUGIN_REPOSITORY, |_, ctx, _| {
		let entity: Box<dyn Entity> = Box::new(PluginRepository::new(ctx));
		Ok(entity)
	})
}
