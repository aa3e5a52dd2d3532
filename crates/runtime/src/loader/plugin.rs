use tracing::info;

use super::Loader;
use super::abi::{self, EntityConstructor};
use super::library::LibraryEntity;
use crate::Runtime;
use crate::config::{Fragment, required_str};
use crate::entity::{Entity, EntityContext};
use crate::error::Result;
use crate::reference::LazyRef;

/// Loader constructing entities through a constructor exported by a library
/// entity.
///
/// Fragment fields: `library_ref` names a [`LibraryEntity`], `constructor` the
/// exported symbol (see [`export_entity!`](crate::export_entity)).
pub struct PluginRepository {
	ctx: EntityContext,
}

impl PluginRepository {
	pub fn new(ctx: EntityContext) -> Self {
		Self { ctx }
	}
}

impl Loader for PluginRepository {
	fn load(&self, ctx: EntityContext, fragment: &Fragment, rt: &Runtime) -> Result<Box<dyn Entity>> {
		let library_ref = required_str(fragment, "library_ref", ctx.id())?;
		let constructor = required_str(fragment, "constructor", ctx.id())?;

		let library = LazyRef::<LibraryEntity>::new(library_ref).resolve(rt)?;
		// SAFETY: constructors are exported with the `EntityConstructor` signature.
		let ctor = unsafe { library.function::<EntityConstructor>(constructor)? };

		self.ctx.span().in_scope(|| {
			info!(
				entity = %ctx.id(),
				library = library_ref,
				constructor,
				"constructing plugin entity"
			)
		});
		// SAFETY: the library entity outlives every entity constructed after it,
		// so the code behind `ctor` stays mapped for the entity's lifetime.
		unsafe { abi::construct(*ctor, constructor, ctx, rt) }
	}
}

impl Entity for PluginRepository {
	fn context(&self) -> &EntityContext {
		&self.ctx
	}

	fn as_loader(&self) -> Option<&(dyn Loader + 'static)> {
		Some(self)
	}
}
