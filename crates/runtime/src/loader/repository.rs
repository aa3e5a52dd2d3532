use tracing::info;

use super::Loader;
use super::library::{DynamicLibrary, LibraryEntity};
use crate::Runtime;
use crate::config::{Fragment, required_str};
use crate::entity::{Entity, EntityContext};
use crate::error::Result;

/// Loader opening the native module named by the fragment's `filename`.
pub struct LibraryRepository {
	ctx: EntityContext,
}

impl LibraryRepository {
	pub fn new(ctx: EntityContext) -> Self {
		Self { ctx }
	}
}

impl Loader for LibraryRepository {
	fn load(&self, ctx: EntityContext, fragment: &Fragment, _rt: &Runtime) -> Result<Box<dyn Entity>> {
		let filename = required_str(fragment, "filename", ctx.id())?;
		let library = DynamicLibrary::open(filename)?;
		self.ctx
			.span()
			.in_scope(|| info!(library = %ctx.id(), filename, "opened library"));
		Ok(Box::new(LibraryEntity::new(ctx, library)))
	}
}

impl Entity for LibraryRepository {
	fn context(&self) -> &EntityContext {
		&self.ctx
	}

	fn as_loader(&self) -> Option<&(dyn Loader + 'static)> {
		Some(self)
	}
}
