use rustc_hash::FxHashMap;
use tracing::info;

use super::{Loader, LoaderFn};
use crate::Runtime;
use crate::config::Fragment;
use crate::entity::{Entity, EntityContext};
use crate::error::{Error, Result};

/// Builtin loader entity owning the keyed table of loader functions.
pub struct DefaultLoader {
	ctx: EntityContext,
	functions: FxHashMap<String, LoaderFn>,
}

impl DefaultLoader {
	pub fn new(ctx: EntityContext) -> Self {
		Self {
			ctx,
			functions: FxHashMap::default(),
		}
	}

	/// Adds a loader function under `key`. Keys are unique.
	pub fn register(&mut self, key: String, function: LoaderFn) -> Result<()> {
		if self.functions.contains_key(&key) {
			return Err(Error::DuplicateLoader(key));
		}
		self.ctx.span().in_scope(|| info!(key = %key, "registered loader function"));
		self.functions.insert(key, function);
		Ok(())
	}

	pub fn contains(&self, key: &str) -> bool {
		self.functions.contains_key(key)
	}

	/// Builds an entity with the function registered under `key`.
	pub fn load_with(&self, key: &str, ctx: EntityContext, fragment: &Fragment, rt: &Runtime) -> Result<Box<dyn Entity>> {
		let Some(function) = self.functions.get(key) else {
			return Err(Error::NoDefaultLoader {
				loader: key.to_owned(),
				entity: ctx.id().clone(),
			});
		};
		function(fragment, ctx, rt)
	}
}

impl Loader for DefaultLoader {
	/// Uses the new entity's own id as the function key.
	fn load(&self, ctx: EntityContext, fragment: &Fragment, rt: &Runtime) -> Result<Box<dyn Entity>> {
		let key = ctx.id().clone();
		self.load_with(key.as_str(), ctx, fragment, rt)
	}
}

impl Entity for DefaultLoader {
	fn context(&self) -> &EntityContext {
		&self.ctx
	}

	fn as_loader(&self) -> Option<&(dyn Loader + 'static)> {
		Some(self)
	}
}
