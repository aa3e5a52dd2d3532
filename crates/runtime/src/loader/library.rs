use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;

use crate::entity::{Entity, EntityContext};
use crate::error::{Error, Result};

/// Loaded native module.
///
/// Shared through `Arc`: every [`LibraryFn`] resolved from it keeps the module
/// mapped, so no symbol outlives its code.
#[derive(Debug)]
pub struct DynamicLibrary {
	path: PathBuf,
	library: Library,
}

impl DynamicLibrary {
	/// Opens the module at `path`. Bare file names use the platform search path.
	pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
		let path = path.as_ref().to_path_buf();
		// SAFETY: opening runs the module's initializers; which modules to load is
		// the configuration author's decision.
		let library = unsafe { Library::new(&path) }.map_err(|source| Error::LibraryOpen {
			path: path.clone(),
			source,
		})?;
		Ok(Arc::new(Self { path, library }))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Resolves `symbol` as a value of type `F`.
	///
	/// # Safety
	///
	/// `F` must be the exact type of the exported symbol, typically an
	/// `unsafe extern "C" fn` pointer.
	pub unsafe fn function<F: Copy>(self: &Arc<Self>, symbol: &str) -> Result<LibraryFn<F>> {
		// SAFETY: forwarded to the caller.
		let func = unsafe { self.library.get::<F>(symbol.as_bytes()) }
			.map(|resolved| *resolved)
			.map_err(|source| Error::SymbolNotFound {
				path: self.path.clone(),
				symbol: symbol.to_owned(),
				source,
			})?;
		Ok(LibraryFn {
			func,
			library: Arc::clone(self),
		})
	}
}

/// Symbol resolved from a [`DynamicLibrary`], pinning the library while alive.
#[derive(Debug, Clone)]
pub struct LibraryFn<F> {
	func: F,
	library: Arc<DynamicLibrary>,
}

impl<F> LibraryFn<F> {
	pub fn library(&self) -> &Arc<DynamicLibrary> {
		&self.library
	}
}

impl<F> Deref for LibraryFn<F> {
	type Target = F;

	fn deref(&self) -> &F {
		&self.func
	}
}

/// Entity owning one loaded library.
pub struct LibraryEntity {
	ctx: EntityContext,
	library: Arc<DynamicLibrary>,
}

impl LibraryEntity {
	pub fn new(ctx: EntityContext, library: Arc<DynamicLibrary>) -> Self {
		Self { ctx, library }
	}

	pub fn library(&self) -> &Arc<DynamicLibrary> {
		&self.library
	}

	/// # Safety
	///
	/// See [`DynamicLibrary::function`].
	pub unsafe fn function<F: Copy>(&self, symbol: &str) -> Result<LibraryFn<F>> {
		// SAFETY: forwarded to the caller.
		unsafe { self.library.function(symbol) }
	}
}

impl Entity for LibraryEntity {
	fn context(&self) -> &EntityContext {
		&self.ctx
	}
}
