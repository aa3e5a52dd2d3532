//! C-ABI boundary for entity constructors exported by native modules.
//!
//! A plugin exports one `extern "C"` function per constructible entity type,
//! generated by [`export_entity!`](crate::export_entity). The host calls it with
//! a [`ConstructRequest`]; the guest answers with a [`ConstructResponse`]
//! holding an owned `Box<Box<dyn Entity>>`.
//!
//! The entity crosses the boundary as a Rust trait object, so host and plugin
//! must be built against the same `loam-runtime` with the same toolchain. The
//! version and tag exchanged on both sides reject the obvious mismatches.
//!
//! A dynamically loaded plugin carries its own copy of `tracing`, whose global
//! dispatcher starts out unset. The host hands over its current
//! [`Dispatch`] with every request and the guest installs it as its global
//! default, so plugin events reach the host's subscriber.

use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use tracing::{Dispatch, dispatcher, error};

use crate::Runtime;
use crate::entity::{Entity, EntityContext};
use crate::error::{Error, Result};

pub const ENTITY_ABI_VERSION: u32 = 2;

/// Build identity of the runtime crate on either side of the boundary.
pub const ENTITY_ABI_TAG: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiStatus {
	Ok = 0,
	Incompatible = 1,
	Failed = 2,
}

/// Host to guest. `context` points to an [`EntityContext`], `runtime` to the
/// calling [`Runtime`] and `dispatch` to the host's [`Dispatch`] or null; all
/// are borrowed for the duration of the call.
#[repr(C)]
pub struct ConstructRequest {
	pub abi_version: u32,
	pub tag_ptr: *const u8,
	pub tag_len: usize,
	pub context: *const c_void,
	pub runtime: *const c_void,
	pub dispatch: *const c_void,
}

/// Guest to host. `entity` is a `Box<Box<dyn Entity>>` turned raw, or null.
#[repr(C)]
pub struct ConstructResponse {
	pub abi_version: u32,
	pub tag_ptr: *const u8,
	pub tag_len: usize,
	pub entity: *mut c_void,
}

impl ConstructResponse {
	fn empty() -> Self {
		Self {
			abi_version: 0,
			tag_ptr: ptr::null(),
			tag_len: 0,
			entity: ptr::null_mut(),
		}
	}
}

pub type EntityConstructor = unsafe extern "C" fn(*const ConstructRequest, *mut ConstructResponse) -> AbiStatus;

/// Reads a tag string, `None` when null or not UTF-8.
///
/// # Safety
///
/// A non-null `ptr` must be valid for `len` bytes.
unsafe fn tag<'a>(ptr: *const u8, len: usize) -> Option<&'a str> {
	if ptr.is_null() {
		return None;
	}
	// SAFETY: upheld by the caller.
	std::str::from_utf8(unsafe { std::slice::from_raw_parts(ptr, len) }).ok()
}

/// Host side: calls `ctor` and adopts the entity it returns.
///
/// # Safety
///
/// `ctor` must be a function generated by [`export_entity!`](crate::export_entity)
/// whose code stays mapped for as long as the returned entity lives.
pub unsafe fn construct(ctor: EntityConstructor, symbol: &str, ctx: EntityContext, rt: &Runtime) -> Result<Box<dyn Entity>> {
	let reject = |reason: String| Error::PluginAbi {
		symbol: symbol.to_owned(),
		reason,
	};

	let dispatch = dispatcher::has_been_set().then(|| dispatcher::get_default(Dispatch::clone));
	let request = ConstructRequest {
		abi_version: ENTITY_ABI_VERSION,
		tag_ptr: ENTITY_ABI_TAG.as_ptr(),
		tag_len: ENTITY_ABI_TAG.len(),
		context: ptr::from_ref(&ctx).cast(),
		runtime: ptr::from_ref(rt).cast(),
		dispatch: dispatch.as_ref().map_or(ptr::null(), |dispatch| ptr::from_ref(dispatch).cast()),
	};
	let mut response = ConstructResponse::empty();

	// SAFETY: both pointers are valid for the call; the signature is upheld by the caller.
	let status = unsafe { ctor(&request, &mut response) };
	if status != AbiStatus::Ok {
		return Err(reject(format!("constructor returned {status:?}")));
	}
	if response.abi_version != ENTITY_ABI_VERSION {
		return Err(reject(format!(
			"ABI version mismatch: host {ENTITY_ABI_VERSION}, plugin {}",
			response.abi_version
		)));
	}
	// SAFETY: the guest points the tag at a static string.
	let guest_tag = unsafe { tag(response.tag_ptr, response.tag_len) };
	if guest_tag != Some(ENTITY_ABI_TAG) {
		// The entity's layout cannot be trusted, so it is leaked rather than dropped.
		return Err(reject(format!(
			"runtime mismatch: host `{ENTITY_ABI_TAG}`, plugin `{}`",
			guest_tag.unwrap_or("<invalid>")
		)));
	}
	if response.entity.is_null() {
		return Err(reject("constructor returned no entity".to_owned()));
	}

	// SAFETY: produced by `construct_guest` from `Box::into_raw(Box<Box<dyn Entity>>)`.
	let entity = unsafe { Box::from_raw(response.entity.cast::<Box<dyn Entity>>()) };
	Ok(*entity)
}

/// Guest side of [`construct`]; the body of every exported constructor.
///
/// # Safety
///
/// `request` and `response` must be the pointers the host passed in.
pub unsafe fn construct_guest<E, F>(request: *const ConstructRequest, response: *mut ConstructResponse, make: F) -> AbiStatus
where
	E: Entity,
	F: FnOnce(EntityContext, &Runtime) -> Result<E>,
{
	if request.is_null() || response.is_null() {
		return AbiStatus::Failed;
	}
	// SAFETY: non-null and valid for the call per the host contract.
	let (request, response) = unsafe { (&*request, &mut *response) };
	*response = ConstructResponse {
		abi_version: ENTITY_ABI_VERSION,
		tag_ptr: ENTITY_ABI_TAG.as_ptr(),
		tag_len: ENTITY_ABI_TAG.len(),
		entity: ptr::null_mut(),
	};

	// SAFETY: the host points the tag at a static string.
	if request.abi_version != ENTITY_ABI_VERSION || unsafe { tag(request.tag_ptr, request.tag_len) } != Some(ENTITY_ABI_TAG) {
		return AbiStatus::Incompatible;
	}
	if request.context.is_null() || request.runtime.is_null() {
		return AbiStatus::Failed;
	}

	// SAFETY: matching version and tag mean both sides agree on these types.
	let (ctx, rt) = unsafe { ((*request.context.cast::<EntityContext>()).clone(), &*request.runtime.cast::<Runtime>()) };
	// SAFETY: as above; null when the host has no global subscriber.
	if let Some(host) = unsafe { request.dispatch.cast::<Dispatch>().as_ref() } {
		adopt_dispatch(host);
	}

	match catch_unwind(AssertUnwindSafe(|| make(ctx, rt))) {
		Ok(Ok(entity)) => {
			let entity: Box<dyn Entity> = Box::new(entity);
			response.entity = Box::into_raw(Box::new(entity)).cast();
			AbiStatus::Ok
		}
		Ok(Err(err)) => {
			error!(error = %err, "plugin constructor failed");
			AbiStatus::Failed
		}
		Err(_) => {
			error!("plugin constructor panicked");
			AbiStatus::Failed
		}
	}
}

/// Installs the host's dispatcher unless this copy of `tracing` already has a
/// global default, which is always the case when host and guest share it.
fn adopt_dispatch(host: &Dispatch) {
	if !dispatcher::has_been_set() {
		// Lost races leave the winner in place.
		let _ = dispatcher::set_global_default(host.clone());
	}
}

/// Exports an entity constructor under `symbol` for [`PluginRepository`].
///
/// `make` is called as `make(ctx, rt)` and returns `Result<E>` for some
/// entity type `E`.
///
/// ```ignore
/// loam_runtime::export_entity!(greeter_ctor, |ctx, _rt| Ok(Greeter::new(ctx)));
/// ```
///
/// [`PluginRepository`]: crate::loader::PluginRepository
#[macro_export]
macro_rules! export_entity {
	($symbol:ident, $make:expr) => {
		/// # Safety
		/// Called by the host's plugin repository with pointers it owns.
		#[unsafe(no_mangle)]
		pub unsafe extern "C" fn $symbol(
			request: *const $crate::loader::abi::ConstructRequest,
			response: *mut $crate::loader::abi::ConstructResponse,
		) -> $crate::loader::abi::AbiStatus {
			unsafe { $crate::loader::abi::construct_guest(request, response, $make) }
		}
	};
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::{EntityId, Handle};

	struct Probe {
		ctx: EntityContext,
	}

	impl Entity for Probe {
		fn context(&self) -> &EntityContext {
			&self.ctx
		}
	}

	crate::export_entity!(loam_test_probe_ctor, |ctx, _rt| Ok(Probe { ctx }));

	crate::export_entity!(loam_test_failing_ctor, |_ctx, _rt| -> Result<Probe> {
		Err(Error::msg("refused"))
	});

	unsafe extern "C" fn stale_ctor(_request: *const ConstructRequest, response: *mut ConstructResponse) -> AbiStatus {
		unsafe {
			(*response).abi_version = ENTITY_ABI_VERSION + 1;
		}
		AbiStatus::Ok
	}

	fn ctx() -> EntityContext {
		EntityContext::new(EntityId::from("probe"), Handle::new(3))
	}

	#[test]
	fn adopts_guest_entity() {
		let rt = Runtime::new();
		let entity = unsafe { construct(loam_test_probe_ctor, "loam_test_probe_ctor", ctx(), &rt) }.unwrap();
		assert_eq!(entity.id(), "probe");
		assert_eq!(entity.handle(), Handle::new(3));
		let any: &dyn std::any::Any = &*entity;
		assert!(any.is::<Probe>());
	}

	#[test]
	fn guest_failure_is_reported() {
		let rt = Runtime::new();
		let err = unsafe { construct(loam_test_failing_ctor, "loam_test_failing_ctor", ctx(), &rt) }
			.err()
			.unwrap();
		assert_eq!(
			err.to_string(),
			"plugin constructor `loam_test_failing_ctor` rejected: constructor returned Failed"
		);
	}

	#[test]
	fn version_mismatch_is_rejected() {
		let rt = Runtime::new();
		let err = unsafe { construct(stale_ctor, "stale_ctor", ctx(), &rt) }.err().unwrap();
		assert!(matches!(&err, Error::PluginAbi { reason, .. } if reason.starts_with("ABI version mismatch")));
	}

	#[test]
	fn guest_rejects_null_pointers() {
		let status = unsafe { loam_test_probe_ctor(ptr::null(), ptr::null_mut()) };
		assert_eq!(status, AbiStatus::Failed);
	}
}
