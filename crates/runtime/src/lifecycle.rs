//! Five-phase lifecycle capability.
//!
//! Phases are driven by [`Runtime::run`] only, never by the entity itself:
//!
//! 1. `init`, construction order. Entities exist; resolve [`LazyRef`]s here.
//! 2. `up` is posted to the event loop for every participant. The runtime
//!    logs reachability itself, then calls [`Lifecycle::on_up`].
//! 3. `start`, construction order. Asynchronous work goes through
//!    [`Runtime::event_loop`].
//! 4. The event loop runs until shutdown.
//! 5. `stop`, reverse construction order.
//! 6. `fini`, reverse construction order.
//!
//! `stop` and `fini` run after the event loop has returned. Anything they post
//! to the loop is dropped, so they must be purely synchronous.
//!
//! [`Runtime::run`]: crate::Runtime::run
//! [`Runtime::event_loop`]: crate::Runtime::event_loop
//! [`LazyRef`]: crate::LazyRef

use std::fmt;

use crate::Runtime;
use crate::error::Result;

/// Optional lifecycle capability of an entity.
///
/// Hooks take `&self`; participants keep mutable state behind `Cell`,
/// `RefCell` or `OnceCell`.
pub trait Lifecycle {
	/// Participants may look up and cache references to each other.
	fn init(&self, _rt: &Runtime) -> Result<()> {
		Ok(())
	}

	/// Participants may schedule timers and begin asynchronous work.
	fn start(&self, _rt: &Runtime) -> Result<()> {
		Ok(())
	}

	/// Runs from the event loop right after the runtime logged this
	/// participant as reachable.
	fn on_up(&self, _rt: &Runtime) {}

	/// Reverse of [`Lifecycle::start`]. Must not fail.
	fn stop(&self, _rt: &Runtime) {}

	/// Reverse of [`Lifecycle::init`]. Must not fail.
	fn fini(&self, _rt: &Runtime) {}
}

/// Lifecycle phase, used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	Init,
	Up,
	Start,
	Stop,
	Fini,
}

impl Phase {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Init => "init",
			Self::Up => "up",
			Self::Start => "start",
			Self::Stop => "stop",
			Self::Fini => "fini",
		}
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Persisted state of a participant. `Up` is a notification, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
	#[default]
	Unstarted,
	Initialized,
	Started,
	Stopped,
	Finalized,
}
