//! Minimal example plugin: a heartbeat entity that logs a few beats from the
//! event loop and then requests shutdown.
//!
//! Exported constructor: `heartbeat_ctor`.

use std::cell::Cell;
use std::time::Duration;

use loam_runtime::{Entity, EntityContext, Handle, Lifecycle, Result, Runtime};
use tracing::info;

const INTERVAL: Duration = Duration::from_millis(250);
const BEATS: u32 = 3;

pub struct Heartbeat {
	ctx: EntityContext,
	beats: Cell<u32>,
}

impl Heartbeat {
	pub fn new(ctx: EntityContext) -> Self {
		Self { ctx, beats: Cell::new(0) }
	}

	pub fn beats(&self) -> u32 {
		self.beats.get()
	}

	fn beat(&self, rt: &Runtime) {
		let beat = self.beats.get() + 1;
		self.beats.set(beat);
		self.ctx.span().in_scope(|| info!(beat, "heartbeat"));

		if beat < BEATS {
			schedule(rt, self.ctx.handle());
		} else {
			rt.shutdown();
		}
	}
}

fn schedule(rt: &Runtime, handle: Handle) {
	rt.event_loop().post_after(INTERVAL, move |rt| {
		if let Ok(heartbeat) = rt.get::<Heartbeat>(handle) {
			heartbeat.beat(rt);
		}
	});
}

impl Lifecycle for Heartbeat {
	fn start(&self, rt: &Runtime) -> Result<()> {
		schedule(rt, self.ctx.handle());
		Ok(())
	}

	fn stop(&self, _rt: &Runtime) {
		info!(beats = self.beats.get(), "heartbeat stopped");
	}
}

impl Entity for Heartbeat {
	fn context(&self) -> &EntityContext {
		&self.ctx
	}

	fn as_lifecycle(&self) -> Option<&(dyn Lifecycle + 'static)> {
		Some(self)
	}
}

loam_runtime::export_entity!(heartbeat_ctor, |ctx, _rt| Ok(Heartbeat::new(ctx)));

#[cfg(test)]
mod tests {
	use loam_runtime::loader::abi;

	use super::*;

	#[test]
	fn beats_then_shuts_down() {
		let mut rt = Runtime::new();
		rt.add("heartbeat", Heartbeat::new).unwrap();
		rt.load(&Default::default()).unwrap();
		rt.run().unwrap();

		assert_eq!(rt.get_by_id::<Heartbeat>("heartbeat").unwrap().beats(), BEATS);
	}

	#[test]
	fn exported_constructor_builds_heartbeat() {
		let rt = Runtime::new();
		let ctx = EntityContext::new("pulse".into(), Handle::new(1));
		let entity = unsafe { abi::construct(heartbeat_ctor, "heartbeat_ctor", ctx, &rt) }.unwrap();
		assert_eq!(entity.id(), "pulse");
		assert!(entity.as_lifecycle().is_some());
	}
}
