//! Entity registry and lifecycle driver.
//!
//! # Mental Model
//!
//! - The [`Runtime`] owns every entity in a dense arena indexed by [`Handle`].
//! - It is built in two phases. During the build phase entities are added
//!   directly ([`Runtime::add`]) or through loaders
//!   ([`Runtime::add_with_loader`], [`Runtime::load`]). [`Runtime::load`] ends
//!   the build phase by snapshotting the lifecycle participants and locking
//!   the structure.
//! - After the lock the arena and the id index are read-only. Every lookup is
//!   `&self` and returns references tied to the runtime.
//! - [`Runtime::run`] drives the participants through their phases around the
//!   [`EventLoop`].
//!
//! # Invariants
//!
//! - Handles of live entities are exactly `0..entity_count()`, in
//!   registration order.
//! - The id index is a bijection onto the handles. A failed construction
//!   leaves both untouched.
//! - Handle 0 is the [`DefaultLoader`], registered under the empty id.
//! - Entities drop in reverse registration order.

use std::cell::Cell;
use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::{Span, debug, info, info_span};

use crate::config::{self, ApplicationConfig, Fragment};
use crate::entity::{BasicEntity, CapabilitySet, Entity, EntityContext, EntityId, Handle, Narrow};
use crate::error::{Error, Result};
use crate::event_loop::{EventLoop, ShutdownHandle};
use crate::lifecycle::{Lifecycle, LifecycleState, Phase};
use crate::loader::{DEFAULT_LOADER_ID, DefaultLoader, FromFragment, LOGGER, Loader, LoaderFn};
use crate::logging;


const DEFAULT_LOADER: Handle = Handle::new(0);

struct Slot {
	entity: Box<dyn Entity>,
	caps: CapabilitySet,
}

struct Participant {
	handle: Handle,
	state: Cell<LifecycleState>,
}

/// Owner of every entity, the id index and the event loop.
pub struct Runtime {
	slots: Vec<Slot>,
	ids: FxHashMap<EntityId, Handle>,
	participants: Vec<Participant>,
	locked: bool,
	ran: Cell<bool>,
	event_loop: EventLoop,
	span: Span,
}

impl Runtime {
	/// Creates a runtime holding only the [`DefaultLoader`] with the builtin
	/// `LOGGER` loader function.
	pub fn new() -> Self {
		let mut rt = Self {
			slots: Vec::new(),
			ids: FxHashMap::default(),
			participants: Vec::new(),
			locked: false,
			ran: Cell::new(false),
			event_loop: EventLoop::new(),
			span: info_span!("app"),
		};

		let id = EntityId::from(DEFAULT_LOADER_ID);
		let mut default_loader = DefaultLoader::new(EntityContext::new(id.clone(), DEFAULT_LOADER));
		let logger: LoaderFn = Box::new(load_logger);
		let builtin = default_loader.register(LOGGER.to_owned(), logger);
		debug_assert!(builtin.is_ok(), "fresh loader table rejected {LOGGER}");

		let caps = CapabilitySet::of(&default_loader);
		rt.slots.push(Slot {
			entity: Box::new(default_loader),
			caps,
		});
		rt.ids.insert(id, DEFAULT_LOADER);
		rt
	}

	/// Constructs an entity in place from its context.
	pub fn add<T: Entity>(&mut self, id: impl Into<EntityId>, make: impl FnOnce(EntityContext) -> T) -> Result<Handle> {
		let id = id.into();
		let ctx = self.reserve(&id, "add entity")?;
		let entity = make(ctx);
		let handle = self.insert(id, Box::new(entity))?;
		self.span
			.in_scope(|| info!(entity = %self.slots[handle.index()].entity.id(), %handle, "loaded with constructor"));
		Ok(handle)
	}

	/// Constructs an entity through the loader named by `loader_ref`.
	///
	/// `loader_ref` is first resolved as an entity id; a live [`Loader`] entity
	/// builds the new entity. Otherwise it is a key into the default loader's
	/// function table.
	pub fn add_with_loader(&mut self, id: impl Into<EntityId>, loader_ref: &str, fragment: &Fragment) -> Result<Handle> {
		let id = id.into();
		let ctx = self.reserve(&id, "load entity")?;

		let entity = match self.resolve(loader_ref) {
			Some(loader) => self.get::<dyn Loader>(loader)?.load(ctx, fragment, self)?,
			None => self.default_loader()?.load_with(loader_ref, ctx, fragment, self)?,
		};

		let handle = self.insert(id, entity)?;
		self.span.in_scope(|| {
			info!(
				entity = %self.slots[handle.index()].entity.id(),
				%handle,
				loader = loader_ref,
				"loaded with loader"
			)
		});
		Ok(handle)
	}

	/// Adds a loader function to the default loader's table.
	pub fn register_loader<F>(&mut self, key: impl Into<String>, function: F) -> Result<()>
	where
		F: Fn(&Fragment, EntityContext, &Runtime) -> Result<Box<dyn Entity>> + 'static,
	{
		if self.locked {
			return Err(Error::StructureLocked {
				operation: "register loader",
			});
		}
		self.default_loader_mut()?.register(key.into(), Box::new(function))
	}

	/// Registers a loader function deserializing the fragment into
	/// `T::Config` before calling [`FromFragment::from_fragment`].
	pub fn register_typed_loader<T: FromFragment>(&mut self, key: impl Into<String>) -> Result<()> {
		self.register_loader(key, |fragment, ctx, rt| {
			let config = config::typed::<T::Config>(fragment, ctx.id())?;
			let entity: Box<dyn Entity> = Box::new(T::from_fragment(config, ctx, rt)?);
			Ok(entity)
		})
	}

	/// Builds every entity of `config` in order, then locks the structure.
	pub fn load(&mut self, config: &ApplicationConfig) -> Result<()> {
		if self.locked {
			return Err(Error::StructureLocked {
				operation: "load configuration",
			});
		}
		for entity in &config.entities {
			self.add_with_loader(entity.name.as_str(), &entity.loader_ref, &entity.config)?;
		}

		self.participants = self
			.slots
			.iter()
			.enumerate()
			.filter(|(_, slot)| slot.caps.contains(CapabilitySet::LIFECYCLE))
			.map(|(index, _)| Participant {
				handle: Handle::new(index),
				state: Cell::new(LifecycleState::Unstarted),
			})
			.collect();
		self.slots.shrink_to_fit();
		self.locked = true;

		self.span.in_scope(|| {
			info!(
				entities = self.slots.len(),
				participants = self.participants.len(),
				"application structure locked"
			)
		});
		Ok(())
	}

	/// Reads the configuration document at `path` and [`Runtime::load`]s it.
	pub fn load_file(&mut self, path: &Path) -> Result<()> {
		let config = config::load_document(path)?;
		self.span
			.in_scope(|| info!(path = %path.display(), entities = config.entities.len(), "configuration read"));
		self.load(&config)
	}

	/// Handle registered under `id`, if any.
	pub fn resolve(&self, id: &str) -> Option<Handle> {
		self.ids.get(id).copied()
	}

	pub fn entity(&self, handle: Handle) -> Result<&dyn Entity> {
		self.slots
			.get(handle.index())
			.map(|slot| &*slot.entity)
			.ok_or(Error::NoSuchHandle(handle))
	}

	/// Narrows the entity at `handle` to a concrete type or a capability.
	pub fn get<T: ?Sized + Narrow>(&self, handle: Handle) -> Result<&T> {
		let slot = self.slots.get(handle.index()).ok_or(Error::NoSuchHandle(handle))?;
		slot.caps
			.contains(T::required())
			.then(|| T::narrow(&*slot.entity))
			.flatten()
			.ok_or_else(|| Error::CapabilityMismatch {
				id: slot.entity.id().clone(),
				handle,
				expected: T::describe(),
			})
	}

	pub fn get_by_id<T: ?Sized + Narrow>(&self, id: &str) -> Result<&T> {
		let handle = self.resolve(id).ok_or_else(|| Error::NoSuchEntity(id.to_owned()))?;
		self.get(handle)
	}

	/// Visits every entity narrowing to `T`, in registration order.
	pub fn for_each<T: ?Sized + Narrow>(&self, mut visitor: impl FnMut(&T)) {
		for slot in &self.slots {
			if slot.caps.contains(T::required())
				&& let Some(target) = T::narrow(&*slot.entity)
			{
				visitor(target);
			}
		}
	}

	pub fn entity_count(&self) -> usize {
		self.slots.len()
	}

	pub fn is_locked(&self) -> bool {
		self.locked
	}

	/// Lifecycle participants in registration order. Empty before the lock.
	pub fn participants(&self) -> impl ExactSizeIterator<Item = Handle> + '_ {
		self.participants.iter().map(|participant| participant.handle)
	}

	/// Persisted lifecycle state, `None` for non-participants.
	pub fn lifecycle_state(&self, handle: Handle) -> Option<LifecycleState> {
		self.participants
			.iter()
			.find(|participant| participant.handle == handle)
			.map(|participant| participant.state.get())
	}

	pub fn event_loop(&self) -> &EventLoop {
		&self.event_loop
	}

	/// Requests the event loop to stop once queued work drained. Idempotent.
	pub fn shutdown(&self) {
		if self.event_loop.shutdown() {
			self.span.in_scope(|| info!("shutdown requested"));
		}
	}

	pub fn shutdown_handle(&self) -> ShutdownHandle {
		self.event_loop.shutdown_handle()
	}

	/// Process-wide topic id of payload type `P` and `subject`.
	pub fn topic_id<P: 'static>(&self, subject: &str) -> Result<loam_topics::TopicId> {
		Ok(loam_topics::topic_id_for::<P>(subject)?)
	}

	/// Drives the participants through their lifecycle around the event loop.
	///
	/// Returns when the loop stopped and every participant was stopped and
	/// finalized. A failing `init` or `start` aborts immediately.
	pub fn run(&self) -> Result<()> {
		if !self.locked {
			return Err(Error::NotLocked);
		}
		if self.ran.replace(true) {
			return Err(Error::EventLoop("runtime already ran".to_owned()));
		}
		let _app = self.span.enter();

		info!("initializing lifecycle participants");
		self.advance(Phase::Init, LifecycleState::Initialized, |participant, rt| participant.init(rt))?;

		info!("scheduling lifecycle participants ping");
		for participant in &self.participants {
			let handle = participant.handle;
			self.event_loop.post(move |rt| rt.announce_up(handle));
		}
		self.event_loop.post(|rt| rt.span.in_scope(|| info!("UP")));

		info!("starting lifecycle participants");
		self.advance(Phase::Start, LifecycleState::Started, |participant, rt| participant.start(rt))?;

		info!("running event loop");
		let looped = self.event_loop.run(self);

		info!("stopping lifecycle participants");
		self.retreat(Phase::Stop, LifecycleState::Stopped, |participant, rt| participant.stop(rt));
		info!("finalizing lifecycle participants");
		self.retreat(Phase::Fini, LifecycleState::Finalized, |participant, rt| participant.fini(rt));

		info!("finished");
		looped
	}

	fn reserve(&self, id: &EntityId, operation: &'static str) -> Result<EntityContext> {
		if self.locked {
			return Err(Error::StructureLocked { operation });
		}
		if self.ids.contains_key(id) {
			return Err(Error::DuplicateEntity(id.clone()));
		}
		Ok(EntityContext::new(id.clone(), Handle::new(self.slots.len())))
	}

	fn insert(&mut self, id: EntityId, entity: Box<dyn Entity>) -> Result<Handle> {
		let handle = Handle::new(self.slots.len());
		if *entity.id() != id || entity.handle() != handle {
			return Err(Error::IdentityMismatch {
				expected_id: id,
				expected_handle: handle,
				actual_id: entity.id().clone(),
				actual_handle: entity.handle(),
			});
		}
		let caps = CapabilitySet::of(&*entity);
		self.slots.push(Slot { entity, caps });
		self.ids.insert(id, handle);
		Ok(handle)
	}

	fn default_loader(&self) -> Result<&DefaultLoader> {
		self.get::<DefaultLoader>(DEFAULT_LOADER)
	}

	fn default_loader_mut(&mut self) -> Result<&mut DefaultLoader> {
		let slot = self.slots.get_mut(DEFAULT_LOADER.index()).ok_or(Error::NoSuchHandle(DEFAULT_LOADER))?;
		let entity: &mut dyn std::any::Any = &mut *slot.entity;
		match entity.downcast_mut::<DefaultLoader>() {
			Some(default_loader) => Ok(default_loader),
			None => Err(Error::CapabilityMismatch {
				id: EntityId::from(DEFAULT_LOADER_ID),
				handle: DEFAULT_LOADER,
				expected: "DefaultLoader",
			}),
		}
	}

	fn participant(&self, handle: Handle) -> Result<(&dyn Entity, &dyn Lifecycle)> {
		Ok((self.entity(handle)?, self.get::<dyn Lifecycle>(handle)?))
	}

	fn advance(
		&self,
		phase: Phase,
		reached: LifecycleState,
		hook: impl Fn(&dyn Lifecycle, &Runtime) -> Result<()>,
	) -> Result<()> {
		for participant in &self.participants {
			let (entity, lifecycle) = self.participant(participant.handle)?;
			debug!(entity = %entity.id(), %phase, "entering phase");
			entity
				.context()
				.span()
				.in_scope(|| hook(lifecycle, self))
				.map_err(|source| Error::Lifecycle {
					phase,
					id: entity.id().clone(),
					source: Box::new(source),
				})?;
			participant.state.set(reached);
		}
		Ok(())
	}

	fn retreat(&self, phase: Phase, reached: LifecycleState, hook: impl Fn(&dyn Lifecycle, &Runtime)) {
		for participant in self.participants.iter().rev() {
			let Ok((entity, lifecycle)) = self.participant(participant.handle) else {
				continue;
			};
			debug!(entity = %entity.id(), %phase, "entering phase");
			entity.context().span().in_scope(|| hook(lifecycle, self));
			participant.state.set(reached);
		}
	}

	fn announce_up(&self, handle: Handle) {
		let Ok((entity, lifecycle)) = self.participant(handle) else {
			return;
		};
		entity.context().span().in_scope(|| {
			info!("UP");
			lifecycle.on_up(self);
		});
	}
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for Runtime {
	fn drop(&mut self) {
		while self.slots.pop().is_some() {}
	}
}

fn load_logger(fragment: &Fragment, ctx: EntityContext, _rt: &Runtime) -> Result<Box<dyn Entity>> {
	let spec = fragment
		.as_str()
		.ok_or_else(|| Error::Logger(format!("`{}` expects a logger specification string", ctx.id())))?;
	logging::configure(spec)?;
	Ok(Box::new(BasicEntity::new(ctx)))
}
