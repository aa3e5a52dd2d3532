//! Entity runtime: a registry of named components built from configuration,
//! driven through a five-phase lifecycle around a single-threaded event loop.
//!
//! # Overview
//!
//! | Module | Role |
//! |--------|------|
//! | [`entity`] | Identity ([`EntityId`], [`Handle`]) and capability narrowing. |
//! | [`runtime`] | The [`Runtime`]: arena, id index, structure lock, lifecycle driver. |
//! | [`lifecycle`] | The optional [`Lifecycle`] capability. |
//! | [`loader`] | Loader capability, default loader table, libraries and plugins. |
//! | [`reference`] | [`LazyRef`], name-to-entity binding resolved after the build phase. |
//! | [`event_loop`] | FIFO task queue, timers and shutdown. |
//! | [`config`] | TOML configuration documents. |
//! | [`logging`] | Reloadable `tracing` subscriber. |
//! | [`messaging`] | Transient delivery errors. |
//!
//! # Bring-up
//!
//! ```no_run
//! use loam_runtime::{Runtime, loader, logging};
//!
//! fn main() -> loam_runtime::Result<()> {
//!     logging::init()?;
//!     let mut rt = Runtime::new();
//!     loader::register_standard(&mut rt)?;
//!     rt.load_file("config.toml".as_ref())?;
//!     rt.run()
//! }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod event_loop;
pub mod lifecycle;
pub mod loader;
pub mod logging;
pub mod messaging;
pub mod reference;
pub mod runtime;

pub use config::{ApplicationConfig, EntityConfig, Fragment};
pub use entity::{BasicEntity, CapabilitySet, Entity, EntityContext, EntityId, Handle, Narrow};
pub use error::{BoxError, Error, Result};
pub use event_loop::{EventLoop, ShutdownHandle};
pub use lifecycle::{Lifecycle, LifecycleState, Phase};
pub use loader::{FromFragment, Loader};
pub use messaging::MessagingError;
pub use reference::LazyRef;
pub use runtime::Runtime;
