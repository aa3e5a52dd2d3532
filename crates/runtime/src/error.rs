//! Fatal error types.
//!
//! Everything in here aborts bring-up. Nothing is retried and the registry is
//! not rolled back; the process entry point reports the error and exits.
//! Data-carrying transient errors live in [`crate::messaging`].

use std::path::PathBuf;

use crate::entity::{EntityId, Handle};
use crate::lifecycle::Phase;

/// Boxed error produced by entity code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Structural mutation after the structure lock.
	#[error("cannot {operation} - application structure already locked, likely a bug in the code")]
	StructureLocked { operation: &'static str },

	/// Lifecycle driver invoked before the structure lock.
	#[error("cannot run - application structure is not locked yet, load the configuration first")]
	NotLocked,

	#[error("duplicate entity ID `{0}`, check configuration")]
	DuplicateEntity(EntityId),

	#[error("duplicate loader registration for entity ID `{0}`")]
	DuplicateLoader(String),

	#[error("no entity with ID `{0}`")]
	NoSuchEntity(String),

	#[error("no entity with handle {0}")]
	NoSuchHandle(Handle),

	/// The stored entity does not implement the requested capability or type.
	#[error("`{id}`<{handle}> is not {expected}")]
	CapabilityMismatch {
		id: EntityId,
		handle: Handle,
		expected: &'static str,
	},

	#[error("no default loader `{loader}` registered for entity `{entity}`")]
	NoDefaultLoader { loader: String, entity: EntityId },

	/// A loader returned an entity built for another id or handle.
	#[error("loader produced `{actual_id}`<{actual_handle}> when `{expected_id}`<{expected_handle}> was requested")]
	IdentityMismatch {
		expected_id: EntityId,
		expected_handle: Handle,
		actual_id: EntityId,
		actual_handle: Handle,
	},

	#[error("failed to load library {path}: {source}")]
	LibraryOpen {
		path: PathBuf,
		#[source]
		source: libloading::Error,
	},

	#[error("symbol `{symbol}` not found in {path}: {source}")]
	SymbolNotFound {
		path: PathBuf,
		symbol: String,
		#[source]
		source: libloading::Error,
	},

	/// The foreign constructor refused the host or handed back something the
	/// host cannot adopt.
	#[error("plugin constructor `{symbol}` rejected: {reason}")]
	PluginAbi { symbol: String, reason: String },

	#[error("I/O error reading {path}: {source}")]
	ConfigIo {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("configuration parse error: {0}")]
	ConfigParse(#[from] toml::de::Error),

	#[error("entity `{entity}`: missing required configuration field `{field}`")]
	MissingField { entity: EntityId, field: &'static str },

	#[error("entity `{entity}`: invalid configuration: {source}")]
	InvalidFragment {
		entity: EntityId,
		#[source]
		source: toml::de::Error,
	},

	#[error("logger configuration: {0}")]
	Logger(String),

	/// `init` or `start` of a participant failed.
	#[error("{phase} of `{id}` failed: {source}")]
	Lifecycle {
		phase: Phase,
		id: EntityId,
		#[source]
		source: Box<Error>,
	},

	#[error(transparent)]
	Topic(#[from] loam_topics::TopicError),

	#[error("event loop: {0}")]
	EventLoop(String),

	/// Error raised by entity code.
	#[error(transparent)]
	Other(#[from] BoxError),
}

impl Error {
	/// Wraps an arbitrary message raised by entity code.
	pub fn msg(message: impl Into<String>) -> Self {
		let message: String = message.into();
		Self::Other(message.into())
	}
}

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
