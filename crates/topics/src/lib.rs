//! Topic addressing for typed payloads.
//!
//! A topic is the pair of a payload type and a subject string. Each pair maps
//! to a dense [`TopicId`] that stays stable for as long as the owning
//! [`TopicCatalog`] lives.
//!
//! # Allocation
//!
//! - The first use of a payload type takes the next value of a single payload
//!   counter shared by all types (starting at 1).
//! - Each payload type interns its own subjects; the first use of a subject
//!   takes the next value of that type's subject counter (starting at 1).
//! - Both counters only grow. Running out of either one is fatal for the
//!   caller and reported as [`TopicError`].
//!
//! Tests and embedders should own a [`TopicCatalog`]. The process-wide
//! catalog behind [`global`] exists for code that has no owner to thread a
//! catalog through.

mod catalog;
mod error;
mod id;

use std::sync::OnceLock;

use parking_lot::Mutex;

pub use catalog::TopicCatalog;
pub use error::TopicError;
pub use id::{PayloadId, SubjectId, TopicId};

/// Returns the process-wide topic catalog.
pub fn global() -> &'static Mutex<TopicCatalog> {
	static GLOBAL: OnceLock<Mutex<TopicCatalog>> = OnceLock::new();
	GLOBAL.get_or_init(|| Mutex::new(TopicCatalog::new()))
}

/// Resolves a topic id against the process-wide catalog.
pub fn topic_id_for<P: 'static>(subject: &str) -> Result<TopicId, TopicError> {
	global().lock().topic_id::<P>(subject)
}
