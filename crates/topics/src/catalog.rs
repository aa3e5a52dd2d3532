use std::any::{TypeId, type_name};
use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::{PayloadId, SubjectId, TopicError, TopicId};

/// Subject interner for one payload type.
#[derive(Debug)]
struct PayloadTopics {
	id: PayloadId,
	subjects: FxHashMap<String, SubjectId>,
}

/// Owner of the payload counter and the per-type subject interners.
///
/// Ids are never reclaimed. A catalog only grows, so exhaustion can only
/// happen while new payload types or subjects are being introduced.
#[derive(Debug)]
pub struct TopicCatalog {
	payloads: FxHashMap<TypeId, PayloadTopics>,
	last_payload: PayloadId,
	max_payload: PayloadId,
	max_subject: SubjectId,
}

impl Default for TopicCatalog {
	fn default() -> Self {
		Self::new()
	}
}

impl TopicCatalog {
	/// Creates a catalog using the full 32-bit range of both counters.
	pub fn new() -> Self {
		Self::with_limits(PayloadId::MAX, SubjectId::MAX)
	}

	/// Creates a catalog whose counters refuse to hand out `max_payload` /
	/// `max_subject` or anything above.
	pub fn with_limits(max_payload: PayloadId, max_subject: SubjectId) -> Self {
		Self {
			payloads: FxHashMap::default(),
			last_payload: 0,
			max_payload,
			max_subject,
		}
	}

	/// Returns the topic id for payload type `P` and `subject`, interning
	/// whatever is new.
	pub fn topic_id<P: 'static>(&mut self, subject: &str) -> Result<TopicId, TopicError> {
		let max_subject = self.max_subject;
		let topics = self.payload_topics::<P>()?;

		if let Some(&subject_id) = topics.subjects.get(subject) {
			return Ok(TopicId::new(topics.id, subject_id));
		}

		let registered = topics.subjects.len() as SubjectId;
		let next = registered + 1;
		if next >= max_subject {
			return Err(TopicError::SubjectsExhausted {
				subject: subject.to_owned(),
				payload_type: type_name::<P>(),
				registered,
			});
		}

		topics.subjects.insert(subject.to_owned(), next);
		Ok(TopicId::new(topics.id, next))
	}

	/// Returns the payload id of `P`, assigning one on first use.
	pub fn payload_id<P: 'static>(&mut self) -> Result<PayloadId, TopicError> {
		self.payload_topics::<P>().map(|topics| topics.id)
	}

	/// Returns the number of payload types seen so far.
	pub fn len(&self) -> usize {
		self.payloads.len()
	}

	/// Returns `true` when no payload type has been seen.
	pub fn is_empty(&self) -> bool {
		self.payloads.is_empty()
	}

	/// Returns the number of subjects interned for `P`.
	pub fn subject_count<P: 'static>(&self) -> usize {
		self.payloads
			.get(&TypeId::of::<P>())
			.map_or(0, |topics| topics.subjects.len())
	}

	fn payload_topics<P: 'static>(&mut self) -> Result<&mut PayloadTopics, TopicError> {
		match self.payloads.entry(TypeId::of::<P>()) {
			Entry::Occupied(entry) => Ok(entry.into_mut()),
			Entry::Vacant(entry) => {
				let next = self.last_payload + 1;
				if next >= self.max_payload {
					return Err(TopicError::PayloadsExhausted {
						payload_type: type_name::<P>(),
						registered: self.last_payload,
					});
				}
				self.last_payload = next;
				Ok(entry.insert(PayloadTopics {
					id: next,
					subjects: FxHashMap::default(),
				}))
			}
		}
	}
}
