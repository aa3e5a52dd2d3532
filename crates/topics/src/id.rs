use std::fmt;

/// Per payload type identifier, assigned from the shared payload counter.
pub type PayloadId = u32;

/// Per subject identifier, assigned from one payload type's subject counter.
pub type SubjectId = u32;

/// 64-bit topic address.
///
/// The payload id occupies the upper 32 bits and the subject id the lower 32
/// bits, so distinct `(payload, subject)` pairs never share an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicId(u64);

impl TopicId {
	/// Combines a payload id and a subject id.
	pub const fn new(payload: PayloadId, subject: SubjectId) -> Self {
		Self(((payload as u64) << PayloadId::BITS) | subject as u64)
	}

	/// Returns the payload half.
	pub const fn payload(self) -> PayloadId {
		(self.0 >> PayloadId::BITS) as PayloadId
	}

	/// Returns the subject half.
	pub const fn subject(self) -> SubjectId {
		self.0 as SubjectId
	}

	/// Returns the raw 64-bit value.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl From<TopicId> for u64 {
	fn from(id: TopicId) -> Self {
		id.0
	}
}

impl fmt::Display for TopicId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.payload(), self.subject())
	}
}
