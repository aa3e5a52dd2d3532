/// Topic allocation failures.
///
/// Both variants are resource exhaustion of a counter that is never
/// reclaimed, so callers treat them as fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
	/// No payload id left for a new payload type.
	#[error("could not register payload type [{payload_type}] - too many payload types ({registered}) already registered")]
	PayloadsExhausted { payload_type: &'static str, registered: u32 },

	/// No subject id left for a new subject of one payload type.
	#[error(
		"could not register subject [{subject}] for payload type [{payload_type}] - maximum number of topic subjects ({registered}) already registered for the payload type"
	)]
	SubjectsExhausted {
		subject: String,
		payload_type: &'static str,
		registered: u32,
	},
}
