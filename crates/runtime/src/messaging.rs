//! Transient, data-carrying delivery errors.
//!
//! Unlike [`crate::Error`], these are expected at runtime: the sender gets the
//! undelivered message back and decides whether to retry or reroute.

use std::sync::Arc;

use crate::entity::Handle;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError<M> {
	/// The destination exists but cannot take the message now.
	#[error("destination unreachable from <{origin}>")]
	DestinationUnreachable { message: Arc<M>, origin: Handle },

	/// No route leads to the destination.
	#[error("route not found from <{origin}>")]
	RouteNotFound { message: Arc<M>, origin: Handle },
}

impl<M> MessagingError<M> {
	pub fn message(&self) -> &Arc<M> {
		match self {
			Self::DestinationUnreachable { message, .. } | Self::RouteNotFound { message, .. } => message,
		}
	}

	/// Handle of the entity that attempted the delivery.
	pub fn origin(&self) -> Handle {
		match self {
			Self::DestinationUnreachable { origin, .. } | Self::RouteNotFound { origin, .. } => *origin,
		}
	}

	pub fn is_routing(&self) -> bool {
		matches!(self, Self::RouteNotFound { .. })
	}

	pub fn into_message(self) -> Arc<M> {
		match self {
			Self::DestinationUnreachable { message, .. } | Self::RouteNotFound { message, .. } => message,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn carries_message_back() {
		let err = MessagingError::RouteNotFound {
			message: Arc::new("ping"),
			origin: Handle::new(2),
		};
		assert!(err.is_routing());
		assert_eq!(err.origin(), Handle::new(2));
		assert_eq!(err.to_string(), "route not found from <2>");
		assert_eq!(*err.into_message(), "ping");

		let err = MessagingError::DestinationUnreachable {
			message: Arc::new(7u32),
			origin: Handle::new(0),
		};
		assert!(!err.is_routing());
		assert_eq!(**err.message(), 7);
	}
}
