//! Error types.

use std::net::SocketAddr;
use thiserror::Error;

/// A hostname lookup did not produce any usable addresses.
///
/// Lookup errors are stored in a shared [`Lookup`][crate::Lookup] record,
/// so they are cheap to clone and do not hold on to the original [`std::io::Error`].
#[derive(Debug, Clone, Error)]
pub enum LookupError {
	/// The resolver reported an error.
	#[error("failed to resolve {hostname}:{port}: {message}")]
	Failed {
		/// The hostname that was looked up.
		hostname: String,

		/// The port that was requested along with the hostname.
		port: u16,

		/// The kind of the I/O error reported by the resolver.
		kind: std::io::ErrorKind,

		/// The message of the I/O error reported by the resolver.
		message: String,
	},

	/// The resolver did not answer in time.
	#[error("timed out while resolving {hostname}:{port}")]
	TimedOut {
		/// The hostname that was looked up.
		hostname: String,

		/// The port that was requested along with the hostname.
		port: u16,
	},

	/// The lookup succeeded, but it did not yield any address.
	#[error("{hostname}:{port} resolved to no addresses")]
	Empty {
		/// The hostname that was looked up.
		hostname: String,

		/// The port that was requested along with the hostname.
		port: u16,
	},
}

impl LookupError {
	/// Create a [`LookupError::Failed`] from an I/O error.
	pub(crate) fn from_io(hostname: &str, port: u16, error: &std::io::Error) -> Self {
		Self::Failed {
			hostname: hostname.into(),
			port,
			kind: error.kind(),
			message: error.to_string(),
		}
	}

	/// Check if the lookup succeeded without yielding any address.
	pub fn is_empty(&self) -> bool {
		matches!(self, Self::Empty { .. })
	}
}

/// The way a single connection attempt failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AttemptErrorKind {
	/// The transport refused to start the connection attempt at all.
	RejectedLocally,

	/// The transport reported that the connection attempt failed.
	Failed,
}

/// A connection attempt to a single candidate address failed.
#[derive(Debug, Error)]
pub struct AttemptError {
	/// The candidate address.
	pub address: SocketAddr,

	/// How the attempt failed.
	pub kind: AttemptErrorKind,

	/// The error reported by the transport.
	pub source: std::io::Error,
}

impl std::fmt::Display for AttemptError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self.kind {
			AttemptErrorKind::RejectedLocally => write!(f, "failed to start connecting to {}: {}", self.address, self.source),
			AttemptErrorKind::Failed => write!(f, "failed to connect to {}: {}", self.address, self.source),
		}
	}
}

/// A dial failed permanently.
#[derive(Debug, Error)]
pub enum DialError {
	/// The hostname lookup failed.
	#[error("{0}")]
	ResolutionFailed(#[from] LookupError),

	/// The hostname lookup succeeded, but it did not yield any address.
	#[error("{hostname}:{port} resolved to no addresses")]
	ResolvedEmpty {
		/// The hostname that was looked up.
		hostname: String,

		/// The port that was requested along with the hostname.
		port: u16,
	},

	/// The candidate address is the unspecified address, which can not be connected to.
	#[error("refusing to connect to unspecified address {address}")]
	UnspecifiedAddress {
		/// The offending candidate.
		address: SocketAddr,
	},

	/// All candidate addresses were tried and none of them could be connected to.
	#[error("none of the {attempts} candidate address(es) could be connected to, last error: {last}")]
	CandidatesExhausted {
		/// The number of connection attempts that were made.
		attempts: usize,

		/// The error of the last attempt.
		#[source]
		last: AttemptError,
	},

	/// The dial was aborted before it finished.
	#[error("the dial was aborted")]
	Aborted,
}

impl DialError {
	/// Check if the dial failed because the hostname could not be resolved to any address.
	pub fn is_resolution_failure(&self) -> bool {
		matches!(self, Self::ResolutionFailed(_) | Self::ResolvedEmpty { .. })
	}

	/// Check if the dial was aborted by a call to [`AbortHandle::abort()`][crate::AbortHandle::abort].
	pub fn is_aborted(&self) -> bool {
		matches!(self, Self::Aborted)
	}
}

/// A dial failed, and the unconnected transport is handed back.
pub struct DialFailed<T> {
	/// The reason the dial failed.
	pub error: DialError,

	/// The transport that was used for the connection attempts.
	///
	/// The transport is not connected.
	/// It can be handed to a new [`Dialer`][crate::Dialer] to try again later.
	pub transport: T,
}

impl<T> DialFailed<T> {
	/// Split the failure in the error and the transport.
	pub fn into_parts(self) -> (DialError, T) {
		(self.error, self.transport)
	}
}

impl<T> std::fmt::Debug for DialFailed<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("DialFailed").field("error", &self.error).finish_non_exhaustive()
	}
}

impl<T> std::fmt::Display for DialFailed<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		std::fmt::Display::fmt(&self.error, f)
	}
}

impl<T> std::error::Error for DialFailed<T> {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		std::error::Error::source(&self.error)
	}
}
