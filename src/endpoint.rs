use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{DialError, LookupError};
use crate::resolver::{DnsResolver, Hints, Lookup, LookupReady};

/// Description of where to connect to.
///
/// An endpoint is either a single fixed address,
/// or a hostname that is (or will be) resolved to a list of candidate addresses.
/// Both kinds are iterated the same way:
/// call [`Self::start_iteration()`] once the endpoint [is ready](Self::is_ready),
/// and use [`Self::current()`] and [`Self::advance()`] to walk over the candidates.
#[derive(Debug)]
pub struct Endpoint {
	/// Where the candidate addresses come from.
	source: Source,

	/// Set once [`Self::trigger_resolution()`] has been called.
	resolution_triggered: bool,
}

/// The source of candidate addresses, along with the iteration state for that source.
#[derive(Debug)]
enum Source {
	/// A single fixed address.
	Address {
		/// The address.
		address: SocketAddr,

		/// The current candidate, or `None` before iteration starts and after the address has been used.
		current: Option<SocketAddr>,
	},

	/// A hostname lookup.
	Lookup {
		/// The shared lookup record.
		lookup: Arc<Lookup>,

		/// The candidates taken from the lookup when iteration starts.
		candidates: Option<Arc<[SocketAddr]>>,

		/// Index of the current candidate, or `None` before iteration starts and after the last candidate.
		index: Option<usize>,
	},
}

impl Endpoint {
	/// Create an endpoint for a single fixed address.
	pub fn from_address(address: SocketAddr) -> Self {
		Self::new(Source::Address { address, current: None })
	}

	/// Create an endpoint for a hostname.
	///
	/// The lookup is requested from the resolver right away.
	/// It may be shared with other endpoints for the same hostname, port and hints,
	/// in which case it may already be finished.
	pub fn from_host(resolver: &DnsResolver, hostname: impl Into<String>, port: u16, hints: Hints) -> Self {
		Self::from_lookup(resolver.resolve(hostname, port, hints))
	}

	/// Create an endpoint from an existing (possibly pending) lookup.
	pub fn from_lookup(lookup: Arc<Lookup>) -> Self {
		Self::new(Source::Lookup {
			lookup,
			candidates: None,
			index: None,
		})
	}

	fn new(source: Source) -> Self {
		Self {
			source,
			resolution_triggered: false,
		}
	}

	/// Check if the endpoint is ready for iteration.
	///
	/// An endpoint for a fixed address is always ready.
	/// An endpoint for a hostname is ready when the lookup finished, successfully or not.
	pub fn is_ready(&self) -> bool {
		match &self.source {
			Source::Address { .. } => true,
			Source::Lookup { lookup, .. } => lookup.is_ready(),
		}
	}

	/// Get a future that completes when the endpoint is ready, if it is not ready yet.
	///
	/// Returns `None` if the endpoint is ready now, in which case iteration can start right away.
	///
	/// # Panics
	/// This function panics if it is called more than once on the same endpoint.
	pub fn trigger_resolution(&mut self) -> Option<LookupReady> {
		assert!(!self.resolution_triggered, "Endpoint::trigger_resolution() may only be called once");
		self.resolution_triggered = true;
		match &self.source {
			Source::Lookup { lookup, .. } if !lookup.is_ready() => Some(lookup.ready()),
			_ => None,
		}
	}

	/// Start (or restart) iterating over the candidate addresses.
	///
	/// On success, [`Self::current()`] returns the first candidate.
	/// Fails if the lookup failed, or if it did not yield any address.
	///
	/// # Panics
	/// This function panics if the endpoint is not [ready](Self::is_ready) yet.
	pub fn start_iteration(&mut self) -> Result<(), DialError> {
		match &mut self.source {
			Source::Address { address, current } => {
				*current = Some(*address);
				Ok(())
			},
			Source::Lookup { lookup, candidates, index } => {
				*candidates = None;
				*index = None;
				let result = lookup.result().expect("Endpoint::start_iteration() called before the lookup finished");
				match result {
					Err(LookupError::Empty { hostname, port }) => Err(DialError::ResolvedEmpty { hostname, port }),
					Err(e) => Err(DialError::ResolutionFailed(e)),
					Ok(addresses) => {
						// Empty answers are recorded as `LookupError::Empty` by the lookup.
						debug_assert!(!addresses.is_empty());
						*candidates = Some(addresses);
						*index = Some(0);
						Ok(())
					},
				}
			},
		}
	}

	/// Get the current candidate address.
	///
	/// # Panics
	/// This function panics unless the last call to [`Self::start_iteration()`] or [`Self::advance()`] succeeded.
	pub fn current(&self) -> SocketAddr {
		let current = match &self.source {
			Source::Address { current, .. } => *current,
			Source::Lookup { candidates, index, .. } => match (candidates, index) {
				(Some(candidates), Some(index)) => Some(candidates[*index]),
				_ => None,
			},
		};
		current.expect("Endpoint::current() called without a selected candidate")
	}

	/// Advance to the next candidate address.
	///
	/// Returns `false` if there are no more candidates.
	/// An endpoint for a fixed address only ever has a single candidate.
	pub fn advance(&mut self) -> bool {
		match &mut self.source {
			Source::Address { current, .. } => {
				*current = None;
				false
			},
			Source::Lookup { candidates, index, .. } => {
				let (Some(candidates), Some(current)) = (candidates.as_ref(), *index) else {
					return false;
				};
				if current + 1 < candidates.len() {
					*index = Some(current + 1);
					true
				} else {
					*index = None;
					false
				}
			},
		}
	}

	/// Get the hostname of the endpoint, if it was created for a hostname.
	///
	/// The hostname is used for TLS server name indication.
	pub fn hostname(&self) -> Option<&str> {
		match &self.source {
			Source::Address { .. } => None,
			Source::Lookup { lookup, .. } => Some(lookup.hostname()),
		}
	}

	/// Get the port of the endpoint, if it was created for a hostname.
	pub fn port(&self) -> Option<u16> {
		match &self.source {
			Source::Address { .. } => None,
			Source::Lookup { lookup, .. } => Some(lookup.port()),
		}
	}

	/// Get the lookup record, if the endpoint was created for a hostname.
	pub fn lookup(&self) -> Option<&Arc<Lookup>> {
		match &self.source {
			Source::Address { .. } => None,
			Source::Lookup { lookup, .. } => Some(lookup),
		}
	}
}

impl From<SocketAddr> for Endpoint {
	fn from(address: SocketAddr) -> Self {
		Self::from_address(address)
	}
}

impl std::fmt::Display for Endpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match &self.source {
			Source::Address { address, .. } => write!(f, "{{address:{}}}", address),
			Source::Lookup { lookup, .. } => write!(f, "{{lookup:{}}}", lookup),
		}
	}
}
