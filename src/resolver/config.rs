use std::net::SocketAddr;
use std::time::Duration;

/// The address family to keep from the results of a hostname lookup.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum AddressFamily {
	/// Keep both IPv4 and IPv6 addresses.
	#[default]
	Any,

	/// Keep only IPv4 addresses.
	Ipv4,

	/// Keep only IPv6 addresses.
	Ipv6,
}

impl AddressFamily {
	/// Check if an address belongs to this family.
	pub fn matches(self, address: &SocketAddr) -> bool {
		match self {
			Self::Any => true,
			Self::Ipv4 => address.is_ipv4(),
			Self::Ipv6 => address.is_ipv6(),
		}
	}
}

/// Hints passed along with a hostname lookup.
///
/// Lookups with different hints are never shared.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[non_exhaustive]
pub struct Hints {
	/// The address family to keep from the lookup results.
	pub family: AddressFamily,
}

impl Hints {
	/// Create hints that only keep addresses of the given family.
	pub fn family(family: AddressFamily) -> Self {
		Self { family }
	}
}

/// Configuration for a [`DnsResolver`][crate::DnsResolver].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ResolverConfig {
	/// Share lookups for the same hostname, port and hints.
	///
	/// A lookup is shared as long as it is pending or succeeded,
	/// and someone still holds on to it.
	/// A failed lookup is never reused: the next request starts a fresh lookup.
	pub cache: bool,

	/// The maximum time to wait for the backend to answer.
	///
	/// A lookup that takes longer fails with [`LookupError::TimedOut`][crate::error::LookupError::TimedOut].
	/// Requires the tokio time driver to be enabled on the runtime.
	pub lookup_timeout: Option<Duration>,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			cache: true,
			lookup_timeout: None,
		}
	}
}
