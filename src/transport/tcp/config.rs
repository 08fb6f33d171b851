use std::time::Duration;

/// Configuration for a TCP transport.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TcpConfig {
	/// Disable Nagle's algorithm on the connected stream.
	pub nodelay: bool,

	/// The maximum time a single connection attempt may take.
	///
	/// An attempt that takes longer fails with [`std::io::ErrorKind::TimedOut`],
	/// and the dialer moves on to the next candidate address.
	/// Requires the tokio time driver to be enabled on the runtime.
	pub connect_timeout: Option<Duration>,
}

impl Default for TcpConfig {
	fn default() -> Self {
		Self {
			nodelay: true,
			connect_timeout: None,
		}
	}
}
