//! Connect a transport to a network endpoint.
//!
//! An [`Endpoint`] is either a fixed socket address, or a hostname and port that is resolved to a list of candidate addresses.
//! A [`Dialer`] takes an endpoint and a [`Transport`], resolves the endpoint if needed,
//! and tries the candidate addresses one at a time, in the order given by the resolver,
//! until one connection attempt succeeds or all of them failed.
//!
//! Hostnames are resolved through a [`DnsResolver`].
//! Concurrent lookups for the same hostname, port and [`Hints`] share a single [`Lookup`].
//!
//! The dial reports its outcome exactly once, both through the returned [`Result`]
//! and through an optional completion callback.
//! A dial can be aborted at any point with an [`AbortHandle`].
//!
//! # Features
//! The `tcp` feature enables [`SystemResolver`], which uses the resolver of the operating system,
//! and [`TcpTransport`], which connects a [`tokio::net::TcpStream`].
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "tcp")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use endpoint_connect::{Dialer, DnsResolver, Endpoint, Hints, ResolverConfig, TcpTransport};
//!
//! let resolver = DnsResolver::system(ResolverConfig::default());
//! let endpoint = Endpoint::from_host(&resolver, "example.com", 80, Hints::default());
//!
//! let mut dialer = Dialer::new();
//! dialer.set_endpoint(endpoint);
//! dialer.set_transport(TcpTransport::default());
//! dialer.on_completion(|success| println!("dial finished, success: {}", success));
//!
//! let transport = dialer.run().await?;
//! let stream = transport.into_stream();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod dialer;
mod endpoint;
mod resolver;
mod transport;
mod util;
pub mod error;

#[cfg(test)]
mod test_util;

pub use dialer::AbortHandle;
pub use dialer::DialHandle;
pub use dialer::DialState;
pub use dialer::Dialer;
pub use endpoint::Endpoint;
pub use resolver::AddressFamily;
pub use resolver::DnsResolver;
pub use resolver::Hints;
pub use resolver::Lookup;
pub use resolver::LookupFuture;
pub use resolver::LookupReady;
pub use resolver::LookupResult;
pub use resolver::Resolve;
pub use resolver::ResolverConfig;
pub use transport::ConnectNotifier;
pub use transport::Transport;

#[cfg(feature = "tcp")]
pub use resolver::SystemResolver;

#[cfg(feature = "tcp")]
pub use transport::TcpConfig;

#[cfg(feature = "tcp")]
pub use transport::TcpTransport;
