//! Hostname resolution with shared lookup records.
//!
//! A [`DnsResolver`] turns a hostname, port and [`Hints`] into a shared [`Lookup`] record.
//! The actual name resolution is delegated to a backend implementing [`Resolve`].

use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};

mod config;
mod lookup;

pub use config::{AddressFamily, Hints, ResolverConfig};
pub use lookup::{Lookup, LookupReady, LookupResult};

/// The future returned by [`Resolve::lookup`].
pub type LookupFuture = Pin<Box<dyn Future<Output = std::io::Result<Vec<SocketAddr>>> + Send>>;

/// Trait for name resolution backends.
pub trait Resolve: Send + Sync + 'static {
	/// Resolve a hostname to a list of addresses.
	///
	/// The order of the returned addresses is the order in which they will be tried.
	/// The port of the returned addresses is ignored: the requested port is applied to all of them.
	fn lookup(&self, hostname: &str, port: u16) -> LookupFuture;
}

/// Resolver backend that uses the `getaddrinfo` of the system, on the tokio blocking thread pool.
#[cfg(feature = "tcp")]
#[derive(Debug, Copy, Clone, Default)]
pub struct SystemResolver;

#[cfg(feature = "tcp")]
impl Resolve for SystemResolver {
	fn lookup(&self, hostname: &str, port: u16) -> LookupFuture {
		let hostname = hostname.to_owned();
		Box::pin(async move {
			let addresses = tokio::net::lookup_host((hostname, port)).await?;
			Ok(addresses.collect())
		})
	}
}

/// Key of the lookup cache.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct LookupKey {
	hostname: String,
	port: u16,
	hints: Hints,
}

/// Resolver that hands out shared [`Lookup`] records.
///
/// Concurrent requests for the same hostname, port and hints share a single lookup,
/// as long as the lookup is pending or succeeded and somebody holds on to it.
pub struct DnsResolver {
	/// The backend that performs the actual lookups.
	backend: Arc<dyn Resolve>,

	/// The resolver configuration.
	config: ResolverConfig,

	/// Lookups that may be shared with new requests.
	cache: Mutex<HashMap<LookupKey, Weak<Lookup>>>,
}

impl DnsResolver {
	/// Create a resolver that uses the given backend.
	pub fn new(backend: impl Resolve, config: ResolverConfig) -> Self {
		Self {
			backend: Arc::new(backend),
			config,
			cache: Mutex::new(HashMap::new()),
		}
	}

	/// Create a resolver that uses the name resolution of the system.
	#[cfg(feature = "tcp")]
	pub fn system(config: ResolverConfig) -> Self {
		Self::new(SystemResolver, config)
	}

	/// Get the configuration of the resolver.
	pub fn config(&self) -> &ResolverConfig {
		&self.config
	}

	/// Request the addresses of a hostname.
	///
	/// This returns immediately with a lookup record that may already be finished,
	/// because it was shared with an earlier request or because the hostname is an IP address literal.
	/// Otherwise the lookup is performed on a newly spawned task,
	/// so this must be called from within a tokio runtime.
	pub fn resolve(&self, hostname: impl Into<String>, port: u16, hints: Hints) -> Arc<Lookup> {
		let hostname = hostname.into();

		if let Ok(ip) = hostname.parse::<IpAddr>() {
			let lookup = Lookup::pending(hostname, port, hints);
			lookup.complete(Ok(vec![SocketAddr::new(ip, port)]));
			return lookup;
		}

		if !self.config.cache {
			return self.start_lookup(hostname, port, hints);
		}

		let key = LookupKey {
			hostname: hostname.clone(),
			port,
			hints,
		};

		let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
		cache.retain(|_, lookup| lookup.strong_count() > 0);
		if let Some(lookup) = cache.get(&key).and_then(Weak::upgrade) {
			if !lookup.is_ready() || lookup.succeeded() {
				log::debug!("sharing lookup of {}", lookup);
				return lookup;
			}
		}

		let lookup = self.start_lookup(hostname, port, hints);
		cache.insert(key, Arc::downgrade(&lookup));
		lookup
	}

	/// Start a new lookup on a spawned task.
	fn start_lookup(&self, hostname: String, port: u16, hints: Hints) -> Arc<Lookup> {
		log::debug!("resolving {}:{}", hostname, port);
		let answer = self.backend.lookup(&hostname, port);
		let lookup = Lookup::pending(hostname, port, hints);
		let timeout = self.config.lookup_timeout;

		let pending = lookup.clone();
		tokio::spawn(async move {
			match timeout {
				None => pending.complete(answer.await),
				Some(timeout) => match tokio::time::timeout(timeout, answer).await {
					Ok(answer) => pending.complete(answer),
					Err(_) => pending.time_out(),
				},
			}
		});

		lookup
	}
}

impl std::fmt::Debug for DnsResolver {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("DnsResolver").field("config", &self.config).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::assert;
	use assert2::let_assert;
	use std::sync::atomic::Ordering;
	use std::time::Duration;

	use crate::error::LookupError;
	use crate::test_util::{addr, StaticResolver};

	#[tokio::test]
	async fn test_ip_literal_is_ready_immediately() {
		let backend = StaticResolver::new();
		let calls = backend.calls.clone();
		let resolver = DnsResolver::new(backend, ResolverConfig::default());

		let lookup = resolver.resolve("::1", 443, Hints::default());
		assert!(lookup.is_ready());
		let_assert!(Some(addresses) = lookup.addresses());
		assert!(&addresses[..] == &[addr("[::1]:443")]);
		assert!(calls.load(Ordering::SeqCst) == 0);
	}

	#[tokio::test]
	async fn test_ip_literal_filtered_by_hints() {
		let resolver = DnsResolver::new(StaticResolver::new(), ResolverConfig::default());
		let lookup = resolver.resolve("10.0.0.1", 80, Hints::family(AddressFamily::Ipv6));
		assert!(lookup.is_ready());
		let_assert!(Some(LookupError::Empty { .. }) = lookup.error());
	}

	#[tokio::test]
	async fn test_lookup_applies_port_and_keeps_order() {
		let backend = StaticResolver::new().answer("example.test", &["10.0.0.2:1", "[2001:db8::1]:2", "10.0.0.1:3"]);
		let resolver = DnsResolver::new(backend, ResolverConfig::default());

		let lookup = resolver.resolve("example.test", 8080, Hints::default());
		assert!(lookup.ready().await);
		assert!(lookup.succeeded());
		let_assert!(Some(addresses) = lookup.addresses());
		assert!(&addresses[..] == &[addr("10.0.0.2:8080"), addr("[2001:db8::1]:8080"), addr("10.0.0.1:8080")]);
		assert!(lookup.hostname() == "example.test");
		assert!(lookup.port() == 8080);
	}

	#[tokio::test]
	async fn test_lookup_filters_family() {
		let backend = StaticResolver::new().answer("example.test", &["10.0.0.1:0", "[2001:db8::1]:0", "10.0.0.2:0"]);
		let resolver = DnsResolver::new(backend, ResolverConfig::default());

		let lookup = resolver.resolve("example.test", 80, Hints::family(AddressFamily::Ipv4));
		assert!(lookup.ready().await);
		let_assert!(Some(addresses) = lookup.addresses());
		assert!(&addresses[..] == &[addr("10.0.0.1:80"), addr("10.0.0.2:80")]);
	}

	#[tokio::test]
	async fn test_empty_answer_is_an_error() {
		let backend = StaticResolver::new().answer("empty.test", &[]);
		let resolver = DnsResolver::new(backend, ResolverConfig::default());

		let lookup = resolver.resolve("empty.test", 80, Hints::default());
		assert!(!lookup.ready().await);
		assert!(lookup.is_ready());
		assert!(!lookup.succeeded());
		assert!(lookup.addresses().is_none());
		let_assert!(Some(error) = lookup.error());
		assert!(error.is_empty());
	}

	#[tokio::test]
	async fn test_failed_lookup() {
		let backend = StaticResolver::new().fail("broken.test", std::io::ErrorKind::NotFound);
		let resolver = DnsResolver::new(backend, ResolverConfig::default());

		let lookup = resolver.resolve("broken.test", 80, Hints::default());
		assert!(!lookup.ready().await);
		let_assert!(Some(LookupError::Failed { hostname, port: 80, kind, .. }) = lookup.error());
		assert!(hostname == "broken.test");
		assert!(kind == std::io::ErrorKind::NotFound);
	}

	#[tokio::test]
	async fn test_pending_lookup_is_shared() {
		let (backend, gate) = StaticResolver::new().answer("example.test", &["10.0.0.1:0"]).gated();
		let calls = backend.calls.clone();
		let resolver = DnsResolver::new(backend, ResolverConfig::default());

		let a = resolver.resolve("example.test", 80, Hints::default());
		let b = resolver.resolve("example.test", 80, Hints::default());
		let c = resolver.resolve("example.test", 81, Hints::default());
		assert!(Arc::ptr_eq(&a, &b));
		assert!(!Arc::ptr_eq(&a, &c));
		assert!(!a.is_ready());
		assert!(calls.load(Ordering::SeqCst) == 2);

		gate.open();
		assert!(b.ready().await);
		assert!(a.is_ready());

		// A finished, successful lookup is still shared.
		let d = resolver.resolve("example.test", 80, Hints::default());
		assert!(Arc::ptr_eq(&a, &d));
		assert!(calls.load(Ordering::SeqCst) == 2);
	}

	#[tokio::test]
	async fn test_failed_lookup_is_not_shared() {
		let backend = StaticResolver::new().fail("broken.test", std::io::ErrorKind::NotFound);
		let calls = backend.calls.clone();
		let resolver = DnsResolver::new(backend, ResolverConfig::default());

		let a = resolver.resolve("broken.test", 80, Hints::default());
		assert!(!a.ready().await);
		let b = resolver.resolve("broken.test", 80, Hints::default());
		assert!(!Arc::ptr_eq(&a, &b));
		assert!(calls.load(Ordering::SeqCst) == 2);
	}

	#[tokio::test]
	async fn test_dropped_lookup_is_not_shared() {
		let backend = StaticResolver::new().answer("example.test", &["10.0.0.1:0"]);
		let calls = backend.calls.clone();
		let resolver = DnsResolver::new(backend, ResolverConfig::default());

		let lookup = resolver.resolve("example.test", 80, Hints::default());
		assert!(lookup.ready().await);
		drop(lookup);
		tokio::task::yield_now().await;

		let lookup = resolver.resolve("example.test", 80, Hints::default());
		assert!(lookup.ready().await);
		assert!(calls.load(Ordering::SeqCst) == 2);
	}

	#[tokio::test]
	async fn test_cache_disabled() {
		let (backend, _gate) = StaticResolver::new().gated();
		let calls = backend.calls.clone();
		let mut config = ResolverConfig::default();
		config.cache = false;
		let resolver = DnsResolver::new(backend, config);

		let a = resolver.resolve("example.test", 80, Hints::default());
		let b = resolver.resolve("example.test", 80, Hints::default());
		assert!(!Arc::ptr_eq(&a, &b));
		assert!(calls.load(Ordering::SeqCst) == 2);
	}

	#[tokio::test]
	async fn test_lookup_timeout() {
		let (backend, _gate) = StaticResolver::new().answer("slow.test", &["10.0.0.1:0"]).gated();
		let mut config = ResolverConfig::default();
		config.lookup_timeout = Some(Duration::from_millis(10));
		let resolver = DnsResolver::new(backend, config);

		let lookup = resolver.resolve("slow.test", 80, Hints::default());
		assert!(!lookup.ready().await);
		let_assert!(Some(LookupError::TimedOut { .. }) = lookup.error());
	}

	#[tokio::test]
	async fn test_wait_until_ready() {
		let (backend, gate) = StaticResolver::new().answer("example.test", &["10.0.0.1:0"]).gated();
		let resolver = DnsResolver::new(backend, ResolverConfig::default());
		let lookup = resolver.resolve("example.test", 80, Hints::default());

		// Pending: the callback fires later.
		let (tx, rx) = tokio::sync::oneshot::channel();
		lookup.wait_until_ready(move |success| {
			let _ = tx.send(success);
		});
		gate.open();
		assert!(let Ok(true) = rx.await);

		// Ready: the callback fires before wait_until_ready() returns.
		let fired = Arc::new(Mutex::new(None));
		let fired_inner = fired.clone();
		lookup.wait_until_ready(move |success| {
			*fired_inner.lock().unwrap() = Some(success);
		});
		assert!(*fired.lock().unwrap() == Some(true));
	}
}
