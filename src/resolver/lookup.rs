use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::LookupError;
use super::Hints;

/// The outcome of a finished lookup.
pub type LookupResult = Result<Arc<[SocketAddr]>, LookupError>;

/// Future that completes when a [`Lookup`] is ready.
///
/// The output is `true` if the lookup succeeded.
pub type LookupReady = Pin<Box<dyn Future<Output = bool> + Send>>;

/// The shared record of a hostname lookup.
///
/// A lookup is created pending by a [`DnsResolver`][crate::DnsResolver],
/// and completed exactly once when the backend answers.
/// After that it never changes again.
///
/// The record is reference counted and may be shared by any number of [`Endpoint`][crate::Endpoint]s
/// that asked for the same hostname, port and hints.
pub struct Lookup {
	/// The hostname being resolved.
	hostname: String,

	/// The port to use for all resolved addresses.
	port: u16,

	/// The hints used for the lookup.
	hints: Hints,

	/// The result, or `None` while the lookup is pending.
	///
	/// Waiters subscribe to the channel to be woken when the result is set.
	result: watch::Sender<Option<LookupResult>>,
}

impl Lookup {
	/// Create a new pending lookup.
	pub(crate) fn pending(hostname: String, port: u16, hints: Hints) -> Arc<Self> {
		let (result, _) = watch::channel(None);
		Arc::new(Self { hostname, port, hints, result })
	}

	/// Complete the lookup with the answer of a resolver backend.
	///
	/// The answer is filtered by the address family from the hints,
	/// and the port of the lookup is applied to every address.
	/// The order of the answer is preserved.
	pub(crate) fn complete(&self, answer: std::io::Result<Vec<SocketAddr>>) {
		let result = match answer {
			Ok(addresses) => {
				let addresses: Vec<SocketAddr> = addresses
					.into_iter()
					.filter(|address| self.hints.family.matches(address))
					.map(|mut address| {
						address.set_port(self.port);
						address
					})
					.collect();
				if addresses.is_empty() {
					log::warn!("lookup of {}:{} succeeded, but no addresses were found", self.hostname, self.port);
					Err(LookupError::Empty {
						hostname: self.hostname.clone(),
						port: self.port,
					})
				} else {
					log::debug!("resolved {}:{} to {:?}", self.hostname, self.port, addresses);
					Ok(addresses.into())
				}
			},
			Err(e) => {
				log::debug!("failed to resolve {}:{}: {}", self.hostname, self.port, e);
				Err(LookupError::from_io(&self.hostname, self.port, &e))
			},
		};
		self.finish(result);
	}

	/// Fail the lookup because the backend did not answer in time.
	pub(crate) fn time_out(&self) {
		log::debug!("timed out while resolving {}:{}", self.hostname, self.port);
		self.finish(Err(LookupError::TimedOut {
			hostname: self.hostname.clone(),
			port: self.port,
		}));
	}

	/// Store the result, unless the lookup already finished.
	fn finish(&self, result: LookupResult) {
		self.result.send_if_modified(move |slot| {
			if slot.is_some() {
				return false;
			}
			*slot = Some(result);
			true
		});
	}

	/// Get the hostname being resolved.
	pub fn hostname(&self) -> &str {
		&self.hostname
	}

	/// Get the port that is applied to all resolved addresses.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Get the hints used for the lookup.
	pub fn hints(&self) -> Hints {
		self.hints
	}

	/// Check if the lookup finished, successfully or not.
	///
	/// This never changes the lookup and may be called from any thread at any time.
	pub fn is_ready(&self) -> bool {
		self.result.borrow().is_some()
	}

	/// Check if the lookup finished successfully.
	///
	/// Returns `false` while the lookup is still pending.
	pub fn succeeded(&self) -> bool {
		matches!(&*self.result.borrow(), Some(Ok(_)))
	}

	/// Get the result of the lookup, or `None` if it is still pending.
	pub fn result(&self) -> Option<LookupResult> {
		self.result.borrow().clone()
	}

	/// Get the resolved addresses in the order given by the resolver.
	///
	/// Returns `None` if the lookup is pending or failed.
	pub fn addresses(&self) -> Option<Arc<[SocketAddr]>> {
		match &*self.result.borrow() {
			Some(Ok(addresses)) => Some(addresses.clone()),
			_ => None,
		}
	}

	/// Get the error of a failed lookup.
	///
	/// Returns `None` if the lookup is pending or succeeded.
	pub fn error(&self) -> Option<LookupError> {
		match &*self.result.borrow() {
			Some(Err(e)) => Some(e.clone()),
			_ => None,
		}
	}

	/// Get a future that completes when the lookup is ready.
	///
	/// The future completes immediately if the lookup is already finished.
	pub fn ready(self: &Arc<Self>) -> LookupReady {
		let lookup = self.clone();
		Box::pin(async move {
			let mut result = lookup.result.subscribe();
			let succeeded = match result.wait_for(Option::is_some).await {
				Ok(result) => matches!(&*result, Some(Ok(_))),
				// We hold the sender ourselves, so the channel can not close.
				Err(_) => false,
			};
			succeeded
		})
	}

	/// Call `on_ready` once the lookup is ready, with `true` if it succeeded.
	///
	/// If the lookup already finished, `on_ready` is called before this function returns.
	/// Otherwise it is called from a newly spawned task, so this must be called from within a tokio runtime.
	pub fn wait_until_ready<F>(self: &Arc<Self>, on_ready: F)
	where
		F: FnOnce(bool) + Send + 'static,
	{
		if self.is_ready() {
			on_ready(self.succeeded());
		} else {
			let ready = self.ready();
			tokio::spawn(async move {
				on_ready(ready.await);
			});
		}
	}
}

impl std::fmt::Debug for Lookup {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Lookup")
			.field("hostname", &self.hostname)
			.field("port", &self.port)
			.field("hints", &self.hints)
			.field("result", &*self.result.borrow())
			.finish()
	}
}

impl std::fmt::Display for Lookup {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}:{}", self.hostname, self.port)
	}
}
