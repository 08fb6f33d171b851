//! Fake resolver backends and transports for the unit tests.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::ConnectNotifier;
use crate::LookupFuture;
use crate::Resolve;
use crate::Transport;

/// Parse a socket address, for brevity in tests.
pub(crate) fn addr(address: &str) -> SocketAddr {
	address.parse().unwrap()
}

/// A gate that blocks lookups until it is opened, and stays open after that.
#[derive(Clone)]
pub(crate) struct Gate {
	semaphore: Arc<Semaphore>,
}

impl Gate {
	fn new() -> Self {
		Self { semaphore: Arc::new(Semaphore::new(0)) }
	}

	pub(crate) fn open(&self) {
		self.semaphore.add_permits(1);
	}

	async fn pass(&self) {
		// The permit is given back when dropped, so the gate stays open.
		let _permit = self.semaphore.acquire().await;
	}
}

/// Resolver backend with fixed answers.
///
/// Unknown hostnames fail with [`std::io::ErrorKind::NotFound`].
#[derive(Default)]
pub(crate) struct StaticResolver {
	answers: HashMap<String, Result<Vec<SocketAddr>, std::io::ErrorKind>>,

	/// The number of lookups performed.
	pub(crate) calls: Arc<AtomicUsize>,

	/// Lookups wait for the gate to open if this is set.
	pub(crate) gate: Option<Gate>,
}

impl StaticResolver {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn answer(mut self, hostname: &str, addresses: &[&str]) -> Self {
		let addresses = addresses.iter().map(|x| addr(x)).collect();
		self.answers.insert(hostname.into(), Ok(addresses));
		self
	}

	pub(crate) fn fail(mut self, hostname: &str, kind: std::io::ErrorKind) -> Self {
		self.answers.insert(hostname.into(), Err(kind));
		self
	}

	/// Make every lookup wait until the returned gate is opened.
	pub(crate) fn gated(mut self) -> (Self, Gate) {
		let gate = Gate::new();
		self.gate = Some(gate.clone());
		(self, gate)
	}
}

impl Resolve for StaticResolver {
	fn lookup(&self, hostname: &str, _port: u16) -> LookupFuture {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let answer = self.answers.get(hostname).cloned().unwrap_or(Err(std::io::ErrorKind::NotFound));
		let gate = self.gate.clone();
		Box::pin(async move {
			if let Some(gate) = gate {
				gate.pass().await;
			}
			answer.map_err(std::io::Error::from)
		})
	}
}

/// What a [`ScriptedTransport`] does with a connection attempt.
#[derive(Debug, Copy, Clone)]
pub(crate) enum Outcome {
	/// Report success from another task.
	Connect,

	/// Report success before `connect()` returns.
	ConnectNow,

	/// Report a refused connection from another task.
	Fail,

	/// Return an error from `connect()` itself.
	Reject,

	/// Drop the notifier without reporting anything.
	Drop,

	/// Never report anything until cancelled.
	Hang,
}

/// Shared view on everything a [`ScriptedTransport`] was asked to do.
#[derive(Default)]
pub(crate) struct TransportLog {
	pub(crate) attempts: Mutex<Vec<SocketAddr>>,
	pub(crate) names: Mutex<Vec<String>>,
	pub(crate) in_flight: AtomicBool,
	pub(crate) cancelled: AtomicBool,
	hung: Mutex<Vec<ConnectNotifier>>,
}

impl TransportLog {
	pub(crate) fn attempts(&self) -> Vec<SocketAddr> {
		self.attempts.lock().unwrap().clone()
	}

	pub(crate) fn names(&self) -> Vec<String> {
		self.names.lock().unwrap().clone()
	}
}

/// Transport that follows a script of outcomes, one per connection attempt.
///
/// Attempts beyond the end of the script fail.
/// Starting a second attempt while one is still in flight panics.
pub(crate) struct ScriptedTransport {
	script: VecDeque<Outcome>,
	pub(crate) log: Arc<TransportLog>,
}

impl ScriptedTransport {
	pub(crate) fn new(script: &[Outcome]) -> Self {
		Self {
			script: script.iter().copied().collect(),
			log: Arc::new(TransportLog::default()),
		}
	}
}

impl Transport for ScriptedTransport {
	fn connect(&mut self, address: SocketAddr, notifier: ConnectNotifier) -> std::io::Result<()> {
		assert!(!self.log.in_flight.swap(true, Ordering::SeqCst), "connect() called while another attempt is in flight");
		self.log.attempts.lock().unwrap().push(address);

		let outcome = self.script.pop_front().unwrap_or(Outcome::Fail);
		let log = self.log.clone();
		match outcome {
			Outcome::Connect => {
				tokio::spawn(async move {
					tokio::task::yield_now().await;
					log.in_flight.store(false, Ordering::SeqCst);
					notifier.connected();
				});
			},
			Outcome::ConnectNow => {
				log.in_flight.store(false, Ordering::SeqCst);
				notifier.connected();
			},
			Outcome::Fail => {
				tokio::spawn(async move {
					tokio::task::yield_now().await;
					log.in_flight.store(false, Ordering::SeqCst);
					notifier.failed(std::io::ErrorKind::ConnectionRefused.into());
				});
			},
			Outcome::Reject => {
				log.in_flight.store(false, Ordering::SeqCst);
				return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "rejected by script"));
			},
			Outcome::Drop => {
				log.in_flight.store(false, Ordering::SeqCst);
				drop(notifier);
			},
			Outcome::Hang => {
				log.hung.lock().unwrap().push(notifier);
			},
		}
		Ok(())
	}

	fn set_name_indication(&mut self, hostname: &str) {
		self.log.names.lock().unwrap().push(hostname.into());
	}

	fn cancel_connect(&mut self) {
		self.log.cancelled.store(true, Ordering::SeqCst);
		self.log.hung.lock().unwrap().clear();
		self.log.in_flight.store(false, Ordering::SeqCst);
	}
}

/// Collects the values passed to a completion callback.
#[derive(Clone, Default)]
pub(crate) struct Completions {
	calls: Arc<Mutex<Vec<bool>>>,
}

impl Completions {
	pub(crate) fn callback(&self) -> impl FnOnce(bool) + Send + 'static {
		let calls = self.calls.clone();
		move |success| calls.lock().unwrap().push(success)
	}

	pub(crate) fn get(&self) -> Vec<bool> {
		self.calls.lock().unwrap().clone()
	}
}
