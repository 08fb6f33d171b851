use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::oneshot;

use crate::error::{AttemptError, AttemptErrorKind, DialError, DialFailed};
use crate::resolver::LookupReady;
use crate::transport::{ConnectNotifier, ConnectOutcome};
use crate::util::Suspend;
use crate::Endpoint;
use crate::Transport;

/// The states of a [`Dialer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DialState {
	/// The dial has not started yet.
	Start,

	/// Waiting for the hostname lookup to finish.
	ResolveWait,

	/// About to start iterating over the candidate addresses.
	BeginAttempt,

	/// About to start a connection attempt to the current candidate.
	Attempt,

	/// Waiting for the outcome of a connection attempt.
	ConnectWait,

	/// The last connection attempt failed.
	AttemptFailed,

	/// A connection attempt succeeded.
	Connected,

	/// The dial failed or was aborted.
	Abort,

	/// The dial finished successfully.
	Done,
}

impl DialState {
	/// Get the name of the state.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Start => "start",
			Self::ResolveWait => "resolve_wait",
			Self::BeginAttempt => "begin_attempt",
			Self::Attempt => "attempt",
			Self::ConnectWait => "connect_wait",
			Self::AttemptFailed => "attempt_failed",
			Self::Connected => "connected",
			Self::Abort => "abort",
			Self::Done => "done",
		}
	}

	/// Check if the dial is finished, successfully or not.
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Abort | Self::Done)
	}
}

impl std::fmt::Display for DialState {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Callback invoked with the outcome of a dial.
type CompletionCallback = Box<dyn FnOnce(bool) + Send>;

/// Connects a transport to the first reachable address of an [`Endpoint`].
///
/// The dialer resolves the endpoint if needed,
/// and then tries the candidate addresses one by one in the order given by the resolver,
/// until a connection attempt succeeds or all candidates failed.
/// There is no retry of a failed candidate and no delay between attempts.
///
/// Configure the dialer with [`Self::set_endpoint()`] and [`Self::set_transport()`],
/// and then use [`Self::run()`] or [`Self::spawn()`] to perform the dial.
/// A dialer can only be used for a single dial.
pub struct Dialer<T> {
	/// The endpoint to connect to.
	endpoint: Option<Endpoint>,

	/// The transport to connect.
	transport: Option<T>,

	/// Called exactly once with the outcome of the dial.
	on_completion: Option<CompletionCallback>,

	/// Receives an abort request from an [`AbortHandle`].
	abort_rx: Option<oneshot::Receiver<()>>,

	/// The sending end of `abort_rx`, shared by all live [`AbortHandle`]s.
	abort_tx: Weak<AbortSender>,

	/// The current state.
	state: DialState,

	/// Completes when the lookup of the endpoint is ready, while in [`DialState::ResolveWait`].
	resolving: Option<LookupReady>,

	/// Receives the outcome of the connection attempt in flight, while in [`DialState::ConnectWait`].
	connecting: Option<ConnectOutcome>,

	/// The error of the most recent connection attempt.
	///
	/// Cleared at the start of each attempt.
	last_attempt: Option<AttemptError>,

	/// The number of connection attempts made.
	attempts: usize,

	/// The reason the dial failed, once it did.
	error: Option<DialError>,
}

/// The abort sender, taken by the first handle that aborts.
type AbortSender = Mutex<Option<oneshot::Sender<()>>>;

/// Handle to abort a dial.
///
/// All handles obtained from the same [`Dialer`] abort the same dial.
#[derive(Debug, Clone)]
pub struct AbortHandle {
	tx: Arc<AbortSender>,
}

impl AbortHandle {
	/// Abort the dial.
	///
	/// If the dial did not finish yet, it fails with [`DialError::Aborted`],
	/// and a connection attempt that is in flight is cancelled.
	/// Does nothing if the dial already finished or was already aborted.
	pub fn abort(&self) {
		let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
		if let Some(tx) = tx {
			let _ = tx.send(());
		}
	}
}

/// Handle to a dial running on a spawned task.
pub struct DialHandle<T> {
	/// Handle to abort the dial.
	abort: AbortHandle,

	/// The spawned task.
	task: tokio::task::JoinHandle<Result<T, DialFailed<T>>>,
}

impl<T: Transport> DialHandle<T> {
	/// Abort the dial.
	///
	/// See [`AbortHandle::abort()`].
	pub fn abort(&self) {
		self.abort.abort();
	}

	/// Get a handle to abort the dial.
	pub fn abort_handle(&self) -> AbortHandle {
		self.abort.clone()
	}

	/// Check if the dial finished.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Wait for the dial to finish.
	///
	/// Returns the connected transport,
	/// or the reason the dial failed along with the unconnected transport.
	///
	/// # Panics
	/// If the dial panicked, the panic is resumed on the current task.
	///
	/// This function also panics if the task was cancelled because the tokio runtime is shutting down.
	/// The transport is lost in that case.
	pub async fn join(self) -> Result<T, DialFailed<T>> {
		match self.task.await {
			Ok(result) => result,
			Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
			Err(e) => panic!("dial task was cancelled: {}", e),
		}
	}
}

impl<T: Transport> Default for Dialer<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Transport> Dialer<T> {
	/// Create a new idle dialer.
	pub fn new() -> Self {
		Self {
			endpoint: None,
			transport: None,
			on_completion: None,
			abort_rx: None,
			abort_tx: Weak::new(),
			state: DialState::Start,
			resolving: None,
			connecting: None,
			last_attempt: None,
			attempts: 0,
			error: None,
		}
	}

	/// Set the endpoint to connect to.
	pub fn set_endpoint(&mut self, endpoint: impl Into<Endpoint>) -> &mut Self {
		self.endpoint = Some(endpoint.into());
		self
	}

	/// Set the transport to connect.
	///
	/// A transport set earlier is dropped.
	pub fn set_transport(&mut self, transport: T) -> &mut Self {
		self.transport = Some(transport);
		self
	}

	/// Set a callback to invoke with the outcome of the dial.
	///
	/// The callback is invoked exactly once when the dial finishes:
	/// with `true` when the transport is connected, or with `false` when the dial failed or was aborted.
	pub fn on_completion<F>(&mut self, callback: F) -> &mut Self
	where
		F: FnOnce(bool) + Send + 'static,
	{
		self.on_completion = Some(Box::new(callback));
		self
	}

	/// Get a handle to abort the dial.
	///
	/// Handles can be created before or after [`Self::spawn()`], and all of them stay usable.
	pub fn abort_handle(&mut self) -> AbortHandle {
		if let Some(tx) = self.abort_tx.upgrade() {
			return AbortHandle { tx };
		}
		let (tx, rx) = oneshot::channel();
		let tx = Arc::new(Mutex::new(Some(tx)));
		self.abort_rx = Some(rx);
		self.abort_tx = Arc::downgrade(&tx);
		AbortHandle { tx }
	}

	/// Get the current state of the dialer.
	pub fn state(&self) -> DialState {
		self.state
	}

	/// Get the endpoint, if it is set.
	pub fn endpoint(&self) -> Option<&Endpoint> {
		self.endpoint.as_ref()
	}

	/// Perform the dial on the current task.
	///
	/// Returns the connected transport on success.
	/// On failure, the unconnected transport is returned along with the error.
	///
	/// # Panics
	/// This function panics if no endpoint or no transport has been set.
	pub async fn run(mut self) -> Result<T, DialFailed<T>> {
		assert!(self.endpoint.is_some(), "Dialer::run() called without an endpoint");
		assert!(self.transport.is_some(), "Dialer::run() called without a transport");

		while !self.state.is_terminal() {
			if self.abort_requested() {
				self.abort();
				break;
			}
			self.step().await;
		}

		let transport = self.transport.take().expect("transport disappeared during the dial");
		match self.error.take() {
			None => Ok(transport),
			Some(error) => Err(DialFailed { error, transport }),
		}
	}

	/// Perform the dial on a newly spawned task.
	///
	/// The returned handle can be used to abort the dial and to wait for it to finish.
	///
	/// # Panics
	/// The spawned task panics if no endpoint or no transport has been set.
	pub fn spawn(mut self) -> DialHandle<T> {
		let abort = self.abort_handle();
		let task = tokio::spawn(self.run());
		DialHandle { abort, task }
	}

	/// Run the action of the current state and move to the next state.
	async fn step(&mut self) {
		match self.state {
			DialState::Start => match self.endpoint_mut().trigger_resolution() {
				None => self.set_state(DialState::BeginAttempt),
				Some(ready) => {
					self.resolving = Some(ready);
					self.set_state(DialState::ResolveWait);
				},
			},
			DialState::ResolveWait => {
				let ready = self.resolving.take().expect("no lookup to wait for");
				match self.suspend(ready).await {
					Some(_) => self.set_state(DialState::BeginAttempt),
					None => self.abort(),
				}
			},
			DialState::BeginAttempt => match self.endpoint_mut().start_iteration() {
				Ok(()) => self.set_state(DialState::Attempt),
				Err(e) => self.fail(e),
			},
			DialState::Attempt => self.attempt(),
			DialState::ConnectWait => {
				let outcome = self.connecting.take().expect("no connection attempt to wait for");
				let outcome = match self.suspend(outcome).await {
					Some(outcome) => outcome,
					None => return self.abort(),
				};
				let outcome = outcome.unwrap_or_else(|_| {
					Err(std::io::Error::new(std::io::ErrorKind::ConnectionAborted, "transport dropped the connection attempt"))
				});
				match outcome {
					Ok(()) => self.set_state(DialState::Connected),
					Err(source) => {
						self.last_attempt = Some(AttemptError {
							address: self.endpoint_mut().current(),
							kind: AttemptErrorKind::Failed,
							source,
						});
						self.set_state(DialState::AttemptFailed);
					},
				}
			},
			DialState::AttemptFailed => {
				if let Some(error) = &self.last_attempt {
					log::debug!("{}", error);
				}
				if self.endpoint_mut().advance() {
					self.set_state(DialState::Attempt);
				} else {
					let last = self.last_attempt.take().expect("no failed connection attempt");
					log::warn!("none of the addresses of {} could be connected to", self.endpoint_mut());
					self.fail(DialError::CandidatesExhausted { attempts: self.attempts, last });
				}
			},
			DialState::Connected => {
				log::debug!("connected to {}", self.endpoint_mut().current());
				self.complete(true);
				self.set_state(DialState::Done);
			},
			DialState::Abort | DialState::Done => (),
		}
	}

	/// Start a connection attempt to the current candidate.
	fn attempt(&mut self) {
		let endpoint = self.endpoint.as_ref().expect("Dialer used without an endpoint");
		let address = endpoint.current();
		if address.ip().is_unspecified() {
			return self.fail(DialError::UnspecifiedAddress { address });
		}

		let transport = self.transport.as_mut().expect("Dialer used without a transport");
		if let Some(hostname) = endpoint.hostname() {
			transport.set_name_indication(hostname);
		}

		self.last_attempt = None;
		self.attempts += 1;
		log::debug!("connecting to {} (attempt {} for {})", address, self.attempts, endpoint);

		let (notifier, outcome) = ConnectNotifier::new();
		match transport.connect(address, notifier) {
			Ok(()) => {
				self.connecting = Some(outcome);
				self.set_state(DialState::ConnectWait);
			},
			Err(source) => {
				self.last_attempt = Some(AttemptError {
					address,
					kind: AttemptErrorKind::RejectedLocally,
					source,
				});
				self.set_state(DialState::AttemptFailed);
			},
		}
	}

	/// Wait for `future`, unless the dial is aborted first.
	///
	/// Returns `None` if the dial was aborted.
	async fn suspend<F: Future>(&mut self, future: F) -> Option<F::Output> {
		let future = std::pin::pin!(future);
		Suspend::new(future, &mut self.abort_rx).await
	}

	/// Check for an abort request without waiting.
	fn abort_requested(&mut self) -> bool {
		let Some(abort_rx) = self.abort_rx.as_mut() else {
			return false;
		};
		match abort_rx.try_recv() {
			Ok(()) => true,
			Err(oneshot::error::TryRecvError::Empty) => false,
			Err(oneshot::error::TryRecvError::Closed) => {
				self.abort_rx = None;
				false
			},
		}
	}

	/// Abort the dial, cancelling the connection attempt in flight.
	///
	/// A connection that was already established by an attempt is closed too,
	/// so the transport is handed back unconnected.
	fn abort(&mut self) {
		log::debug!("dial aborted in state {}", self.state);
		self.connecting = None;
		if self.attempts > 0 {
			if let Some(transport) = self.transport.as_mut() {
				transport.cancel_connect();
			}
		}
		self.resolving = None;
		self.fail(DialError::Aborted);
	}

	/// Fail the dial.
	fn fail(&mut self, error: DialError) {
		log::debug!("dial failed: {}", error);
		self.error = Some(error);
		self.set_state(DialState::Abort);
		self.complete(false);
	}

	/// Invoke the completion callback, if it was not invoked yet.
	fn complete(&mut self, success: bool) {
		if let Some(callback) = self.on_completion.take() {
			callback(success);
		}
	}

	fn set_state(&mut self, state: DialState) {
		log::trace!("dialer state: {} -> {}", self.state, state);
		self.state = state;
	}

	fn endpoint_mut(&mut self) -> &mut Endpoint {
		self.endpoint.as_mut().expect("Dialer used without an endpoint")
	}
}

impl<T> std::fmt::Debug for Dialer<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Dialer")
			.field("endpoint", &self.endpoint)
			.field("state", &self.state)
			.field("attempts", &self.attempts)
			.finish_non_exhaustive()
	}
}
