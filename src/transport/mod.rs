//! Transport trait and concrete implementations.
//!
//! A transport is the socket that the [`Dialer`][crate::Dialer] connects to the candidate addresses of an endpoint.
//! The dialer only starts connection attempts and waits for their outcome.
//! Reading and writing over the connected transport is up to the caller.
//!
//! Specific transports must be enabled with individual feature flags.
//! None of the concrete transport implementations are enabled by default.

use std::net::SocketAddr;
use tokio::sync::oneshot;

#[cfg(feature = "tcp")]
pub(crate) mod tcp;

#[cfg(feature = "tcp")]
pub use tcp::{TcpConfig, TcpTransport};

/// Trait for transports that can be connected by a [`Dialer`][crate::Dialer].
pub trait Transport: Send + 'static {
	/// Start connecting to a remote address.
	///
	/// The outcome of the attempt must be reported through the `notifier`,
	/// either before this function returns or later from any thread or task.
	/// Dropping the notifier without using it reports a failed attempt.
	///
	/// Return an error only if the attempt could not be started at all.
	/// In that case the notifier is ignored.
	///
	/// The dialer never starts a new attempt before the outcome of the previous attempt was reported.
	fn connect(&mut self, address: SocketAddr, notifier: ConnectNotifier) -> std::io::Result<()>;

	/// Set the hostname to use for server name indication.
	///
	/// The dialer calls this before every connection attempt for an endpoint created for a hostname.
	/// The default implementation ignores the hostname.
	fn set_name_indication(&mut self, hostname: &str) {
		let _ = hostname;
	}

	/// Cancel the connection attempt that is in flight, if any.
	///
	/// If the last attempt already established a connection, that connection must be closed.
	/// The dialer calls this when it is aborted after it started a connection attempt.
	/// The default implementation does nothing.
	fn cancel_connect(&mut self) {}
}

impl<T> Transport for Box<T>
where
	T: Transport + ?Sized,
{
	fn connect(&mut self, address: SocketAddr, notifier: ConnectNotifier) -> std::io::Result<()> {
		T::connect(self, address, notifier)
	}

	fn set_name_indication(&mut self, hostname: &str) {
		T::set_name_indication(self, hostname)
	}

	fn cancel_connect(&mut self) {
		T::cancel_connect(self)
	}
}

/// The receiving end of a [`ConnectNotifier`].
pub(crate) type ConnectOutcome = oneshot::Receiver<std::io::Result<()>>;

/// Single-shot channel to report the outcome of a connection attempt.
///
/// Consuming the notifier with [`Self::connected()`] or [`Self::failed()`] reports the outcome.
#[derive(Debug)]
pub struct ConnectNotifier {
	tx: oneshot::Sender<std::io::Result<()>>,
}

impl ConnectNotifier {
	/// Create a new notifier and the receiving end for the outcome.
	pub(crate) fn new() -> (Self, ConnectOutcome) {
		let (tx, rx) = oneshot::channel();
		(Self { tx }, rx)
	}

	/// Report that the connection was established.
	pub fn connected(self) {
		self.notify(Ok(()))
	}

	/// Report that the connection attempt failed.
	pub fn failed(self, error: std::io::Error) {
		self.notify(Err(error))
	}

	/// Report the outcome of the connection attempt.
	pub fn notify(self, result: std::io::Result<()>) {
		// The dialer may already be gone.
		let _ = self.tx.send(result);
	}

	/// Check if nobody is waiting for the outcome anymore.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::assert;
	use assert2::let_assert;

	#[tokio::test]
	async fn test_notifier_reports_outcome() {
		let (notifier, outcome) = ConnectNotifier::new();
		notifier.connected();
		assert!(let Ok(Ok(())) = outcome.await);

		let (notifier, outcome) = ConnectNotifier::new();
		notifier.failed(std::io::ErrorKind::ConnectionRefused.into());
		let_assert!(Ok(Err(e)) = outcome.await);
		assert!(e.kind() == std::io::ErrorKind::ConnectionRefused);
	}

	#[tokio::test]
	async fn test_dropped_notifier_closes_channel() {
		let (notifier, outcome) = ConnectNotifier::new();
		drop(notifier);
		assert!(let Err(_) = outcome.await);

		let (notifier, outcome) = ConnectNotifier::new();
		drop(outcome);
		assert!(notifier.is_closed());
		notifier.connected();
	}
}
