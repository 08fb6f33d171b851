use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::{TcpSocket, TcpStream};
use tokio::task::JoinHandle;

use super::TcpConfig;
use crate::transport::{ConnectNotifier, Transport};

/// Transport that connects a TCP stream.
///
/// Each connection attempt runs on a spawned task,
/// so the transport must be used from within a tokio runtime.
pub struct TcpTransport {
	/// The configuration of the transport.
	config: TcpConfig,

	/// The hostname to use for server name indication.
	name_indication: Option<String>,

	/// The connected stream.
	///
	/// Filled in by the connecting task before it reports success.
	stream: Arc<Mutex<Option<TcpStream>>>,

	/// The task running the current connection attempt.
	connecting: Option<JoinHandle<()>>,
}

impl TcpTransport {
	/// Create a new unconnected TCP transport.
	pub fn new(config: TcpConfig) -> Self {
		Self {
			config,
			name_indication: None,
			stream: Arc::new(Mutex::new(None)),
			connecting: None,
		}
	}

	/// Get the configuration of the transport.
	pub fn config(&self) -> &TcpConfig {
		&self.config
	}

	/// Get the hostname that should be used for server name indication.
	///
	/// This is only set if the transport was used to dial an endpoint created for a hostname.
	pub fn name_indication(&self) -> Option<&str> {
		self.name_indication.as_deref()
	}

	/// Check if the transport has a connected stream.
	pub fn is_connected(&self) -> bool {
		lock(&self.stream).is_some()
	}

	/// Take the connected stream out of the transport.
	pub fn take_stream(&mut self) -> Option<TcpStream> {
		lock(&self.stream).take()
	}

	/// Consume the transport and get the connected stream.
	pub fn into_stream(mut self) -> Option<TcpStream> {
		self.take_stream()
	}
}

impl Default for TcpTransport {
	fn default() -> Self {
		Self::new(TcpConfig::default())
	}
}

impl Transport for TcpTransport {
	fn connect(&mut self, address: SocketAddr, notifier: ConnectNotifier) -> std::io::Result<()> {
		if self.connecting.as_ref().is_some_and(|task| !task.is_finished()) {
			return Err(std::io::Error::new(std::io::ErrorKind::Other, "a connection attempt is already in progress"));
		}

		// A new attempt replaces any earlier connection.
		lock(&self.stream).take();

		let socket = if address.is_ipv4() {
			TcpSocket::new_v4()?
		} else {
			TcpSocket::new_v6()?
		};

		let config = self.config.clone();
		let stream = self.stream.clone();
		self.connecting = Some(tokio::spawn(async move {
			let result = match config.connect_timeout {
				None => socket.connect(address).await,
				Some(timeout) => tokio::time::timeout(timeout, socket.connect(address))
					.await
					.unwrap_or_else(|_| Err(std::io::ErrorKind::TimedOut.into())),
			};

			let result = result.and_then(|connected| {
				connected.set_nodelay(config.nodelay)?;
				Ok(connected)
			});

			match result {
				Ok(connected) => {
					*lock(&stream) = Some(connected);
					notifier.connected();
				},
				Err(e) => notifier.failed(e),
			}
		}));

		Ok(())
	}

	fn set_name_indication(&mut self, hostname: &str) {
		self.name_indication = Some(hostname.into());
	}

	fn cancel_connect(&mut self) {
		if let Some(task) = self.connecting.take() {
			task.abort();
		}
		lock(&self.stream).take();
	}
}

impl Drop for TcpTransport {
	fn drop(&mut self) {
		if let Some(task) = self.connecting.take() {
			task.abort();
		}
	}
}

impl std::fmt::Debug for TcpTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("TcpTransport")
			.field("config", &self.config)
			.field("name_indication", &self.name_indication)
			.field("connected", &self.is_connected())
			.finish()
	}
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
