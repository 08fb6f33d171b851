mod config;
mod transport;

pub use config::TcpConfig;
pub use transport::TcpTransport;
