use clap::Parser;
use endpoint_connect::{AddressFamily, Dialer, DnsResolver, Endpoint, Hints, ResolverConfig, TcpConfig, TcpTransport};
use std::time::Duration;

#[derive(Parser)]
struct Options {
	/// The hostname or IP address to connect to.
	#[clap(default_value = "localhost")]
	host: String,

	/// The port to connect to.
	#[clap(default_value = "12345")]
	port: u16,

	/// Only connect over IPv4.
	#[clap(short = '4', long, conflicts_with = "ipv6")]
	ipv4: bool,

	/// Only connect over IPv6.
	#[clap(short = '6', long)]
	ipv6: bool,

	/// Give up on a single connection attempt after this many milliseconds.
	#[clap(long)]
	attempt_timeout_ms: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	env_logger::init();
	if let Err(e) = do_main(&Options::parse()).await {
		eprintln!("Error: {}", e);
		std::process::exit(1);
	}
}

async fn do_main(options: &Options) -> Result<(), String> {
	let family = if options.ipv4 {
		AddressFamily::Ipv4
	} else if options.ipv6 {
		AddressFamily::Ipv6
	} else {
		AddressFamily::Any
	};

	let resolver = DnsResolver::system(ResolverConfig::default());
	let endpoint = Endpoint::from_host(&resolver, options.host.as_str(), options.port, Hints::family(family));

	let mut config = TcpConfig::default();
	config.connect_timeout = options.attempt_timeout_ms.map(Duration::from_millis);

	let mut dialer = Dialer::new();
	dialer.set_endpoint(endpoint);
	dialer.set_transport(TcpTransport::new(config));
	dialer.on_completion(|success| eprintln!("Dial finished, success: {}", success));

	let transport = dialer
		.run()
		.await
		.map_err(|e| format!("failed to connect to {}:{}: {}", options.host, options.port, e))?;

	let stream = transport.into_stream().ok_or("transport has no connected stream")?;
	let peer = stream.peer_addr().map_err(|e| format!("failed to get peer address: {}", e))?;
	eprintln!("Connected to {}", peer);

	Ok(())
}
