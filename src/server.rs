//! DNS server setup and lifecycle management.

use hickory_server::authority::{AuthorityObject, Catalog};
use hickory_server::ServerFuture;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::authority::FixtureAuthority;
use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::fixture_format;
use crate::state::DnsState;
use crate::zone::Zone;

/// Interval for emitting state metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically emit state metrics.
async fn metrics_loop(state: DnsState, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                state.emit_metrics();
                debug!(
                    names = state.names_count(),
                    records = state.records_count(),
                    serial = state.serial(),
                    "emitted state metrics"
                );
            }
            _ = shutdown.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Re-read a fixture file and swap the served zone. Returns the new serial.
///
/// On error the current zone keeps being served.
pub async fn reload_fixtures(path: &Path, state: &DnsState) -> Result<u32, DnsError> {
    let groups = fixture_format::load(path).await?;
    let zone = Zone::from_groups(&groups);
    let records = zone.len();
    let serial = state.replace(zone);
    info!(path = %path.display(), groups = groups.len(), records, serial, "reloaded fixtures");
    Ok(serial)
}

/// Reload the fixture file whenever the process receives SIGHUP.
#[cfg(unix)]
async fn reload_loop(path: std::path::PathBuf, state: DnsState, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!("failed to install SIGHUP handler: {}", e);
            return;
        }
    };

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    return;
                }
                if let Err(e) = reload_fixtures(&path, &state).await {
                    error!(path = %path.display(), "fixture reload failed, keeping current zone: {}", e);
                }
            }
            _ = shutdown.cancelled() => {
                debug!("reload loop shutting down");
                return;
            }
        }
    }
}

#[cfg(not(unix))]
async fn reload_loop(_path: std::path::PathBuf, _state: DnsState, shutdown: CancellationToken) {
    shutdown.cancelled().await;
}

/// Authoritative DNS server for a fixture zone.
pub struct DnsServer {
    config: DnsConfig,
    state: DnsState,
}

impl DnsServer {
    /// Create a new DNS server serving `zone`.
    pub fn new(config: DnsConfig, zone: Zone) -> Self {
        Self {
            config,
            state: DnsState::new(zone),
        }
    }

    /// Get a reference to the DNS state.
    pub fn state(&self) -> &DnsState {
        &self.state
    }

    /// Build the request handler routing the configured zone to the authority.
    pub fn catalog(&self) -> Result<Catalog, DnsError> {
        let authority = FixtureAuthority::new(self.config.clone(), self.state.clone())?;

        let mut catalog = Catalog::new();
        let authority: Arc<dyn AuthorityObject> = Arc::new(authority);
        catalog.upsert(authority.origin().clone(), vec![authority]);
        Ok(catalog)
    }

    /// Bind sockets without serving yet.
    ///
    /// TCP binds the same port UDP got, so a `:0` listen address yields one
    /// port for both.
    pub async fn bind(self) -> Result<RunningServer, DnsError> {
        let catalog = self.catalog()?;
        let mut server = ServerFuture::new(catalog);

        // Bind UDP
        let udp_socket = UdpSocket::bind(self.config.listen_addr).await?;
        let local_addr = udp_socket.local_addr()?;
        info!(addr = %local_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        // Bind TCP
        let tcp_addr = if self.config.tcp {
            let tcp_listener = TcpListener::bind(local_addr).await?;
            let tcp_addr = tcp_listener.local_addr()?;
            info!(addr = %tcp_addr, "DNS TCP listening");
            server.register_listener(tcp_listener, self.config.tcp_timeout());
            Some(tcp_addr)
        } else {
            None
        };

        Ok(RunningServer {
            config: self.config,
            state: self.state,
            server,
            local_addr,
            tcp_addr,
        })
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        info!(
            listen_addr = %self.config.listen_addr,
            zone = %self.config.zone,
            records = self.state.records_count(),
            "Starting fixture-dns server"
        );

        self.bind().await?.serve(shutdown).await
    }
}

/// A server with bound sockets.
pub struct RunningServer {
    config: DnsConfig,
    state: DnsState,
    server: ServerFuture<Catalog>,
    local_addr: SocketAddr,
    tcp_addr: Option<SocketAddr>,
}

impl RunningServer {
    /// Bound UDP address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound TCP address, if TCP is enabled.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }

    /// Handle to the served zone.
    pub fn state(&self) -> &DnsState {
        &self.state
    }

    /// Serve queries until `shutdown` is cancelled.
    pub async fn serve(mut self, shutdown: CancellationToken) -> Result<(), DnsError> {
        info!(zone = %self.config.zone, "DNS server ready to serve queries");

        let tasks = shutdown.child_token();

        // Start metrics loop
        let metrics_handle = tokio::spawn(metrics_loop(self.state.clone(), tasks.clone()));

        let reload_handle = self.config.fixture_path.clone().map(|path| {
            tokio::spawn(reload_loop(path, self.state.clone(), tasks.clone()))
        });

        // Emit initial metrics
        self.state.emit_metrics();

        // Run server until cancelled
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = self.server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        // The server loop may have exited on its own.
        tasks.cancel();
        let _ = metrics_handle.await;
        if let Some(handle) = reload_handle {
            let _ = handle.await;
        }

        info!("DNS server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureGenerator;

    fn test_config() -> DnsConfig {
        DnsConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            zone: "grpc.com.".to_string(),
            ..DnsConfig::default()
        }
    }

    #[test]
    fn test_server_creation() {
        let server = DnsServer::new(test_config(), Zone::new());
        assert_eq!(server.state().records_count(), 0);
        assert_eq!(server.state().serial(), 1);
    }

    #[tokio::test]
    async fn test_bind_reports_shared_port() {
        let running = DnsServer::new(test_config(), Zone::new()).bind().await.unwrap();
        let tcp_addr = running.tcp_addr().unwrap();
        assert_ne!(running.local_addr().port(), 0);
        assert_eq!(running.local_addr().port(), tcp_addr.port());
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let running = DnsServer::new(test_config(), Zone::new()).bind().await.unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(running.serve(shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_reload_fixtures_swaps_zone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixtures.json");
        let groups = FixtureGenerator::new("grpc.com.", 60, 1234)
            .standard_groups()
            .unwrap();
        fixture_format::save(&path, &groups).await.unwrap();

        let state = DnsState::new(Zone::new());
        let serial = reload_fixtures(&path, &state).await.unwrap();
        assert_eq!(serial, 2);
        assert_eq!(state.load().as_ref(), &Zone::from_groups(&groups));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_zone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixtures.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let state = DnsState::new(Zone::new());
        assert!(reload_fixtures(&path, &state).await.is_err());
        assert_eq!(state.serial(), 1);
    }
}
