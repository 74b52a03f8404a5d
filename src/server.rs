//! Listener setup, connection registry and server lifecycle
//!
//! The server binds one TCP listener per configured endpoint, spawns a
//! session task per accepted connection, and tracks live connections in a
//! shared registry for introspection and shutdown. Graceful shutdown
//! signals every session (best-effort `205`), waits a bounded time for the
//! registry to drain, then aborts the stragglers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::config::{Config, Security, TlsMaterial};
use crate::error::{NntpError, Result};
use crate::session::{Session, Shared, Transport};
use crate::store::Store;

/// How long shutdown waits for sessions to drain before aborting them
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
/// Implicit-TLS handshake deadline at accept
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
/// Listen backlog
const LISTEN_BACKLOG: i32 = 1024;

/// Snapshot of one live connection
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Server-assigned connection id
    pub id: u64,
    /// Remote endpoint
    pub peer: SocketAddr,
    /// Security of the endpoint it arrived on
    pub security: Security,
    /// Accept instant
    pub connected_at: DateTime<Utc>,
}

struct ConnectionEntry {
    info: ConnectionInfo,
    abort: Option<AbortHandle>,
}

type Registry = Arc<Mutex<HashMap<u64, ConnectionEntry>>>;

/// Handle for stopping a running server and inspecting its connections
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: Arc<watch::Sender<bool>>,
    registry: Registry,
}

impl ServerHandle {
    /// Signal graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Snapshot of the live connections
    pub fn active_connections(&self) -> Vec<ConnectionInfo> {
        lock_registry(&self.registry)
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }
}

/// The NNTP server: bound listeners plus shared session context
pub struct Server {
    shared: Arc<Shared>,
    listeners: Vec<(TcpListener, Security)>,
    registry: Registry,
    shutdown: Arc<watch::Sender<bool>>,
    connection_ids: Arc<AtomicU64>,
}

impl Server {
    /// Bind every configured endpoint
    ///
    /// Fails fast when a TLS endpoint is configured without key material,
    /// or when the material does not load.
    pub async fn bind(config: Config, store: Arc<dyn Store>) -> Result<Self> {
        let needs_tls = config
            .endpoints
            .iter()
            .any(|endpoint| endpoint.security != Security::Cleartext);
        let tls = match (&config.tls, needs_tls) {
            (Some(material), _) => Some(build_tls_acceptor(material)?),
            (None, true) => {
                return Err(NntpError::Tls(
                    "TLS endpoint configured without certificate material".to_string(),
                ));
            }
            (None, false) => None,
        };

        let mut listeners = Vec::with_capacity(config.endpoints.len());
        for endpoint in &config.endpoints {
            let listener = bind_listener(endpoint.addr)?;
            info!(addr = %endpoint.addr, security = ?endpoint.security, "listening");
            listeners.push((listener, endpoint.security));
        }

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            shared: Arc::new(Shared { config, store, tls }),
            listeners,
            registry: Arc::new(Mutex::new(HashMap::new())),
            shutdown: Arc::new(shutdown),
            connection_ids: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Bound local addresses, in endpoint order
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|(listener, _)| listener.local_addr().ok())
            .collect()
    }

    /// Handle for shutdown and introspection; usable from any task
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: Arc::clone(&self.shutdown),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Accept connections until shutdown, then drain sessions
    pub async fn run(self) -> Result<()> {
        let mut accept_tasks = Vec::with_capacity(self.listeners.len());
        for (listener, security) in self.listeners {
            accept_tasks.push(tokio::spawn(accept_loop(
                listener,
                security,
                Arc::clone(&self.shared),
                Arc::clone(&self.registry),
                Arc::clone(&self.shutdown),
                Arc::clone(&self.connection_ids),
            )));
        }

        // Park until someone signals shutdown
        let mut rx = self.shutdown.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
        info!("shutdown requested");

        for task in &accept_tasks {
            task.abort();
        }

        // Sessions saw the same watch signal; give them a bounded window
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        loop {
            let remaining = lock_registry(&self.registry).len();
            if remaining == 0 {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(remaining, "drain timeout, force-closing sessions");
                for (_, entry) in lock_registry(&self.registry).drain() {
                    if let Some(abort) = entry.abort {
                        abort.abort();
                    }
                }
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        info!("server stopped");
        Ok(())
    }
}

fn lock_registry(registry: &Registry) -> std::sync::MutexGuard<'_, HashMap<u64, ConnectionEntry>> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

async fn accept_loop(
    listener: TcpListener,
    security: Security,
    shared: Arc<Shared>,
    registry: Registry,
    shutdown: Arc<watch::Sender<bool>>,
    connection_ids: Arc<AtomicU64>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "failed to set TCP_NODELAY");
        }

        let id = connection_ids.fetch_add(1, Ordering::Relaxed);
        let info = ConnectionInfo {
            id,
            peer,
            security,
            connected_at: Utc::now(),
        };
        debug!(id, peer = %peer, "accepted connection");

        // Register before spawning so the session's own deregistration
        // cannot race the insert
        lock_registry(&registry).insert(id, ConnectionEntry { info, abort: None });

        let session_shared = Arc::clone(&shared);
        let session_registry = Arc::clone(&registry);
        let shutdown_rx = shutdown.subscribe();
        let task = tokio::spawn(async move {
            let transport = match security {
                Security::ImplicitTls => {
                    let Some(acceptor) = session_shared.tls.clone() else {
                        // Bind refuses TLS endpoints without material, so
                        // this connection can only be dropped
                        lock_registry(&session_registry).remove(&id);
                        return;
                    };
                    match timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                        Ok(Ok(tls)) => Transport::Tls(Box::new(tls)),
                        Ok(Err(err)) => {
                            warn!(peer = %peer, error = %err, "implicit TLS handshake failed");
                            lock_registry(&session_registry).remove(&id);
                            return;
                        }
                        Err(_) => {
                            warn!(peer = %peer, "implicit TLS handshake timed out");
                            lock_registry(&session_registry).remove(&id);
                            return;
                        }
                    }
                }
                _ => Transport::Plain(stream),
            };

            Session::new(transport, session_shared, peer, security)
                .run(shutdown_rx)
                .await;
            lock_registry(&session_registry).remove(&id);
        });

        if let Some(entry) = lock_registry(&registry).get_mut(&id) {
            entry.abort = Some(task.abort_handle());
        }
    }
}

fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    Ok(TcpListener::from_std(socket.into())?)
}

fn build_tls_acceptor(material: &TlsMaterial) -> Result<TlsAcceptor> {
    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(&material.cert_pem)
        .map_err(|e| NntpError::Tls(format!("reading {}: {e}", material.cert_pem.display())))?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| NntpError::Tls(format!("parsing {}: {e}", material.cert_pem.display())))?;
    let key = PrivateKeyDer::from_pem_file(&material.key_pem)
        .map_err(|e| NntpError::Tls(format!("reading {}: {e}", material.key_pem.display())))?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| NntpError::Tls(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}
