//! Per-connection session state and command loop
//!
//! Each accepted connection runs one [`Session`] on its own task. The
//! session owns its framer, advances strictly one command at a time, and
//! keeps the per-connection state the protocol requires: selected group and
//! cursor, authentication progress, TLS and compression flags.

mod framer;
mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, trace, warn};

use crate::commands;
use crate::config::{Config, Security};
use crate::error::{NntpError, Result};
use crate::response::codes;
use crate::store::{Catalog, Identity, Store};

pub(crate) use framer::Framer;
pub(crate) use transport::Transport;

/// What the dispatcher tells the session loop to do next
pub(crate) enum Outcome {
    /// Keep reading commands
    Continue,
    /// Close the session (QUIT)
    Quit,
    /// Run the STARTTLS handshake, then keep reading
    StartTls,
}

/// Selected group plus the article cursor
pub(crate) struct GroupCursor {
    /// Addressed catalog name, meta suffix included
    pub name: String,
    /// Low watermark at selection time
    pub low: u64,
    /// High watermark at selection time
    pub high: u64,
    /// Current article number; `None` in an empty group
    pub current: Option<u64>,
}

/// Shared server-wide handles passed into every session
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) tls: Option<TlsAcceptor>,
}

/// One client connection
pub(crate) struct Session {
    pub(crate) framer: Framer,
    pub(crate) shared: Arc<Shared>,
    pub(crate) peer: SocketAddr,
    pub(crate) security: Security,
    pub(crate) identity: Option<Identity>,
    pub(crate) pending_user: Option<String>,
    pub(crate) group: Option<GroupCursor>,
    commands_in: u64,
}

impl Session {
    pub(crate) fn new(
        transport: Transport,
        shared: Arc<Shared>,
        peer: SocketAddr,
        security: Security,
    ) -> Self {
        let framer = Framer::new(
            transport,
            shared.config.max_line_length,
            shared.config.write_timeout,
        );
        Self {
            framer,
            shared,
            peer,
            security,
            identity: None,
            pending_user: None,
            group: None,
            commands_in: 0,
        }
    }

    /// Drive the session until QUIT, shutdown, timeout or a fatal error
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        debug!(peer = %self.peer, "session started");

        let greeting = if self.shared.config.allow_posting {
            (codes::READY_POSTING_ALLOWED, "posting allowed")
        } else {
            (codes::READY_NO_POSTING, "no posting")
        };
        let banner = format!("{} NNTP service ready, {}", self.shared.config.path_host, greeting.1);
        if self.framer.send_line(greeting.0, &banner).await.is_err() {
            return;
        }

        // Keep the select arms free of framer borrows: the arms only map
        // their results into an event, and the handler below owns the framer
        enum Event {
            Shutdown,
            Idle,
            Input(Result<String>),
        }

        loop {
            let idle = self.shared.config.idle_timeout;
            let event = tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => Event::Shutdown,
                read = timeout(idle, self.framer.read_line()) => match read {
                    Err(_) => Event::Idle,
                    Ok(result) => Event::Input(result),
                },
            };

            match event {
                Event::Shutdown => {
                    let _ = self
                        .framer
                        .send_line(codes::CLOSING_CONNECTION, "server shutting down")
                        .await;
                    break;
                }
                Event::Idle => {
                    let _ = self
                        .framer
                        .send_line(codes::SERVICE_UNAVAILABLE, "idle timeout")
                        .await;
                    break;
                }
                Event::Input(Err(err)) => {
                    self.fail(err).await;
                    break;
                }
                Event::Input(Ok(line)) => {
                    self.commands_in += 1;
                    match commands::dispatch(&mut self, &line).await {
                        Ok(Outcome::Continue) => {}
                        Ok(Outcome::Quit) => break,
                        Ok(Outcome::StartTls) => match self.with_tls().await {
                            Ok(upgraded) => self = upgraded,
                            Err(err) => {
                                warn!(error = %err, "TLS handshake failed");
                                return;
                            }
                        },
                        Err(err) => {
                            self.fail(err).await;
                            break;
                        }
                    }
                }
            }
        }

        self.framer.shutdown().await;
        debug!(
            peer = %self.peer,
            commands = self.commands_in,
            bytes_in = self.framer.bytes_in(),
            bytes_out = self.framer.bytes_out(),
            "session ended"
        );
    }

    /// Terminal error handling: store failures get a best-effort `403`,
    /// everything else closes silently
    async fn fail(&mut self, err: NntpError) {
        trace!(peer = %self.peer, error = %err, "session failing");
        if !err.is_silent() {
            let _ = self
                .framer
                .send_line(codes::INTERNAL_FAULT, "internal fault, closing")
                .await;
        }
    }

    /// Upgrade the transport to TLS after a `382` reply
    ///
    /// Per RFC 4642 the session state is reset: authentication is discarded
    /// unconditionally, along with any selected group.
    async fn with_tls(mut self) -> Result<Session> {
        let acceptor = self
            .shared
            .tls
            .clone()
            .ok_or_else(|| NntpError::Tls("no TLS material configured".to_string()))?;

        let transport = self.framer.into_transport();
        let tcp = transport
            .into_tcp()
            .ok_or_else(|| NntpError::Tls("TLS already active".to_string()))?;
        let stream = acceptor
            .accept(tcp)
            .await
            .map_err(|e| NntpError::Tls(e.to_string()))?;

        self.framer = Framer::new(
            Transport::Tls(Box::new(stream)),
            self.shared.config.max_line_length,
            self.shared.config.write_timeout,
        );
        self.identity = None;
        self.pending_user = None;
        self.group = None;
        debug!(peer = %self.peer, "TLS established");
        Ok(self)
    }

    /// Send a single-line reply and keep the session going
    pub(crate) async fn reply(&mut self, code: u16, text: &str) -> Result<Outcome> {
        self.framer.send_line(code, text).await?;
        Ok(Outcome::Continue)
    }

    /// Whether reader commands are allowed in the current auth state
    pub(crate) fn reader_allowed(&self) -> bool {
        !self.shared.config.require_auth || self.identity.is_some()
    }

    /// Whether STARTTLS can be offered right now
    pub(crate) fn starttls_available(&self) -> bool {
        !self.framer.is_tls()
            && self.shared.tls.is_some()
            && self.security == Security::ExplicitTls
    }

    /// Whether the peer connected from this host
    pub(crate) fn peer_is_local(&self) -> bool {
        self.peer.ip().is_loopback()
    }

    /// Make a catalog the current group and park the cursor on its low mark
    pub(crate) fn select_group(&mut self, catalog: &Catalog) {
        self.group = Some(GroupCursor {
            name: catalog.name.clone(),
            low: catalog.low,
            high: catalog.high,
            current: if catalog.count > 0 {
                Some(catalog.low)
            } else {
                None
            },
        });
    }
}
