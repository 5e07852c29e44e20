use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

use super::session;
use crate::config::rule::RuleDescriptor;

/// Bind the rule's local address and serve it until accepting fails.
///
/// A bind failure is logged and ends the rule; it never affects other rules.
pub async fn run(rule: RuleDescriptor) {
    let span = error_span!("rule", local = rule.local.to_string());

    async move {
        match Redirect::bind(rule).await {
            Ok(x) => x.serve().await,
            Err(e) => error!("failed to bind listener: {}", display!(e)),
        }
    }
    .instrument(span)
    .await
}

/// A source of inbound connections.
pub trait Incoming: Send + Sync {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Incoming for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// A bound listener forwarding to one remote address.
#[derive(Debug)]
pub struct Redirect<L = TcpListener> {
    listener: L,
    rule: Arc<RuleDescriptor>,
    slots: Option<Arc<Semaphore>>,
}

impl Redirect {
    pub async fn bind(rule: RuleDescriptor) -> io::Result<Self> {
        debug!("bind listener on {}", display!(rule.local));

        let listener = TcpListener::bind((rule.local.host(), rule.local.port())).await?;
        let redirect = Self::with_listener(listener, rule);

        if let Ok(addr) = redirect.local_addr() {
            debug!("listening on {}", display!(addr));
        }
        Ok(redirect)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl<L: Incoming> Redirect<L> {
    pub fn with_listener(listener: L, rule: RuleDescriptor) -> Self {
        let slots = rule
            .opts
            .max_connections
            .map(|n| Arc::new(Semaphore::new(n.get().min(Semaphore::MAX_PERMITS))));

        Self {
            listener,
            rule: Arc::new(rule),
            slots,
        }
    }

    /// Accept connections and spawn a session for each one.
    ///
    /// Returns once the listener fails and every session it spawned has
    /// finished. Dropping the returned future aborts those sessions.
    pub async fn serve(self) {
        let Self {
            listener,
            rule,
            slots,
        } = self;

        info!(
            "redirect started: {} -> {}",
            display!(rule.local),
            display!(rule.remote)
        );
        if let Some(limit) = rule.opts.connect_timeout {
            debug!("connect timeout {}", display!(limit));
        }

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => reap(joined),

                accepted = admit(&listener, slots.as_ref()) => {
                    let (inbound, peer, permit) = match accepted {
                        Ok(x) => x,
                        Err(e) => {
                            error!("failed to accept connection: {}", display!(e));
                            break;
                        }
                    };

                    let span = error_span!(
                        "session",
                        from = peer.to_string(),
                        to = rule.remote.to_string()
                    );
                    sessions.spawn(
                        session::forward(inbound, Arc::clone(&rule), permit).instrument(span),
                    );
                }
            }
        }

        drop(listener);

        if !sessions.is_empty() {
            debug!("waiting for {} sessions", sessions.len());
        }
        while let Some(joined) = sessions.join_next().await {
            reap(joined);
        }

        info!("redirect stopped");
    }
}

/// Wait for a free session slot, then for the next connection.
async fn admit<L: Incoming>(
    listener: &L,
    slots: Option<&Arc<Semaphore>>,
) -> io::Result<(TcpStream, SocketAddr, Option<OwnedSemaphorePermit>)> {
    let permit = match slots {
        Some(x) => Some(
            Arc::clone(x)
                .acquire_owned()
                .await
                .expect("session semaphore is never closed"),
        ),
        None => None,
    };

    let (stream, peer) = listener.accept().await?;
    Ok((stream, peer, permit))
}

fn reap(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("session panicked: {e}");
        }
    }
}
