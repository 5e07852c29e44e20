use std::io;
use std::sync::Arc;
use std::time::Duration;

use owo_colors::OwoColorize;
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::timeout;

use super::relay;
use crate::config::address::Address;
use crate::config::rule::RuleDescriptor;

/// Serve one accepted connection: dial the remote and relay until either side
/// is done.
///
/// Both streams are owned by this function and dropped together when it
/// returns. The session slot `_permit`, if any, is released at the same time.
pub async fn forward(
    mut inbound: TcpStream,
    rule: Arc<RuleDescriptor>,
    _permit: Option<OwnedSemaphorePermit>,
) {
    info!("connected");

    let mut outbound = match dial(&rule.remote, rule.opts.connect_timeout).await {
        Ok(x) => x,
        Err(e) => {
            error!("cannot connect to {}: {}", display!(rule.remote), display!(e));
            return;
        }
    };

    debug!("{} to {}", "connected".bright_green(), display!(rule.remote));

    let transfer = relay::splice(&mut inbound, &mut outbound, rule.opts.buffer_size).await;

    info!(
        sent = transfer.sent,
        received = transfer.received,
        "disconnected"
    );
}

async fn dial(remote: &Address, connect_timeout: Option<Duration>) -> io::Result<TcpStream> {
    let connect = TcpStream::connect((remote.host(), remote.port()));

    match connect_timeout {
        None => connect.await,
        Some(limit) => timeout(limit, connect).await.unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no answer within {limit:?}"),
            ))
        }),
    }
}
