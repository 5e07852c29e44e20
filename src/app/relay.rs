use std::io;
use std::num::NonZero;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Byte counts of a finished splice.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Bytes copied from `a` to `b`.
    pub sent: u64,
    /// Bytes copied from `b` to `a`.
    pub received: u64,
}

/// Copy bytes between `a` and `b` in both directions until either direction
/// reaches end-of-stream or fails.
///
/// Neither stream is closed here. Dropping them is up to the caller, which
/// also ends the direction that was still running.
pub async fn splice<A, B>(a: &mut A, b: &mut B, buffer_size: NonZero<usize>) -> Transfer
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_rx, mut a_tx) = tokio::io::split(a);
    let (mut b_rx, mut b_tx) = tokio::io::split(b);

    let mut transfer = Transfer::default();

    let (direction, r) = tokio::select! {
        r = copy(&mut a_rx, &mut b_tx, buffer_size, &mut transfer.sent) => ("a->b", r),
        r = copy(&mut b_rx, &mut a_tx, buffer_size, &mut transfer.received) => ("b->a", r),
    };

    match r {
        Ok(()) => trace!("{direction}: end of stream"),
        Err(e) if is_disconnect(&e) => debug!("{direction}: {e}"),
        Err(e) => warn!("{direction}: {}", display!(e)),
    }

    transfer
}

async fn copy<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: NonZero<usize>,
    total: &mut u64,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size.get()];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        writer.write_all(&buf[..n]).await?;
        *total += n as u64;
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    use io::ErrorKind::*;

    matches!(
        e.kind(),
        ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof | NotConnected
    )
}
