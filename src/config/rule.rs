use std::num::{NonZero, ParseIntError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

use super::address::{Address, ParseAddressError};
use super::parse::{Parse, ParseStream};

pub const DEFAULT_BUFFER_SIZE: NonZero<usize> = NonZero::new(32 * 1024).unwrap();

/// Largest accepted `buffer-size`. Each session allocates two of these.
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Largest accepted `max-connections`, bounded by the session semaphore.
pub const MAX_CONNECTIONS: usize = Semaphore::MAX_PERMITS;

/// One configured `local -> remote` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDescriptor {
    pub local: Address,
    pub remote: Address,
    pub opts: RuleOpts,
}

impl RuleDescriptor {
    pub fn new(local: Address, remote: Address) -> Self {
        Self {
            local,
            remote,
            opts: RuleOpts::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOpts {
    /// Upper bound for dialing the remote. `None` leaves it to the OS.
    pub connect_timeout: Option<Duration>,
    /// Maximum number of concurrent sessions. `None` is unbounded.
    pub max_connections: Option<NonZero<usize>>,
    /// Size of the copy buffer of each relay direction.
    pub buffer_size: NonZero<usize>,
}

impl Default for RuleOpts {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            max_connections: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRuleError {
    #[error("expected local host")]
    ExpectedLocalHost,

    #[error("expected local port")]
    ExpectedLocalPort,

    #[error("invalid local address: {0}")]
    InvalidLocalAddress(ParseAddressError),

    #[error("expected remote host")]
    ExpectedRemoteHost,

    #[error("expected remote port")]
    ExpectedRemotePort,

    #[error("invalid remote address: {0}")]
    InvalidRemoteAddress(ParseAddressError),

    #[error("expected a number of seconds for 'connect-timeout'")]
    ExpectedConnectTimeout,

    #[error("invalid connect timeout: {0}")]
    InvalidConnectTimeout(ParseIntError),

    #[error("expected a number for 'max-connections'")]
    ExpectedMaxConnections,

    #[error("invalid max connections: {0}")]
    InvalidMaxConnections(ParseIntError),

    #[error("max connections {0} is above the limit of {limit}", limit = MAX_CONNECTIONS)]
    TooManyConnections(usize),

    #[error("expected a size for 'buffer-size'")]
    ExpectedBufferSize,

    #[error("invalid buffer size: {0}")]
    InvalidBufferSize(ParseIntError),

    #[error("buffer size {0} is above the limit of {limit}", limit = MAX_BUFFER_SIZE)]
    BufferTooLarge(usize),
}

impl Parse for RuleDescriptor {
    type Output = Self;
    type Error = ParseRuleError;

    // Syntax: <host> <port> <host> <port> [<property> <value>]...
    fn parse(stream: &mut ParseStream<'_>) -> Result<Self::Output, Self::Error> {
        use ParseRuleError::*;

        let local = {
            let host = stream.next().ok_or(ExpectedLocalHost)?;
            let port = stream.next().ok_or(ExpectedLocalPort)?;
            Address::from_parts(host, port).map_err(InvalidLocalAddress)?
        };

        let remote = {
            let host = stream.next().ok_or(ExpectedRemoteHost)?;
            let port = stream.next().ok_or(ExpectedRemotePort)?;
            Address::from_parts(host, port).map_err(InvalidRemoteAddress)?
        };

        let mut rule = Self::new(local, remote);
        let opts = &mut rule.opts;

        while let Some(x) = stream.next() {
            match x {
                "connect-timeout" => {
                    let secs: u64 = stream
                        .next()
                        .ok_or(ExpectedConnectTimeout)?
                        .parse()
                        .map_err(InvalidConnectTimeout)?;

                    opts.connect_timeout = (secs != 0).then(|| Duration::from_secs(secs));
                }

                "max-connections" => {
                    let n: usize = stream
                        .next()
                        .ok_or(ExpectedMaxConnections)?
                        .parse()
                        .map_err(InvalidMaxConnections)?;

                    if n > MAX_CONNECTIONS {
                        return Err(TooManyConnections(n));
                    }

                    opts.max_connections = NonZero::new(n);
                    if opts.max_connections.is_none() {
                        warn!(
                            "{}: 'max-connections' cannot be 0, sessions will not be limited",
                            rule.local
                        );
                    }
                }

                "buffer-size" => {
                    let size: NonZero<usize> = stream
                        .next()
                        .ok_or(ExpectedBufferSize)?
                        .parse()
                        .map_err(InvalidBufferSize)?;

                    if size.get() > MAX_BUFFER_SIZE {
                        return Err(BufferTooLarge(size.get()));
                    }

                    opts.buffer_size = size;
                }

                // Values cannot be told apart from property names past this
                // point, so the rest of the line goes too.
                _ => {
                    warn!("unknown property '{x}', ignoring the rest of the line");
                    break;
                }
            }
        }

        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::parse_stream;

    fn parse(s: &str) -> Result<RuleDescriptor, ParseRuleError> {
        RuleDescriptor::parse(&mut parse_stream(s))
    }

    #[test]
    fn parses_plain_rule() {
        let rule = parse("127.0.0.1 9001 127.0.0.1 9002").unwrap();
        assert_eq!(rule.local.to_string(), "127.0.0.1:9001");
        assert_eq!(rule.remote.to_string(), "127.0.0.1:9002");
        assert_eq!(rule.opts, RuleOpts::default());
    }

    #[test]
    fn joins_ipv6_hosts() {
        let rule = parse("::  8080 fd00::17\t80").unwrap();
        assert_eq!(rule.local.to_string(), "[::]:8080");
        assert_eq!(rule.remote.to_string(), "[fd00::17]:80");
    }

    #[test]
    fn parses_properties() {
        let rule = parse(
            "0.0.0.0 80 backend 8080 connect-timeout 5 max-connections 64 buffer-size 4096",
        )
        .unwrap();

        assert_eq!(rule.opts.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(rule.opts.max_connections, NonZero::new(64));
        assert_eq!(rule.opts.buffer_size.get(), 4096);
    }

    #[test]
    fn zero_values_disable_limits() {
        let rule = parse("0.0.0.0 80 backend 8080 connect-timeout 0 max-connections 0").unwrap();
        assert_eq!(rule.opts.connect_timeout, None);
        assert_eq!(rule.opts.max_connections, None);
    }

    #[test]
    fn ignores_unknown_properties() {
        let rule = parse("0.0.0.0 80 backend 8080 frobnicate").unwrap();
        assert_eq!(rule.opts, RuleOpts::default());

        let rule = parse("0.0.0.0 80 backend 8080 frobnicate 5 max-connections 3").unwrap();
        assert_eq!(rule.opts, RuleOpts::default());

        let rule = parse("0.0.0.0 80 backend 8080 max-connections 3 frobnicate 5").unwrap();
        assert_eq!(rule.opts.max_connections, NonZero::new(3));
    }

    #[test]
    fn rejects_incomplete_rules() {
        use ParseRuleError::*;

        assert_eq!(parse("127.0.0.1"), Err(ExpectedLocalPort));
        assert_eq!(parse("127.0.0.1 9001"), Err(ExpectedRemoteHost));
        assert_eq!(parse("127.0.0.1 9001 127.0.0.1"), Err(ExpectedRemotePort));
        assert!(matches!(
            parse("127.0.0.1 port 127.0.0.1 9002"),
            Err(InvalidLocalAddress(ParseAddressError::InvalidPort(_)))
        ));
        assert!(matches!(
            parse("127.0.0.1 9001 127.0.0.1 99999"),
            Err(InvalidRemoteAddress(ParseAddressError::InvalidPort(_)))
        ));
    }

    #[test]
    fn rejects_bad_properties() {
        use ParseRuleError::*;

        assert_eq!(
            parse("127.0.0.1 9001 127.0.0.1 9002 connect-timeout"),
            Err(ExpectedConnectTimeout)
        );
        assert!(matches!(
            parse("127.0.0.1 9001 127.0.0.1 9002 max-connections -1"),
            Err(InvalidMaxConnections(_))
        ));
        assert!(matches!(
            parse("127.0.0.1 9001 127.0.0.1 9002 buffer-size 0"),
            Err(InvalidBufferSize(_))
        ));
    }

    #[test]
    fn rejects_oversized_buffers() {
        assert_eq!(
            parse("127.0.0.1 0 127.0.0.1 9002 buffer-size 70368744177664"),
            Err(ParseRuleError::BufferTooLarge(70368744177664))
        );

        let rule = parse(&format!("127.0.0.1 0 127.0.0.1 9002 buffer-size {MAX_BUFFER_SIZE}"));
        assert_eq!(rule.unwrap().opts.buffer_size.get(), MAX_BUFFER_SIZE);
    }

    #[test]
    fn rejects_more_connections_than_permits() {
        assert_eq!(
            parse(&format!("127.0.0.1 0 127.0.0.1 9002 max-connections {}", usize::MAX)),
            Err(ParseRuleError::TooManyConnections(usize::MAX))
        );

        let rule = parse(&format!("127.0.0.1 0 127.0.0.1 9002 max-connections {MAX_CONNECTIONS}"));
        assert_eq!(rule.unwrap().opts.max_connections, NonZero::new(MAX_CONNECTIONS));
    }
}
