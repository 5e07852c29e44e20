use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// A `host:port` pair as written in the rule file.
///
/// The host is kept verbatim and only resolved when the socket is bound or
/// dialed, so both IP literals and names are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    pub fn from_parts(host: &str, port: &str) -> Result<Self, ParseAddressError> {
        use ParseAddressError::*;

        let host = host
            .strip_prefix('[')
            .and_then(|x| x.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(EmptyHost);
        }

        let port = port.parse().map_err(InvalidPort)?;

        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAddressError {
    #[error("missing ':' separator")]
    MissingSeparator,

    #[error("empty host")]
    EmptyHost,

    #[error("invalid port: {0}")]
    InvalidPort(ParseIntError),
}

impl FromStr for Address {
    type Err = ParseAddressError;

    // Syntax: <host>:<port> | [<ipv6>]:<port>
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or(ParseAddressError::MissingSeparator)?;

        Self::from_parts(host, port)
    }
}
