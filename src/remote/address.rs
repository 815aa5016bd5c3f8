//! Logical addresses of remote pools.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol prefix of every pool address.
pub const PROTOCOL: &str = "roimill.tcp";

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([A-Za-z][A-Za-z0-9.+-]*)://([^@/\s]+)@(\[[0-9A-Fa-f.]*:[0-9A-Fa-f:.]*\]|[^:/\s\[\]]+):([0-9]+)/user/([^/\s]+)$",
    )
    .expect("valid regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("'{0}' is not of the form {proto}://<system>@<host>:<port>/user/<pool>", proto = PROTOCOL)]
    Malformed(String),

    #[error("unsupported protocol '{0}', expected '{proto}'", proto = PROTOCOL)]
    Protocol(String),

    #[error("port '{0}' is out of range")]
    Port(String),
}

/// `<protocol>://<system>@<host>:<port>/user/<pool>`
///
/// IPv6 hosts are written in brackets (`[::1]`) and stored without them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    pub system: String,
    pub host: String,
    pub port: u16,
    pub pool: String,
}

impl Address {
    pub fn new(system: impl Into<String>, host: impl Into<String>, port: u16, pool: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            host: host.into(),
            port,
            pool: pool.into(),
        }
    }

    /// `host:port`, suitable for connecting.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bracketed_host(), self.port)
    }

    fn bracketed_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}@{}:{}/user/{}",
            PROTOCOL,
            self.system,
            self.bracketed_host(),
            self.port,
            self.pool
        )
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = ADDRESS_RE
            .captures(s.trim())
            .ok_or_else(|| AddressError::Malformed(s.to_string()))?;
        if &caps[1] != PROTOCOL {
            return Err(AddressError::Protocol(caps[1].to_string()));
        }
        let port = caps[4]
            .parse::<u16>()
            .map_err(|_| AddressError::Port(caps[4].to_string()))?;
        let host = caps[3].trim_start_matches('[').trim_end_matches(']');
        Ok(Address::new(&caps[2], host, port, &caps[5]))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
