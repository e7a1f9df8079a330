//! Relay configuration
//!
//! Read from environment variables, with the bind address optionally
//! overridden by the first command line argument.

use std::env;

use crate::error::AppError;

/// Default relay address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default channel buffer size for relay commands
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Default per-connection outbound queue size
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the TCP listener binds to
    pub bind_addr: String,
    /// Capacity of the handler → actor command channel
    pub command_buffer: usize,
    /// Capacity of each connection's outbound queue; overflow is dropped
    pub outbound_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

impl RelayConfig {
    /// Load from `RELAY_ADDR`, `RELAY_COMMAND_BUFFER` and `RELAY_OUTBOUND_BUFFER`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: lookup("RELAY_ADDR").unwrap_or(defaults.bind_addr),
            command_buffer: parse_buffer(&lookup, "RELAY_COMMAND_BUFFER", defaults.command_buffer)?,
            outbound_buffer: parse_buffer(
                &lookup,
                "RELAY_OUTBOUND_BUFFER",
                defaults.outbound_buffer,
            )?,
        })
    }

    /// Override the bind address with the first positional argument, if any
    pub fn with_args<I>(mut self, mut args: I) -> Self
    where
        I: Iterator<Item = String>,
    {
        if let Some(addr) = args.next() {
            self.bind_addr = addr;
        }
        self
    }
}

fn parse_buffer<F>(lookup: &F, key: &str, default: usize) -> Result<usize, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        // tokio mpsc panics on a zero capacity
        Ok(0) => Err(AppError::Config(format!("{} must be greater than zero", key))),
        Ok(n) => Ok(n),
        Err(e) => Err(AppError::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}
