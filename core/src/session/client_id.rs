//! Per-attempt MQTT client identifiers

use core::fmt::Write;

use heapless::String;

use crate::config::ConfigError;

/// MQTT 3.1.1 servers must accept client identifiers up to 23 bytes
pub const CLIENT_ID_MAX_LEN: usize = 23;

/// Longest accepted prefix: leaves room for `-` plus 8 hex digits
pub const CLIENT_ID_PREFIX_MAX_LEN: usize = CLIENT_ID_MAX_LEN - 9;

/// Generates a fresh identifier for every connection attempt
///
/// Format: `<prefix>-<attempt:04x><nonce:04x>`. The attempt counter keeps
/// identifiers distinct within a boot; the xorshift nonce, seeded from
/// hardware, keeps them distinct across reboots.
#[derive(Debug, Clone)]
pub struct ClientIdGenerator {
    prefix: String<CLIENT_ID_PREFIX_MAX_LEN>,
    state: u32,
    attempt: u16,
}

impl ClientIdGenerator {
    /// `prefix` must be 1-14 ASCII alphanumerics or dashes
    pub fn new(prefix: &str, seed: u32) -> Result<Self, ConfigError> {
        if prefix.is_empty()
            || !prefix
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(ConfigError::InvalidClientIdPrefix);
        }
        let mut p = String::new();
        p.push_str(prefix)
            .map_err(|_| ConfigError::InvalidClientIdPrefix)?;

        Ok(Self {
            prefix: p,
            // xorshift has a fixed point at zero
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
            attempt: 0,
        })
    }

    /// Produce the identifier for the next attempt
    pub fn next_id(&mut self) -> String<CLIENT_ID_MAX_LEN> {
        self.attempt = self.attempt.wrapping_add(1);
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;

        let mut id = String::new();
        // Cannot overflow: the prefix length is bounded at construction
        if write!(
            id,
            "{}-{:04x}{:04x}",
            self.prefix,
            self.attempt,
            (self.state & 0xFFFF) as u16
        )
        .is_err()
        {
            error!("Client ID overflow");
        }
        id
    }

    /// Attempts generated so far (wraps at 65535)
    pub fn attempts(&self) -> u16 {
        self.attempt
    }
}
