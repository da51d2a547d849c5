//! Serial link parameters

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Character framing of the link, 9600 baud 8N1 unless configured otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl LinkSettings {
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::InvalidConfiguration {
                message: "baud_rate must be positive".to_string(),
            });
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(Error::InvalidConfiguration {
                message: format!("data_bits must be 5-8, got {}", self.data_bits),
            });
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(Error::InvalidConfiguration {
                message: format!("stop_bits must be 1 or 2, got {}", self.stop_bits),
            });
        }
        Ok(())
    }

    /// Bits on the wire per byte, start bit included
    pub fn bits_per_byte(&self) -> u32 {
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        1 + u32::from(self.data_bits) + parity + u32::from(self.stop_bits)
    }

    /// Time to clock `bytes` through the link
    pub fn transfer_time(&self, bytes: usize) -> Duration {
        let bits = bytes as u64 * u64::from(self.bits_per_byte());
        Duration::from_micros(bits * 1_000_000 / u64::from(self.baud_rate.max(1)))
    }
}

impl std::fmt::Display for LinkSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(
            f,
            "{} {}{}{}",
            self.baud_rate, self.data_bits, parity, self.stop_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_9600_8n1() {
        let link = LinkSettings::default();
        assert_eq!(link.to_string(), "9600 8N1");
        assert_eq!(link.bits_per_byte(), 10);
        // 960 bytes per second
        assert_eq!(link.transfer_time(960), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_link_settings() {
        let link = LinkSettings {
            data_bits: 9,
            ..LinkSettings::default()
        };
        assert!(link.validate().is_err());
    }
}
