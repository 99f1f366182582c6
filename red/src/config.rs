//! Redundancy configuration.

use anyhow::Result;
use rtp_red_common::rtp::MAX_PAYLOAD_TYPE;

/// Settings consulted by the encoder at the start of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedundancyConfig {
    // ---
    /// Payload type announced for RED-framed output (0-127)
    pub payload_type: u8,

    /// Which earlier frame to carry as redundant block.
    ///
    /// 0 disables redundancy, 1 uses the previous frame, 2 the one before
    /// that, and so on.
    pub distance: u32,

    /// Produce RED framing even when no redundant block qualifies
    pub allow_bare_red: bool,
}

impl RedundancyConfig {
    // ---
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns error if `payload_type` does not fit in 7 bits.
    pub fn new(payload_type: u8, distance: u32, allow_bare_red: bool) -> Result<Self> {
        // ---
        validate_payload_type(payload_type)?;
        Ok(Self {
            payload_type,
            distance,
            allow_bare_red,
        })
    }

    /// History bound implied by `distance`.
    pub fn history_bound(&self) -> usize {
        // ---
        usize::try_from(self.distance).unwrap_or(usize::MAX)
    }

    /// Whether any RED framing is possible with these settings.
    pub fn red_enabled(&self) -> bool {
        // ---
        self.distance > 0 || self.allow_bare_red
    }
}

pub(crate) fn validate_payload_type(payload_type: u8) -> Result<()> {
    // ---
    if payload_type > MAX_PAYLOAD_TYPE {
        anyhow::bail!(
            "RED payload type {} out of range (0-{})",
            payload_type,
            MAX_PAYLOAD_TYPE
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_default_disables_red() {
        // ---
        let config = RedundancyConfig::default();

        assert_eq!(config.payload_type, 0);
        assert_eq!(config.distance, 0);
        assert!(!config.allow_bare_red);
        assert!(!config.red_enabled());
    }

    #[test]
    fn test_payload_type_range() {
        // ---
        assert!(RedundancyConfig::new(127, 1, false).is_ok());
        assert!(RedundancyConfig::new(128, 1, false).is_err());
    }

    #[test]
    fn test_bare_red_enables_without_distance() {
        // ---
        let config = RedundancyConfig::new(100, 0, true).expect("valid config");
        assert!(config.red_enabled());
        assert_eq!(config.history_bound(), 0);
    }
}
