//! Decode acceptance.
//!
//! The same code is usually reported on many consecutive frames. The gate
//! lets the first report through and drops repeats of that code until it
//! has gone unseen for the repeat window.

use std::collections::HashMap;

use tracing::trace;

use crate::config::DecodeConfig;

#[derive(Debug, Clone)]
pub struct DecodeGate {
    repeat_window_ms: u64,
    last_seen: HashMap<String, u64>,
}

impl DecodeGate {
    pub fn new(config: &DecodeConfig) -> Self {
        Self {
            repeat_window_ms: config.repeat_window_ms,
            last_seen: HashMap::new(),
        }
    }

    /// Returns true if `text` should be reported as a new decode.
    pub fn accept(&mut self, text: &str, now_ms: u64) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        let window = self.repeat_window_ms;
        self.last_seen
            .retain(|_, seen| now_ms.saturating_sub(*seen) < window);

        let repeat = self.last_seen.contains_key(text);
        self.last_seen.insert(text.to_string(), now_ms);

        if repeat {
            trace!(code = text, "Repeat decode suppressed");
        }
        !repeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_suppressed_within_window() {
        let mut gate = DecodeGate::new(&DecodeConfig::default());
        assert!(gate.accept("4006381333931", 0));
        assert!(!gate.accept("4006381333931", 100));
        assert!(!gate.accept("4006381333931", 1_500));
        assert!(gate.accept("9780201379624", 1_550));
    }

    #[test]
    fn test_accepted_again_after_gap() {
        let mut gate = DecodeGate::new(&DecodeConfig::default());
        assert!(gate.accept("ABC-123", 0));
        assert!(gate.accept("ABC-123", 1_500));
    }

    #[test]
    fn test_continuous_sighting_keeps_suppressing() {
        let mut gate = DecodeGate::new(&DecodeConfig::default());
        assert!(gate.accept("X", 0));
        for t in (200..5_000).step_by(200) {
            assert!(!gate.accept("X", t), "accepted at {}", t);
        }
    }

    #[test]
    fn test_blank_text_rejected() {
        let mut gate = DecodeGate::new(&DecodeConfig::default());
        assert!(!gate.accept("   ", 0));
        assert!(gate.accept(" 42 ", 0));
        assert!(!gate.accept("42", 10));
    }
}
