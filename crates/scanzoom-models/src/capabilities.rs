//! Hardware and platform capability descriptions.
//!
//! Capabilities are probed once when a scanning session starts and cached
//! for its lifetime:
//!
//! - `ZoomCapabilities`: the hardware zoom range reported by the camera track
//! - `PlatformCaps`: which detection paths the host platform can serve

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hardware zoom range reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomCapabilities {
    /// Minimum zoom level (usually 1.0)
    pub min: f64,
    /// Maximum zoom level reported by hardware
    pub max: f64,
    /// Smallest zoom increment the hardware honours (0.0 = continuous)
    pub step: f64,
}

impl ZoomCapabilities {
    /// Create a new capability range.
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Upper bound automation may use: the lower of the hardware maximum and
    /// a policy ceiling. Never below `min`.
    pub fn effective_max(&self, ceiling: f64) -> f64 {
        self.max.min(ceiling).max(self.min)
    }

    /// Clamp a level into `[min, effective_max(ceiling)]`.
    pub fn clamp(&self, level: f64, ceiling: f64) -> f64 {
        level.clamp(self.min, self.effective_max(ceiling))
    }

    /// Full hardware range (`max - min`).
    pub fn range(&self) -> f64 {
        (self.max - self.min).max(0.0)
    }

    /// Whether there is anything to zoom at all.
    pub fn is_zoomable(&self) -> bool {
        self.max > self.min
    }
}

/// Rendering/runtime family of the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    /// Chromium-based runtimes.
    Blink,
    /// Firefox runtimes.
    Gecko,
    /// Safari and every iOS runtime.
    WebKit,
    /// Anything else (native shells, tests).
    #[default]
    Other,
}

impl PlatformFamily {
    /// Families that never get the native detector, whatever they advertise.
    pub const NATIVE_UNSUPPORTED: &'static [PlatformFamily] = &[PlatformFamily::WebKit];

    /// Returns the family name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformFamily::Blink => "blink",
            PlatformFamily::Gecko => "gecko",
            PlatformFamily::WebKit => "webkit",
            PlatformFamily::Other => "other",
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when parsing a platform family.
#[derive(Debug, Clone, Error)]
#[error("invalid platform family: '{0}', expected one of: blink, gecko, webkit, other")]
pub struct PlatformParseError(String);

impl FromStr for PlatformFamily {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blink" | "chromium" | "chrome" => Ok(PlatformFamily::Blink),
            "gecko" | "firefox" => Ok(PlatformFamily::Gecko),
            "webkit" | "safari" | "ios" => Ok(PlatformFamily::WebKit),
            "other" => Ok(PlatformFamily::Other),
            _ => Err(PlatformParseError(s.to_string())),
        }
    }
}

/// Capability probe result for the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCaps {
    /// Platform family
    pub family: PlatformFamily,
    /// Platform advertises a hardware-accelerated barcode detector
    pub native_barcode_detection: bool,
    /// Camera track capabilities (zoom range etc.) can be read reliably
    pub camera_introspection: bool,
}

impl PlatformCaps {
    /// Create a capability set.
    pub fn new(family: PlatformFamily, native_barcode_detection: bool, camera_introspection: bool) -> Self {
        Self {
            family,
            native_barcode_detection,
            camera_introspection,
        }
    }

    /// Native detection requires both the advertised capability and a
    /// family outside the known-unsupported set.
    pub fn supports_native_detection(&self) -> bool {
        self.native_barcode_detection && !PlatformFamily::NATIVE_UNSUPPORTED.contains(&self.family)
    }
}

impl Default for PlatformCaps {
    fn default() -> Self {
        Self::new(PlatformFamily::Other, false, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_max_uses_lower_bound() {
        let caps = ZoomCapabilities::new(1.0, 8.0, 0.1);
        assert_eq!(caps.effective_max(5.0), 5.0);
        assert_eq!(caps.effective_max(10.0), 8.0);

        // Ceiling below hardware min never inverts the range
        assert_eq!(caps.effective_max(0.5), 1.0);
    }

    #[test]
    fn test_clamp() {
        let caps = ZoomCapabilities::new(1.0, 8.0, 0.1);
        assert_eq!(caps.clamp(0.2, 5.0), 1.0);
        assert_eq!(caps.clamp(7.0, 5.0), 5.0);
        assert_eq!(caps.clamp(2.5, 5.0), 2.5);
    }

    #[test]
    fn test_webkit_never_native() {
        let caps = PlatformCaps::new(PlatformFamily::WebKit, true, true);
        assert!(!caps.supports_native_detection());

        let caps = PlatformCaps::new(PlatformFamily::Blink, true, true);
        assert!(caps.supports_native_detection());

        let caps = PlatformCaps::new(PlatformFamily::Blink, false, true);
        assert!(!caps.supports_native_detection());
    }

    #[test]
    fn test_family_parse() {
        assert_eq!("Chrome".parse::<PlatformFamily>().unwrap(), PlatformFamily::Blink);
        assert_eq!("safari".parse::<PlatformFamily>().unwrap(), PlatformFamily::WebKit);
        assert!("netscape".parse::<PlatformFamily>().is_err());
    }

    #[test]
    fn test_family_serde() {
        let json = serde_json::to_string(&PlatformFamily::WebKit).unwrap();
        assert_eq!(json, "\"webkit\"");

        // Wire names agree with as_str and FromStr for every family
        for family in [
            PlatformFamily::Blink,
            PlatformFamily::Gecko,
            PlatformFamily::WebKit,
            PlatformFamily::Other,
        ] {
            let json = serde_json::to_string(&family).unwrap();
            assert_eq!(json, format!("\"{}\"", family.as_str()));
            assert_eq!(family.as_str().parse::<PlatformFamily>().unwrap(), family);
            assert_eq!(serde_json::from_str::<PlatformFamily>(&json).unwrap(), family);
        }
    }
}
