//! Shared value types for the scanzoom barcode targeting pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Regions of interest (percentage-normalized boxes) and pixel rectangles
//! - Hardware zoom capabilities and platform capability probes
//! - Bounded, deduplicated scan history

pub mod capabilities;
pub mod history;
pub mod roi;

pub use capabilities::{PlatformCaps, PlatformFamily, PlatformParseError, ZoomCapabilities};
pub use history::{ScanHistory, ScanHistoryEntry, DEFAULT_HISTORY_CAPACITY};
pub use roi::{PixelRect, Roi};
