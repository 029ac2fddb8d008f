//! Centralized configuration constants for Markbench.
//!
//! All tunable parameters live here so they can be reviewed and adjusted
//! in a single place. Wire field names stay with the gateway types in
//! their own module.

use std::time::Duration;

// ── Watermark payload / embed form ───────────────────────────────────────────

/// Maximum watermark payload length in characters.
/// The service rejects longer texts; we never send them.
pub const MAX_PAYLOAD_CHARS: usize = 32;

/// Embedding strength (alpha) range accepted by the service.
pub const STRENGTH_MIN: f64 = 0.1;
pub const STRENGTH_MAX: f64 = 5.0;
pub const STRENGTH_STEP: f64 = 0.1;
pub const STRENGTH_DEFAULT: f64 = 1.0;

// ── Attack simulator ─────────────────────────────────────────────────────────

/// Rotation range for the geometric attack simulator, in degrees
/// (clockwise positive).
pub const ROTATION_MIN: f64 = -45.0;
pub const ROTATION_MAX: f64 = 45.0;
pub const ROTATION_STEP: f64 = 1.0;

/// Uniform scale range for the geometric attack simulator.
pub const SCALE_MIN: f64 = 0.5;
pub const SCALE_MAX: f64 = 1.5;
pub const SCALE_STEP: f64 = 0.1;

/// Deterministic name for the exported attacked image resource.
pub const ATTACKED_FILE_NAME: &str = "attacked.png";

// ── Difference renderer ──────────────────────────────────────────────────────

/// Amplification applied to per-channel absolute differences so that
/// sub-visible watermark residue becomes visible. Output is clamped to 255.
pub const DIFF_GAIN: u32 = 10;

// ── Gateway / Network ────────────────────────────────────────────────────────

/// Base URL of the watermarking service when none is configured.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Timeout for embed/extract/verify requests. Embedding large images is
/// CPU-bound on the service side, so this is generous.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for the lightweight health probe.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between background health probes after the initial check.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(15);

// ── Downloads / artifacts ────────────────────────────────────────────────────

/// File name used when downloading the embed result locally.
pub const DOWNLOAD_FILE_NAME: &str = "watermarked_image.png";

/// File name for the locally cached copy of the watermarked result,
/// used as input for diff rendering and the attack simulator.
pub const ARTIFACT_FILE_NAME: &str = "watermarked_remote.png";

/// File name for the rendered difference map.
pub const DIFF_FILE_NAME: &str = "diff_map.png";

// ── UI / Misc ────────────────────────────────────────────────────────────────

/// Crossterm event poll timeout per frame.
pub const UI_TICK: Duration = Duration::from_millis(50);

/// Maximum log entries kept in the in-memory ring buffer.
pub const MAX_LOG_ENTRIES: usize = 500;
