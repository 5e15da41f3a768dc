//! Legal parameter bounds and target-independent sizing constants
//!
//! The bounds mirror the parameter space of the hardware decimator this
//! engine models; the validator rejects anything outside them.

/// Shortest supported filter.
pub const MIN_FIR_LENGTH: usize = 4;

/// Longest supported filter.
pub const MAX_FIR_LENGTH: usize = 8192;

/// Smallest decimation factor. Factor 1 degenerates to a single-rate filter.
pub const MIN_DECIMATION: usize = 1;

/// Largest decimation factor the lane offset scheme can address.
pub const MAX_DECIMATION: usize = 7;

/// Largest output right shift.
pub const MAX_SHIFT: u32 = 61;

/// Longest cascade.
pub const MAX_CASCADE_LENGTH: usize = 40;

/// Most parallel output paths of a super-sample-rate filter.
pub const MAX_SSR: usize = 16;

/// Maximum taps held by one window-API stage.
pub const MAX_WINDOW_RANGE: usize = 256;

/// Stream repeat factor when the target can permute lanes.
pub const STREAM_REPEAT_PERMUTE: usize = 8;

/// Stream repeat factor on targets without lane permutes.
pub const STREAM_REPEAT_NO_PERMUTE: usize = 4;

/// Width of one window read, in bytes. Also the granularity of the
/// dual-input interleave.
pub const WINDOW_ACCESS_BYTES: usize = 16;

/// Depth of the raw input channel feeding each pipeline stage.
pub const INPUT_CHANNEL_CAPACITY: usize = 10;

/// Depth of the cascade channel between neighbouring pipeline stages.
pub const CASCADE_CHANNEL_CAPACITY: usize = 64;

/// Fraction bits of designed integer coefficients when no shift is given.
pub const DEFAULT_COEFF_FRAC_BITS: u32 = 15;

/// Default anti-alias transition band, normalized to the input rate.
pub const DEFAULT_TRANSITION: f64 = 0.05;
