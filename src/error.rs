use thiserror::Error;

use crate::numeric::NumericKind;

/// Rejections raised while a filter is being configured.
///
/// Every check runs before any stage is constructed, so a filter that builds
/// successfully never fails these conditions at run time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Incompatible type combination: {data} data with {coeff} coefficients ({reason})")]
    IncompatibleTypeCombination {
        data: NumericKind,
        coeff: NumericKind,
        reason: &'static str,
    },

    #[error("Unsupported decimation factor {0}")]
    UnsupportedDecimationFactor(usize),

    #[error("Shift must be 0 for floating-point data, got {0}")]
    InvalidShiftForFloatingPoint(u32),

    #[error("Stage {stage} range {range} is not a multiple of the decimation factor {decimation}")]
    RangeNotMultipleOfDecimationFactor {
        stage: usize,
        range: usize,
        decimation: usize,
    },

    #[error("Unsupported output count {0} (expected 1 or 2)")]
    UnsupportedOutputCount(usize),

    #[error(
        "Stage {stage}: lane offsets need {needed} samples of addressing range, only {available} available"
    )]
    ExceededOffsetAddressingRange {
        stage: usize,
        needed: usize,
        available: usize,
    },

    #[error("Decimation factor {decimation} exceeds the maximum of {max} for this architecture")]
    ExceededMaxDecimationForArchitecture { decimation: usize, max: usize },

    #[error("FIR length {fir_length} is not a multiple of the decimation factor {decimation}")]
    FirLengthNotMultipleOfDecimationFactor {
        fir_length: usize,
        decimation: usize,
    },

    #[error("Unsupported FIR length {0}")]
    UnsupportedFirLength(usize),

    #[error("Unsupported cascade length {cascade_length} for FIR length {fir_length}")]
    UnsupportedCascadeLength {
        cascade_length: usize,
        fir_length: usize,
    },

    #[error("Stage ranges {ranges:?} do not sum to the FIR length {fir_length}")]
    RangeSumMismatch {
        ranges: Vec<usize>,
        fir_length: usize,
    },

    #[error("Unsupported shift {0}")]
    UnsupportedShift(u32),

    #[error("Unsupported rounding mode code {0}")]
    UnsupportedRoundingMode(u8),

    #[error("Unsupported saturation mode code {0}")]
    UnsupportedSaturationMode(u8),

    #[error("Invalid block size {block_size}: must be a non-zero multiple of {multiple}")]
    InvalidBlockSize { block_size: usize, multiple: usize },

    #[error("Stage {stage} range {range} exceeds the capacity of {capacity} taps")]
    FirRangeExceedsCapacity {
        stage: usize,
        range: usize,
        capacity: usize,
    },

    #[error("Dual input is only supported with the stream API")]
    UnsupportedDualInput,

    #[error("Invalid coefficient phase: {0}")]
    InvalidCoefficientPhase(String),

    #[error("Input delay {delay} is not supported ({reason})")]
    UnsupportedInputDelay { delay: isize, reason: &'static str },

    #[error("Unsupported parallel paths: SSR {ssr}, decimation polyphases {para_deci_poly} ({reason})")]
    UnsupportedParallelPaths {
        ssr: usize,
        para_deci_poly: usize,
        reason: &'static str,
    },

    #[error("Expected {expected} coefficients, got {actual}")]
    TapCountMismatch { expected: usize, actual: usize },

    #[error("Filter design failed: {0}")]
    FilterDesign(String),
}

/// Call-shape misuse detected while feeding a configured filter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Expected an input block of {expected} samples, got {actual}")]
    BlockLength { expected: usize, actual: usize },

    #[error("Expected {expected} input paths, got {actual}")]
    PathCount { expected: usize, actual: usize },

    #[error("Dual input blocks differ in length: {first} vs {second}")]
    DualInputMismatch { first: usize, second: usize },

    #[error("Input kind does not match the configuration (dual input: {dual_input})")]
    InputKind { dual_input: bool },

    #[error("Coefficients supplied but the filter was built without reload support")]
    TapsWithoutReload,

    #[error("Reload rejected: {0}")]
    Reload(#[from] ConfigError),
}

/// Failures of the threaded cascade driver.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cascade pipeline disconnected")]
    Disconnected,

    #[error("Cascade stage {0} panicked")]
    StagePanicked(usize),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
