//! Configuration for the decimating FIR engine.
//!
//! A [`FilterConfig`] is a plain description of the filter; nothing in it is
//! checked until a filter is built from it, at which point the validator
//! resolves it into a [`FilterPlan`](crate::filter::FilterPlan).
//!
//! Rounding, saturation and the output count are kept as the raw codes a
//! configuration file carries so that out-of-range values can be reported
//! instead of being unrepresentable.
//!
//! ```
//! use firdecim::config::{ApiMode, FilterConfig};
//!
//! let mut config = FilterConfig::default();
//! config.fir_length = 48;
//! config.decimation = 3;
//! config.cascade_length = 2;
//! config.api = ApiMode::Stream;
//! ```

use std::fmt;
use std::str::FromStr;

use crate::numeric::{RoundingMode, SaturationMode};

/// How input samples reach each stage
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// Fixed-size blocks with `L - 1` samples of retained history
    #[default]
    Window,
    /// Continuous FIFO with no history before the stream start
    Stream,
}

/// Whether coefficients may be replaced between invocations
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    #[default]
    Static,
    Reloadable,
}

/// Number of output ports fed from the final accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCount {
    #[default]
    Single,
    Dual,
}

impl OutputCount {
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(OutputCount::Single),
            2 => Some(OutputCount::Dual),
            _ => None,
        }
    }

    pub fn count(self) -> usize {
        match self {
            OutputCount::Single => 1,
            OutputCount::Dual => 2,
        }
    }
}

/// Place of a stage in the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadePosition {
    /// Sole stage: no cascade input, produces samples
    Only,
    /// Produces partials, consumes none
    First,
    /// Consumes and produces partials
    Middle,
    /// Consumes partials, produces samples
    Last,
}

impl CascadePosition {
    pub fn of(index: usize, cascade_length: usize) -> Self {
        match (index, cascade_length) {
            (_, 1) => CascadePosition::Only,
            (0, _) => CascadePosition::First,
            (i, c) if i + 1 == c => CascadePosition::Last,
            _ => CascadePosition::Middle,
        }
    }

    /// Whether this stage starts the accumulation chain
    pub fn is_head(self) -> bool {
        matches!(self, CascadePosition::Only | CascadePosition::First)
    }

    /// Whether this stage rounds and emits samples
    pub fn is_tail(self) -> bool {
        matches!(self, CascadePosition::Only | CascadePosition::Last)
    }
}

impl fmt::Display for CascadePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CascadePosition::Only => "only",
            CascadePosition::First => "first",
            CascadePosition::Middle => "middle",
            CascadePosition::Last => "last",
        };
        f.write_str(name)
    }
}

/// Selection of one interleaved coefficient phase out of a longer tap array
///
/// With `phases = 1` (the default) the caller supplies exactly `fir_length`
/// coefficients. With `phases = N` the caller supplies `phases_len`
/// coefficients interleaved N ways and this filter uses phase `phase`,
/// shifted by `phase_offset` taps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CoefficientPhase {
    pub phase: usize,
    pub phase_offset: usize,
    pub phases: usize,
    /// Length of the interleaved array; `None` means `fir_length * phases`
    pub phases_len: Option<usize>,
}

impl CoefficientPhase {
    /// Length of the coefficient array the caller must supply
    pub fn supplied_len(&self, fir_length: usize) -> usize {
        self.phases_len.unwrap_or(fir_length * self.phases)
    }
}

impl Default for CoefficientPhase {
    fn default() -> Self {
        Self {
            phase: 0,
            phase_offset: 0,
            phases: 1,
            phases_len: None,
        }
    }
}

/// Static description of a decimating FIR filter
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Total number of taps `L`
    pub fir_length: usize,
    /// Decimation factor `D`
    pub decimation: usize,
    /// Output right shift applied before rounding
    pub shift: u32,
    /// Rounding mode code (see [`RoundingMode`])
    pub rounding: u8,
    /// Saturation mode code (see [`SaturationMode`])
    pub saturation: u8,
    /// Number of cascade stages `C`
    pub cascade_length: usize,
    /// Explicit per-stage tap ranges; `None` selects the balanced partition
    pub fir_range_lens: Option<Vec<usize>>,
    /// Input samples consumed per invocation
    pub block_size: usize,
    /// Number of output ports (1 or 2)
    pub outputs: usize,
    /// Interleave two input ports into one sequence
    pub dual_input: bool,
    pub api: ApiMode,
    pub reload: ReloadMode,
    pub coefficient_phase: CoefficientPhase,
    /// Stream-API only: samples of extra delay on the input; negative
    /// values advance the input by up to `D - 1` samples
    pub input_delay: isize,
    /// Parallel output paths; input and output samples are interleaved
    /// across paths
    pub ssr: usize,
    /// Decimation polyphases split onto their own input paths
    pub para_deci_poly: usize,
}

impl FilterConfig {
    pub fn with_rounding(mut self, mode: RoundingMode) -> Self {
        self.rounding = mode.code();
        self
    }

    pub fn with_saturation(mut self, mode: SaturationMode) -> Self {
        self.saturation = mode.code();
        self
    }

    /// Output decimated samples per invocation
    pub fn output_block_size(&self) -> usize {
        self.block_size / self.decimation.max(1)
    }

    /// Number of input paths, `ssr * para_deci_poly`
    pub fn input_paths(&self) -> usize {
        self.ssr * self.para_deci_poly
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            fir_length: 32,
            decimation: 2,
            shift: 0,
            rounding: RoundingMode::default().code(),
            saturation: SaturationMode::Asymmetric.code(),
            cascade_length: 1,
            fir_range_lens: None,
            block_size: 256,
            outputs: 1,
            dual_input: false,
            api: ApiMode::Window,
            reload: ReloadMode::Static,
            coefficient_phase: CoefficientPhase::default(),
            input_delay: 0,
            ssr: 1,
            para_deci_poly: 1,
        }
    }
}

/// Explicit stage ranges as entered on a command line (`"16,16,8"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeList(pub Vec<usize>);

impl FromStr for RangeList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ranges = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .map_err(|_| format!("invalid range length: {}", part.trim()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if ranges.is_empty() {
            return Err("empty range list".to_string());
        }
        Ok(Self(ranges))
    }
}

impl fmt::Display for RangeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|r| r.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}
