use serde::Serialize;
use std::fmt;

use super::target::TargetProfile;
use crate::config::ApiMode;
use crate::constants::{STREAM_REPEAT_NO_PERMUTE, STREAM_REPEAT_PERMUTE};
use crate::numeric::NumericKind;

/// Execution strategy of one cascade stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// Window API; data gathered afresh for every output vector
    Basic,
    /// Window API; one register fill serves several output vectors
    IncrementalStrobe,
    /// Stream API with strided lane addressing
    Stream,
    /// Window API on targets without lane permutes
    PhaseParallel,
    /// Stream API on targets without lane permutes
    StreamPhaseParallel,
}

impl Architecture {
    pub fn is_stream(self) -> bool {
        matches!(
            self,
            Architecture::Stream | Architecture::StreamPhaseParallel
        )
    }

    pub fn is_phase_parallel(self) -> bool {
        matches!(
            self,
            Architecture::PhaseParallel | Architecture::StreamPhaseParallel
        )
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Architecture::Basic => "basic",
            Architecture::IncrementalStrobe => "incremental_strobe",
            Architecture::Stream => "stream",
            Architecture::PhaseParallel => "phase_parallel",
            Architecture::StreamPhaseParallel => "stream_phase_parallel",
        };
        f.write_str(name)
    }
}

/// Per-stage inputs of architecture selection
#[derive(Debug, Clone, Copy)]
pub struct StageShape {
    pub api: ApiMode,
    pub data: NumericKind,
    pub decimation: usize,
    pub lanes: usize,
    pub columns: usize,
    pub block_size: usize,
    pub range: usize,
}

impl StageShape {
    /// Samples spanned by one output vector of this stage
    pub fn init_data_needed(&self) -> usize {
        (self.lanes - 1) * self.decimation + self.range
    }

    /// Output vectors served by one incremental-strobe register fill
    pub fn strobe_repeat(&self, target: &TargetProfile) -> usize {
        if self.decimation.is_multiple_of(2) {
            target.loads_in_register()
        } else {
            (target.samples_in_register(self.data) / self.lanes).max(1)
        }
    }

    fn strobe_fits(&self, target: &TargetProfile) -> bool {
        let outputs = self.block_size / self.decimation;
        let repeat = self.strobe_repeat(target);
        let load = target.samples_per_load(self.data);
        let reserve = target.loads_in_register().saturating_sub(1);
        outputs.is_multiple_of(self.lanes * repeat)
            && self.init_data_needed() <= load * reserve + 1
    }
}

/// Choose the strategy for one stage.
///
/// Targets without permutes always decimate by phase splitting; otherwise the
/// stream API selects `Stream` and the window API prefers
/// `IncrementalStrobe` whenever its register budget allows.
pub fn select_architecture(shape: &StageShape, target: &TargetProfile) -> Architecture {
    match (target.permute_support, shape.api) {
        (false, ApiMode::Window) => Architecture::PhaseParallel,
        (false, ApiMode::Stream) => Architecture::StreamPhaseParallel,
        (true, ApiMode::Stream) => Architecture::Stream,
        (true, ApiMode::Window) if shape.strobe_fits(target) => Architecture::IncrementalStrobe,
        (true, ApiMode::Window) => Architecture::Basic,
    }
}

/// Output vectors a stream stage processes per repetition of its inner loop
pub fn stream_repeat(target: &TargetProfile) -> usize {
    if target.permute_support {
        STREAM_REPEAT_PERMUTE
    } else {
        STREAM_REPEAT_NO_PERMUTE
    }
}

/// Leading output vectors of a stream stage that see no real data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamPrologue {
    /// Output lanes whose whole range precedes the stream start
    pub empty_init_lanes: usize,
    /// Vectors containing at least one such lane
    pub null_accs: usize,
}

impl StreamPrologue {
    pub fn new(offset: usize, decimation: usize, lanes: usize) -> Self {
        let empty_init_lanes = offset / decimation;
        Self {
            empty_init_lanes,
            null_accs: empty_init_lanes.div_ceil(lanes),
        }
    }
}
