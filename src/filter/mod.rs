mod arch;
mod decimator;
mod offsets;
mod pipeline;
mod plan;
mod reload;
mod ssr;
mod stage;
mod target;
mod taps;
mod validate;
mod window;

pub use arch::{Architecture, StageShape, StreamPrologue, select_architecture, stream_repeat};
pub use decimator::{BlockInput, BlockOutput, FirDecimator};
pub use offsets::{Addressing, DecimateOffsets, decimate_offsets};
pub use pipeline::{CascadePipeline, CascadeToken};
pub use plan::{FilterPlan, StagePlan};
pub use reload::{ChangeDetector, ReloadOutcome, ReloadState, ReloadTrigger, TapBank};
pub use ssr::{Branch, SsrDecimator, SsrLayout, deinterleave, interleave};
pub use stage::{CascadeStage, StageOutput};
pub use target::{TargetProfile, columns, lanes};
pub use taps::{InternalTapSet, TapSetManager};
pub use validate::{
    balanced_offset, balanced_range, block_multiple, check_parallel_paths, stage_ranges, validate,
};
pub use window::{SampleWindow, StreamBuffer, interleave_chunks};
