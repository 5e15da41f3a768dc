pub mod config;
pub mod constants;
pub mod design;
pub mod error;
pub mod filter;
pub mod numeric;
pub mod wav;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use config::{ApiMode, FilterConfig, OutputCount, ReloadMode};
pub use error::{ConfigError, PipelineError, ProcessError, Result};
pub use filter::{
    BlockInput, BlockOutput, CascadePipeline, FilterPlan, FirDecimator, SsrDecimator,
    TargetProfile,
};
pub use numeric::{Coefficient, MulAcc, NumericKind, RoundingMode, Sample, SaturationMode};
pub use wav::save_wav;
