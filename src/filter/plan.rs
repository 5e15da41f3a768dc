use serde::Serialize;
use std::fmt;

use super::arch::{Architecture, StageShape, StreamPrologue, select_architecture};
use super::offsets::{Addressing, decimate_offsets};
use super::target::TargetProfile;
use super::taps::TapSetManager;
use super::validate::{balanced_offset, check_type_combination, stage_ranges, validate};
use crate::config::{
    ApiMode, CascadePosition, CoefficientPhase, FilterConfig, OutputCount, ReloadMode,
};
use crate::error::{ConfigError, Result};
use crate::numeric::{NumericKind, RoundingMode, SaturationMode};

/// Resolved geometry and strategy of one cascade stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagePlan {
    pub index: usize,
    pub position: CascadePosition,
    /// First internal tap owned by this stage
    pub offset: usize,
    /// Number of taps owned by this stage
    pub range: usize,
    pub architecture: Architecture,
    pub addressing: Addressing,
    pub lanes: usize,
    pub columns: usize,
    /// Samples spanned by one output vector
    pub init_data_needed: usize,
    /// Vectors per register fill (incremental strobe only)
    pub strobe_repeat: Option<usize>,
    /// Empty leading vectors (stream architectures only)
    pub prologue: Option<StreamPrologue>,
    /// Nibble-packed lane offsets of the first lane group
    pub packed_offsets: Option<u32>,
}

/// A validated filter configuration with every stage resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterPlan {
    pub data: NumericKind,
    pub coeff: NumericKind,
    pub fir_length: usize,
    pub decimation: usize,
    pub shift: u32,
    pub rounding: RoundingMode,
    pub saturation: SaturationMode,
    pub outputs: OutputCount,
    pub dual_input: bool,
    pub api: ApiMode,
    pub reload: ReloadMode,
    pub block_size: usize,
    pub coefficient_phase: CoefficientPhase,
    /// Extra stream lead in samples; negative values advance the input
    pub input_delay: isize,
    pub target: TargetProfile,
    pub stages: Vec<StagePlan>,
}

impl FilterPlan {
    /// Validate `config` and resolve every stage.
    pub fn resolve(
        config: &FilterConfig,
        data: NumericKind,
        coeff: NumericKind,
        target: &TargetProfile,
    ) -> Result<Self> {
        validate(config, data, coeff, target)?;
        let (lanes, columns) = check_type_combination(data, coeff, target)?;
        let ranges = stage_ranges(config)?;
        let cascade_length = ranges.len();

        let mut stages = Vec::with_capacity(cascade_length);
        let mut offset = 0;
        for (index, &range) in ranges.iter().enumerate() {
            if config.fir_range_lens.is_none() {
                debug_assert_eq!(
                    offset,
                    balanced_offset(config.fir_length, config.decimation, cascade_length, index)
                );
            }
            let shape = StageShape {
                api: config.api,
                data,
                decimation: config.decimation,
                lanes,
                columns,
                block_size: config.block_size,
                range,
            };
            let architecture = select_architecture(&shape, target);
            let offsets =
                decimate_offsets(config.decimation, lanes, columns, target.offset_range(data));

            stages.push(StagePlan {
                index,
                position: CascadePosition::of(index, cascade_length),
                offset,
                range,
                architecture,
                addressing: offsets.addressing(),
                lanes,
                columns,
                init_data_needed: shape.init_data_needed(),
                strobe_repeat: (architecture == Architecture::IncrementalStrobe)
                    .then(|| shape.strobe_repeat(target)),
                prologue: architecture
                    .is_stream()
                    .then(|| StreamPrologue::new(offset, config.decimation, lanes)),
                packed_offsets: offsets.packed(),
            });
            offset += range;
        }

        let plan = Self {
            data,
            coeff,
            fir_length: config.fir_length,
            decimation: config.decimation,
            shift: config.shift,
            rounding: RoundingMode::from_code(config.rounding)
                .ok_or(ConfigError::UnsupportedRoundingMode(config.rounding))?,
            saturation: SaturationMode::from_code(config.saturation)
                .ok_or(ConfigError::UnsupportedSaturationMode(config.saturation))?,
            outputs: OutputCount::from_count(config.outputs)
                .ok_or(ConfigError::UnsupportedOutputCount(config.outputs))?,
            dual_input: config.dual_input,
            api: config.api,
            reload: config.reload,
            block_size: config.block_size,
            coefficient_phase: config.coefficient_phase,
            input_delay: config.input_delay,
            target: target.clone(),
            stages,
        };
        log::info!(
            "Resolved {}-tap decimate-by-{} filter into {} stage(s)",
            plan.fir_length,
            plan.decimation,
            plan.stages.len()
        );
        for stage in &plan.stages {
            log::debug!(
                "Stage {} ({}): taps {}..{} via {} ({:?} addressing)",
                stage.index,
                stage.position,
                stage.offset,
                stage.offset + stage.range,
                stage.architecture,
                stage.addressing
            );
        }
        Ok(plan)
    }

    pub fn lanes(&self) -> usize {
        self.stages.first().map_or(1, |s| s.lanes)
    }

    /// Decimated samples produced per invocation and output port
    pub fn output_block_size(&self) -> usize {
        self.block_size / self.decimation
    }

    /// Output vectors computed per invocation
    pub fn vectors_per_block(&self) -> usize {
        self.output_block_size() / self.lanes()
    }

    /// Samples expected on each input port per invocation
    pub fn input_port_size(&self) -> usize {
        if self.dual_input {
            self.block_size / 2
        } else {
            self.block_size
        }
    }

    /// Tap transform for `stage`
    pub fn tap_manager(&self, stage: &StagePlan) -> TapSetManager {
        TapSetManager::new(
            self.fir_length,
            self.decimation,
            stage.offset,
            stage.range,
            stage.columns,
            stage.architecture.is_phase_parallel(),
            self.target.coefficients_per_load(self.coeff),
            self.coefficient_phase,
        )
    }
}

impl fmt::Display for FilterPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "FIR: {} taps, decimate by {}, {} data x {} coefficients",
            self.fir_length, self.decimation, self.data, self.coeff
        )?;
        writeln!(
            f,
            "Output: shift {}, rounding {}, saturation {}, {} port(s)",
            self.shift,
            self.rounding,
            self.saturation,
            self.outputs.count()
        )?;
        write!(
            f,
            "Block: {} in / {} out, {:?} API{}{}",
            self.block_size,
            self.output_block_size(),
            self.api,
            if self.dual_input { ", dual input" } else { "" },
            if self.reload == ReloadMode::Reloadable {
                ", reloadable"
            } else {
                ""
            }
        )?;
        if self.input_delay != 0 {
            write!(f, ", input delay {}", self.input_delay)?;
        }
        writeln!(f)?;
        for stage in &self.stages {
            let offsets = stage
                .packed_offsets
                .map_or("-".to_string(), |p| format!("{:#x}", p));
            writeln!(
                f,
                "  stage {:>2} {:<6} taps {:>4}..{:<4} {:<21} lanes {} cols {} offsets {}",
                stage.index,
                stage.position.to_string(),
                stage.offset,
                stage.offset + stage.range,
                stage.architecture.to_string(),
                stage.lanes,
                stage.columns,
                offsets
            )?;
        }
        Ok(())
    }
}
