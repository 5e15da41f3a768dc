//! Construction-time legality checks
//!
//! Nothing here has side effects: [`validate`] either accepts a
//! configuration for a data/coefficient pair on a target, or names the first
//! rule it breaks.

use super::arch::{Architecture, StageShape, select_architecture, stream_repeat};
use super::offsets::{Addressing, decimate_offsets};
use super::target::{self, TargetProfile};
use crate::config::{ApiMode, CoefficientPhase, FilterConfig, OutputCount, ReloadMode};
use crate::constants::{
    MAX_CASCADE_LENGTH, MAX_DECIMATION, MAX_FIR_LENGTH, MAX_SHIFT, MAX_SSR, MAX_WINDOW_RANGE,
    MIN_DECIMATION, MIN_FIR_LENGTH, WINDOW_ACCESS_BYTES,
};
use crate::error::{ConfigError, Result};
use crate::numeric::{NumericKind, RoundingMode, SaturationMode};

/// Check every static rule for `config` with `data` samples and `coeff`
/// coefficients on `target`.
pub fn validate(
    config: &FilterConfig,
    data: NumericKind,
    coeff: NumericKind,
    target: &TargetProfile,
) -> Result<()> {
    check_scalars(config, data)?;
    if config.ssr != 1 || config.para_deci_poly != 1 {
        return Err(ConfigError::UnsupportedParallelPaths {
            ssr: config.ssr,
            para_deci_poly: config.para_deci_poly,
            reason: "one cascade serves a single path; use SsrDecimator",
        });
    }
    let (lanes, columns) = check_type_combination(data, coeff, target)?;
    let ranges = stage_ranges(config)?;
    check_coefficient_phase(config)?;
    check_input_delay(config)?;
    check_block_size(config, data, lanes, target)?;

    if config.dual_input && config.api != ApiMode::Stream {
        return Err(ConfigError::UnsupportedDualInput);
    }

    for (stage, &range) in ranges.iter().enumerate() {
        check_capacity(config, data, stage, range, target)?;
        let shape = StageShape {
            api: config.api,
            data,
            decimation: config.decimation,
            lanes,
            columns,
            block_size: config.block_size,
            range,
        };
        check_addressing(&shape, stage, target)?;
    }
    Ok(())
}

fn check_scalars(config: &FilterConfig, data: NumericKind) -> Result<()> {
    let fir_length = config.fir_length;
    let decimation = config.decimation;

    if !(MIN_FIR_LENGTH..=MAX_FIR_LENGTH).contains(&fir_length) {
        return Err(ConfigError::UnsupportedFirLength(fir_length));
    }
    if !(MIN_DECIMATION..=MAX_DECIMATION).contains(&decimation) {
        return Err(ConfigError::UnsupportedDecimationFactor(decimation));
    }
    if !fir_length.is_multiple_of(decimation) {
        return Err(ConfigError::FirLengthNotMultipleOfDecimationFactor {
            fir_length,
            decimation,
        });
    }
    if config.cascade_length == 0 || config.cascade_length > MAX_CASCADE_LENGTH {
        return Err(ConfigError::UnsupportedCascadeLength {
            cascade_length: config.cascade_length,
            fir_length,
        });
    }
    if config.shift > MAX_SHIFT {
        return Err(ConfigError::UnsupportedShift(config.shift));
    }
    if data.is_float() && config.shift != 0 {
        return Err(ConfigError::InvalidShiftForFloatingPoint(config.shift));
    }
    if RoundingMode::from_code(config.rounding).is_none() {
        return Err(ConfigError::UnsupportedRoundingMode(config.rounding));
    }
    if SaturationMode::from_code(config.saturation).is_none() {
        return Err(ConfigError::UnsupportedSaturationMode(config.saturation));
    }
    if OutputCount::from_count(config.outputs).is_none() {
        return Err(ConfigError::UnsupportedOutputCount(config.outputs));
    }
    Ok(())
}

/// Accept or reject a data/coefficient pair, returning `(lanes, columns)`.
pub fn check_type_combination(
    data: NumericKind,
    coeff: NumericKind,
    target: &TargetProfile,
) -> Result<(usize, usize)> {
    let reject = |reason| ConfigError::IncompatibleTypeCombination {
        data,
        coeff,
        reason,
    };

    if coeff.is_complex() && !data.is_complex() {
        return Err(reject("real data cannot take complex coefficients"));
    }
    if data.is_float() != coeff.is_float() {
        return Err(reject("floating-point and integer types cannot be mixed"));
    }
    if coeff.bytes() > data.bytes() {
        return Err(reject("coefficients are wider than data"));
    }
    if target.permute_support && data == NumericKind::Int16 && coeff == NumericKind::Int16 {
        return Err(reject("int16 x int16 needs a target without lane permutes"));
    }
    match (target::lanes(data, coeff), target::columns(data, coeff)) {
        (Some(lanes), Some(columns)) => Ok((lanes, columns)),
        _ => Err(reject("no multiply-accumulate for this pair")),
    }
}

/// Per-stage tap ranges: the explicit list when given, otherwise the
/// balanced partition.
pub fn stage_ranges(config: &FilterConfig) -> Result<Vec<usize>> {
    let fir_length = config.fir_length;
    let decimation = config.decimation;
    let cascade_length = config.cascade_length;

    let ranges = match &config.fir_range_lens {
        Some(ranges) => ranges.clone(),
        None => (0..cascade_length)
            .map(|p| balanced_range(fir_length, decimation, cascade_length, p))
            .collect(),
    };

    if ranges.len() != cascade_length || ranges.iter().sum::<usize>() != fir_length {
        return Err(ConfigError::RangeSumMismatch { ranges, fir_length });
    }
    for (stage, &range) in ranges.iter().enumerate() {
        if !range.is_multiple_of(decimation) {
            return Err(ConfigError::RangeNotMultipleOfDecimationFactor {
                stage,
                range,
                decimation,
            });
        }
        if range == 0 {
            return Err(ConfigError::UnsupportedCascadeLength {
                cascade_length,
                fir_length,
            });
        }
    }
    Ok(ranges)
}

/// Range of stage `p` under the balanced partition.
///
/// Every stage gets an equal share rounded down to whole decimation groups;
/// the remainder is dealt out `D` taps at a time from the front, and any
/// sub-`D` residue lands on the last stage.
pub fn balanced_range(
    fir_length: usize,
    decimation: usize,
    cascade_length: usize,
    p: usize,
) -> usize {
    let group = decimation * cascade_length;
    let truncated = (fir_length / group) * group;
    let base = truncated / cascade_length;
    let rem = fir_length - truncated;
    if p + 1 < cascade_length {
        base + if rem >= decimation * (p + 1) { decimation } else { 0 }
    } else {
        base + rem % decimation
    }
}

/// Offset of stage `p` under the balanced partition: the taps owned by all
/// earlier stages.
pub fn balanced_offset(
    fir_length: usize,
    decimation: usize,
    cascade_length: usize,
    p: usize,
) -> usize {
    let group = decimation * cascade_length;
    let truncated = (fir_length / group) * group;
    let base = truncated / cascade_length;
    let rem = fir_length - truncated;
    p * base + decimation * p.min(rem / decimation)
}

/// Taps of a phase that run past the end of the supplied array read as
/// null coefficients, but the newest tap must exist.
fn check_coefficient_phase(config: &FilterConfig) -> Result<()> {
    let cp = &config.coefficient_phase;
    let invalid = |msg: String| Err(ConfigError::InvalidCoefficientPhase(msg));

    if cp.phases == 0 {
        return invalid("phases must be at least 1".to_string());
    }
    if cp.phase >= cp.phases {
        return invalid(format!("phase {} out of {} phases", cp.phase, cp.phases));
    }
    let supplied = cp.supplied_len(config.fir_length);
    let first = cp.phase_offset + (cp.phases - 1 - cp.phase);
    if first >= supplied {
        return invalid(format!(
            "phase {} at offset {} lies outside {} coefficients",
            cp.phase, cp.phase_offset, supplied
        ));
    }
    Ok(())
}

fn check_input_delay(config: &FilterConfig) -> Result<()> {
    let delay = config.input_delay;
    if delay == 0 {
        return Ok(());
    }
    if config.api != ApiMode::Stream {
        return Err(ConfigError::UnsupportedInputDelay {
            delay,
            reason: "only the stream API delays its input",
        });
    }
    if delay < 0 && delay.unsigned_abs() >= config.decimation {
        return Err(ConfigError::UnsupportedInputDelay {
            delay,
            reason: "the input can be advanced by at most D - 1 samples",
        });
    }
    Ok(())
}

/// Check the rules of a super-sample-rate filter with `ssr` output paths and
/// `ssr * para_deci_poly` input paths, before its sub-filters are resolved.
pub fn check_parallel_paths(config: &FilterConfig, data: NumericKind) -> Result<()> {
    let reject = |reason| ConfigError::UnsupportedParallelPaths {
        ssr: config.ssr,
        para_deci_poly: config.para_deci_poly,
        reason,
    };

    if !(1..=MAX_SSR).contains(&config.ssr) {
        return Err(reject("SSR must be between 1 and 16"));
    }
    if config.para_deci_poly == 0 || !config.decimation.is_multiple_of(config.para_deci_poly) {
        return Err(reject("decimation polyphases must divide the decimation factor"));
    }
    check_scalars(config, data)?;

    let paths = config.input_paths();
    if paths > 1 && config.api != ApiMode::Stream {
        return Err(reject("parallel paths need the stream API"));
    }
    if config.dual_input {
        return Err(reject("dual input is not supported with parallel paths"));
    }
    if config.fir_range_lens.is_some() {
        return Err(reject("explicit stage ranges apply to a single path"));
    }
    if config.coefficient_phase != CoefficientPhase::default() {
        return Err(reject("coefficient phases are assigned per path"));
    }
    if config.input_delay != 0 {
        return Err(reject("input delays are assigned per path"));
    }
    if config.fir_length < paths * MIN_FIR_LENGTH {
        return Err(reject("fewer than 4 taps per input path"));
    }
    if !config.block_size.is_multiple_of(paths) {
        return Err(reject("block size must split evenly across input paths"));
    }
    Ok(())
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}

/// Required granularity of the input block
pub fn block_multiple(
    config: &FilterConfig,
    data: NumericKind,
    lanes: usize,
    target: &TargetProfile,
) -> usize {
    let mut multiple = config.decimation * lanes;
    if config.api == ApiMode::Stream {
        multiple *= stream_repeat(target);
    }
    if config.dual_input {
        multiple = lcm(multiple, 2 * (WINDOW_ACCESS_BYTES / data.bytes()));
    }
    multiple
}

fn check_block_size(
    config: &FilterConfig,
    data: NumericKind,
    lanes: usize,
    target: &TargetProfile,
) -> Result<()> {
    let multiple = block_multiple(config, data, lanes, target);
    if config.block_size == 0 || !config.block_size.is_multiple_of(multiple) {
        return Err(ConfigError::InvalidBlockSize {
            block_size: config.block_size,
            multiple,
        });
    }
    Ok(())
}

fn check_capacity(
    config: &FilterConfig,
    data: NumericKind,
    stage: usize,
    range: usize,
    target: &TargetProfile,
) -> Result<()> {
    let (held, capacity) = match (config.api, config.reload) {
        // A reloadable window stage must be able to hold any sub-range.
        (ApiMode::Window, ReloadMode::Reloadable) => (config.fir_length, MAX_WINDOW_RANGE),
        (ApiMode::Window, ReloadMode::Static) => (range, MAX_WINDOW_RANGE),
        (ApiMode::Stream, _) => (range, target.samples_in_register(data)),
    };
    if held > capacity {
        return Err(ConfigError::FirRangeExceedsCapacity {
            stage,
            range: held,
            capacity,
        });
    }
    Ok(())
}

fn check_addressing(shape: &StageShape, stage: usize, target: &TargetProfile) -> Result<()> {
    let architecture = select_architecture(shape, target);
    let decimation = shape.decimation;

    if architecture == Architecture::StreamPhaseParallel && decimation > target.vector_registers {
        return Err(ConfigError::ExceededMaxDecimationForArchitecture {
            decimation,
            max: target.vector_registers,
        });
    }
    if architecture.is_phase_parallel() {
        return Ok(());
    }

    let range = target.offset_range(shape.data);
    let spread = (shape.lanes - 1) * decimation;
    let offsets = decimate_offsets(decimation, shape.lanes, shape.columns, range);
    if architecture.is_stream() && offsets.addressing() == Addressing::High {
        return Err(ConfigError::ExceededOffsetAddressingRange {
            stage,
            needed: spread + 1,
            available: range,
        });
    }

    // Worst-case misalignment of a window read inside the data register
    let x_offset = WINDOW_ACCESS_BYTES / shape.data.bytes() - 1;
    let needed = x_offset + spread;
    let available =
        target.samples_in_register(shape.data) - target.samples_per_load(shape.data);
    if needed > available {
        return Err(ConfigError::ExceededOffsetAddressingRange {
            stage,
            needed,
            available,
        });
    }
    Ok(())
}
