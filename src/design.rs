//! Anti-alias coefficient design
//!
//! Equiripple lowpass taps for a given decimation factor, plus quantization
//! into the coefficient types the filter accepts.

use pm_remez::{BandSetting, constant, pm_parameters, pm_remez};

use crate::error::{ConfigError, Result};

/// Design a lowpass with its band edge at the decimated Nyquist rate.
///
/// # Arguments
/// * `num_taps` - Filter length
/// * `decimation` - Decimation factor the taps will serve
/// * `transition` - Transition bandwidth, normalized to the input rate
///
/// # Errors
/// Returns `ConfigError::FilterDesign` if the bands collapse or the Remez
/// exchange does not converge
pub fn design_lowpass(num_taps: usize, decimation: usize, transition: f64) -> Result<Vec<f64>> {
    if decimation < 2 {
        return Err(ConfigError::FilterDesign(format!(
            "Decimation by {} needs no anti-alias filter",
            decimation
        )));
    }
    let edge = 0.5 / decimation as f64;
    let pass_end = edge - transition / 2.0;
    let stop_start = edge + transition / 2.0;
    if pass_end <= 0.0 || stop_start >= 0.5 {
        return Err(ConfigError::FilterDesign(format!(
            "Invalid transition {} for decimation by {}",
            transition, decimation
        )));
    }

    let bands = [
        BandSetting::new(0.0, pass_end, constant(1.0))
            .map_err(|e| ConfigError::FilterDesign(format!("Passband: {:?}", e)))?,
        BandSetting::new(stop_start, 0.5, constant(0.0))
            .map_err(|e| ConfigError::FilterDesign(format!("Stopband: {:?}", e)))?,
    ];

    let params = pm_parameters(num_taps, &bands)
        .map_err(|e| ConfigError::FilterDesign(format!("PM parameters: {:?}", e)))?;

    let design =
        pm_remez(&params).map_err(|e| ConfigError::FilterDesign(format!("PM Remez: {:?}", e)))?;

    log::debug!(
        "Designed {}-tap lowpass for decimation by {} (transition {})",
        num_taps,
        decimation,
        transition
    );
    Ok(design.impulse_response)
}

/// Coefficient types that designed taps can be converted into
pub trait QuantizedCoefficient: Sized {
    /// Convert one tap; integer types scale by `2^frac_bits` and saturate.
    fn quantize(value: f64, frac_bits: u32) -> Self;
}

impl QuantizedCoefficient for f32 {
    fn quantize(value: f64, _frac_bits: u32) -> Self {
        value as f32
    }
}

impl QuantizedCoefficient for i16 {
    fn quantize(value: f64, frac_bits: u32) -> Self {
        (value * 2f64.powi(frac_bits as i32))
            .round()
            .clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }
}

impl QuantizedCoefficient for i32 {
    fn quantize(value: f64, frac_bits: u32) -> Self {
        (value * 2f64.powi(frac_bits as i32))
            .round()
            .clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }
}

pub fn quantize<C: QuantizedCoefficient>(taps: &[f64], frac_bits: u32) -> Vec<C> {
    taps.iter().map(|&t| C::quantize(t, frac_bits)).collect()
}
