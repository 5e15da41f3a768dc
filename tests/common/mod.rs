#![allow(dead_code)]

use firdecim::config::FilterConfig;
use firdecim::filter::FirDecimator;
use firdecim::numeric::{Coefficient, MulAcc, RoundingMode, SaturationMode};
use firdecim::simulation::reference_decimate;

/// Feed `signal` through `filter` one block at a time.
pub fn run_blocks<T: MulAcc<C>, C: Coefficient>(
    filter: &mut FirDecimator<T, C>,
    signal: &[T],
) -> Vec<T> {
    let block_size = filter.plan().block_size;
    assert!(
        signal.len().is_multiple_of(block_size),
        "signal must be a whole number of blocks"
    );
    signal
        .chunks(block_size)
        .flat_map(|block| filter.process(block).expect("block rejected"))
        .collect()
}

/// Direct-form output for `config`'s shift, rounding and saturation.
pub fn reference<T: MulAcc<C>, C: Coefficient>(
    config: &FilterConfig,
    taps: &[C],
    signal: &[T],
) -> Vec<T> {
    reference_decimate(
        taps,
        signal,
        config.decimation,
        config.shift,
        RoundingMode::from_code(config.rounding).unwrap(),
        SaturationMode::from_code(config.saturation).unwrap(),
    )
}

/// Impulse response taps `1..=n`.
pub fn ramp<C: From<i16>>(n: usize) -> Vec<C> {
    (1..=n as i16).map(C::from).collect()
}
