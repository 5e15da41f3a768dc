use crate::numeric::{Accumulator, Coefficient, MulAcc, RoundingMode, SaturationMode};

/// Direct-form decimating FIR used as the ground truth in tests
///
/// Output `j` is `sum_i taps[L-1-i] * x[j*D - i]`, with samples before the
/// start of `input` taken as empty, brought to sample precision exactly as
/// the last cascade stage does.
pub fn reference_decimate<T: MulAcc<C>, C: Coefficient>(
    taps: &[C],
    input: &[T],
    decimation: usize,
    shift: u32,
    rounding: RoundingMode,
    saturation: SaturationMode,
) -> Vec<T> {
    let last = taps.len() - 1;
    (0..input.len().div_ceil(decimation))
        .map(|j| {
            let n = j * decimation;
            let acc = (0..taps.len())
                .filter(|&i| i <= n)
                .fold(T::Acc::zero(), |acc, i| {
                    acc + input[n - i].multiply(taps[last - i])
                });
            T::from_acc(acc, shift, rounding, saturation)
        })
        .collect()
}

/// Full-precision reference for real floating-point filters
pub fn reference_decimate_f64(taps: &[f64], input: &[f64], decimation: usize) -> Vec<f64> {
    let last = taps.len() - 1;
    (0..input.len().div_ceil(decimation))
        .map(|j| {
            let n = j * decimation;
            (0..taps.len().min(n + 1))
                .map(|i| input[n - i] * taps[last - i])
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_impulse_response() {
        let taps: Vec<i16> = (1..=16).collect();
        let mut x = vec![0i32; 32];
        x[0] = 1;
        let y = reference_decimate(
            &taps,
            &x,
            4,
            0,
            RoundingMode::ConvEven,
            SaturationMode::Asymmetric,
        );
        assert_eq!(y, vec![16, 12, 8, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn test_reference_f64() {
        let y = reference_decimate_f64(&[0.5, 0.5], &[2.0, 4.0, 6.0, 8.0], 2);
        assert_eq!(y, vec![1.0, 5.0]);
    }
}
