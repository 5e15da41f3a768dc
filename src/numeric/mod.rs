//! Sample, coefficient and accumulator types
//!
//! Integer samples accumulate in 64 bits (16-bit data) or 128 bits (32-bit
//! data, where a single full-scale product already needs 63 bits) and are
//! brought back to output precision by a rounding shift followed by
//! saturation. Floating-point
//! samples accumulate in double precision and are converted without shift.
//! Which data/coefficient pairs may be multiplied is encoded by the
//! [`MulAcc`] impls; the runtime validator applies the same rules to
//! [`NumericKind`] pairs.

mod rounding;

pub use rounding::{RoundingMode, SaturationMode, round_shift, saturate};

use num_complex::Complex;
use std::fmt;
use std::ops::{Add, AddAssign};

/// Runtime tag of a sample or coefficient type
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    Int16,
    CInt16,
    Int32,
    CInt32,
    Float,
    CFloat,
}

impl NumericKind {
    /// Storage size of one value in bytes
    pub fn bytes(self) -> usize {
        match self {
            NumericKind::Int16 => 2,
            NumericKind::CInt16 | NumericKind::Int32 | NumericKind::Float => 4,
            NumericKind::CInt32 | NumericKind::CFloat => 8,
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(
            self,
            NumericKind::CInt16 | NumericKind::CInt32 | NumericKind::CFloat
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumericKind::Float | NumericKind::CFloat)
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumericKind::Int16 => "int16",
            NumericKind::CInt16 => "cint16",
            NumericKind::Int32 => "int32",
            NumericKind::CInt32 => "cint32",
            NumericKind::Float => "float",
            NumericKind::CFloat => "cfloat",
        };
        f.write_str(name)
    }
}

/// Accumulator of a multiply-accumulate chain
pub trait Accumulator:
    Copy + Send + Sync + fmt::Debug + PartialEq + Add<Output = Self> + AddAssign + 'static
{
    fn zero() -> Self;
}

impl Accumulator for i64 {
    fn zero() -> Self {
        0
    }
}

impl Accumulator for i128 {
    fn zero() -> Self {
        0
    }
}

impl Accumulator for f64 {
    fn zero() -> Self {
        0.0
    }
}

impl Accumulator for Complex<i64> {
    fn zero() -> Self {
        Complex::new(0, 0)
    }
}

impl Accumulator for Complex<i128> {
    fn zero() -> Self {
        Complex::new(0, 0)
    }
}

impl Accumulator for Complex<f64> {
    fn zero() -> Self {
        Complex::new(0.0, 0.0)
    }
}

/// Filter coefficient type
pub trait Coefficient: Copy + Send + Sync + fmt::Debug + PartialEq + 'static {
    const KIND: NumericKind;

    /// The coefficient that contributes nothing; used for padding.
    fn null() -> Self;
}

/// Input and output sample type
pub trait Sample: Copy + Send + Sync + fmt::Debug + PartialEq + 'static {
    type Acc: Accumulator;
    const KIND: NumericKind;

    /// The value of samples preceding the start of a stream.
    fn empty() -> Self;

    /// Bring an accumulator back to sample precision.
    fn from_acc(
        acc: Self::Acc,
        shift: u32,
        rounding: RoundingMode,
        saturation: SaturationMode,
    ) -> Self;
}

/// Multiplication of a sample by a coefficient into the accumulator domain
///
/// Implemented only for legal data/coefficient pairs.
pub trait MulAcc<C: Coefficient>: Sample {
    fn multiply(self, coeff: C) -> Self::Acc;
}

fn narrow(
    acc: i128,
    shift: u32,
    rounding: RoundingMode,
    saturation: SaturationMode,
    min: i128,
    max: i128,
) -> i128 {
    saturate(round_shift(acc, shift, rounding), min, max, saturation)
}

macro_rules! coefficient_impls {
    ($($ty:ty => $kind:expr, $null:expr;)*) => {
        $(
            impl Coefficient for $ty {
                const KIND: NumericKind = $kind;
                fn null() -> Self {
                    $null
                }
            }
        )*
    };
}

coefficient_impls! {
    i16 => NumericKind::Int16, 0;
    i32 => NumericKind::Int32, 0;
    Complex<i16> => NumericKind::CInt16, Complex::new(0, 0);
    Complex<i32> => NumericKind::CInt32, Complex::new(0, 0);
    f32 => NumericKind::Float, 0.0;
    Complex<f32> => NumericKind::CFloat, Complex::new(0.0, 0.0);
}

macro_rules! real_int_sample {
    ($ty:ty, $acc:ty, $kind:expr) => {
        impl Sample for $ty {
            type Acc = $acc;
            const KIND: NumericKind = $kind;

            fn empty() -> Self {
                0
            }

            fn from_acc(
                acc: $acc,
                shift: u32,
                rounding: RoundingMode,
                saturation: SaturationMode,
            ) -> Self {
                let (min, max) = (<$ty>::MIN as i128, <$ty>::MAX as i128);
                narrow(acc as i128, shift, rounding, saturation, min, max) as $ty
            }
        }
    };
}

macro_rules! complex_int_sample {
    ($ty:ty, $acc:ty, $kind:expr) => {
        impl Sample for Complex<$ty> {
            type Acc = Complex<$acc>;
            const KIND: NumericKind = $kind;

            fn empty() -> Self {
                Complex::new(0, 0)
            }

            fn from_acc(
                acc: Complex<$acc>,
                shift: u32,
                rounding: RoundingMode,
                saturation: SaturationMode,
            ) -> Self {
                let (min, max) = (<$ty>::MIN as i128, <$ty>::MAX as i128);
                Complex::new(
                    narrow(acc.re as i128, shift, rounding, saturation, min, max) as $ty,
                    narrow(acc.im as i128, shift, rounding, saturation, min, max) as $ty,
                )
            }
        }
    };
}

real_int_sample!(i16, i64, NumericKind::Int16);
real_int_sample!(i32, i128, NumericKind::Int32);
complex_int_sample!(i16, i64, NumericKind::CInt16);
complex_int_sample!(i32, i128, NumericKind::CInt32);

impl Sample for f32 {
    type Acc = f64;
    const KIND: NumericKind = NumericKind::Float;

    fn empty() -> Self {
        0.0
    }

    fn from_acc(
        acc: f64,
        _shift: u32,
        _rounding: RoundingMode,
        _saturation: SaturationMode,
    ) -> Self {
        acc as f32
    }
}

impl Sample for Complex<f32> {
    type Acc = Complex<f64>;
    const KIND: NumericKind = NumericKind::CFloat;

    fn empty() -> Self {
        Complex::new(0.0, 0.0)
    }

    fn from_acc(
        acc: Complex<f64>,
        _shift: u32,
        _rounding: RoundingMode,
        _saturation: SaturationMode,
    ) -> Self {
        Complex::new(acc.re as f32, acc.im as f32)
    }
}

macro_rules! real_by_real {
    ($data:ty, $coeff:ty, $acc:ty) => {
        impl MulAcc<$coeff> for $data {
            fn multiply(self, coeff: $coeff) -> $acc {
                self as $acc * coeff as $acc
            }
        }
    };
}

macro_rules! complex_by_real {
    ($data:ty, $coeff:ty, $acc:ty) => {
        impl MulAcc<$coeff> for Complex<$data> {
            fn multiply(self, coeff: $coeff) -> Complex<$acc> {
                let c = coeff as $acc;
                Complex::new(self.re as $acc * c, self.im as $acc * c)
            }
        }
    };
}

macro_rules! complex_by_complex {
    ($data:ty, $coeff:ty, $acc:ty) => {
        impl MulAcc<Complex<$coeff>> for Complex<$data> {
            fn multiply(self, coeff: Complex<$coeff>) -> Complex<$acc> {
                let x = Complex::new(self.re as $acc, self.im as $acc);
                x * Complex::new(coeff.re as $acc, coeff.im as $acc)
            }
        }
    };
}

real_by_real!(i16, i16, i64);
real_by_real!(i32, i16, i128);
real_by_real!(i32, i32, i128);
complex_by_real!(i16, i16, i64);
complex_by_real!(i16, i32, i64);
complex_by_real!(i32, i16, i128);
complex_by_real!(i32, i32, i128);
complex_by_complex!(i16, i16, i64);
complex_by_complex!(i16, i32, i64);
complex_by_complex!(i32, i16, i128);
complex_by_complex!(i32, i32, i128);

impl MulAcc<f32> for f32 {
    fn multiply(self, coeff: f32) -> f64 {
        self as f64 * coeff as f64
    }
}

impl MulAcc<f32> for Complex<f32> {
    fn multiply(self, coeff: f32) -> Complex<f64> {
        let c = coeff as f64;
        Complex::new(self.re as f64 * c, self.im as f64 * c)
    }
}

impl MulAcc<Complex<f32>> for Complex<f32> {
    fn multiply(self, coeff: Complex<f32>) -> Complex<f64> {
        let x = Complex::new(self.re as f64, self.im as f64);
        x * Complex::new(coeff.re as f64, coeff.im as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_properties() {
        assert_eq!(NumericKind::Int16.bytes(), 2);
        assert_eq!(NumericKind::CInt16.bytes(), 4);
        assert_eq!(NumericKind::CFloat.bytes(), 8);
        assert!(NumericKind::CInt32.is_complex());
        assert!(!NumericKind::Int32.is_complex());
        assert!(NumericKind::Float.is_float());
        assert!(!NumericKind::CInt16.is_float());
    }

    #[test]
    fn test_integer_from_acc_rounds_and_saturates() {
        let y = i16::from_acc(5, 1, RoundingMode::ConvEven, SaturationMode::Asymmetric);
        assert_eq!(y, 2);

        let y = i16::from_acc(1 << 20, 0, RoundingMode::Floor, SaturationMode::Asymmetric);
        assert_eq!(y, i16::MAX);

        let y = i16::from_acc(-(1 << 20), 0, RoundingMode::Floor, SaturationMode::Symmetric);
        assert_eq!(y, -i16::MAX);
    }

    #[test]
    fn test_integer_from_acc_wraps_without_saturation() {
        let y = i16::from_acc(32768, 0, RoundingMode::Floor, SaturationMode::None);
        assert_eq!(y, i16::MIN);
    }

    #[test]
    fn test_complex_multiply() {
        let x = Complex::new(3i16, -2);
        let c = Complex::new(1i16, 4);
        // (3 - 2i)(1 + 4i) = 3 + 12i - 2i + 8 = 11 + 10i
        assert_eq!(x.multiply(c), Complex::new(11i64, 10));
        assert_eq!(x.multiply(2i16), Complex::new(6i64, -4));
    }

    #[test]
    fn test_complex_from_acc_converts_components() {
        let acc = Complex::new(7i128, -7);
        let y = Complex::<i32>::from_acc(acc, 1, RoundingMode::SymInf, SaturationMode::None);
        assert_eq!(y, Complex::new(4, -4));
    }

    #[test]
    fn test_full_scale_int32_products_fit() {
        let p = i32::MAX.multiply(i32::MAX);
        let acc = (0..4).fold(0i128, |acc, _| acc + p);
        let y = i32::from_acc(acc, 40, RoundingMode::Floor, SaturationMode::Asymmetric);
        assert_eq!(y, 16_777_215);

        // (m + mi)(m + mi) = 2m^2 i with m = i32::MIN, so im = 2^63
        let x = Complex::new(i32::MIN, i32::MIN);
        let z = x.multiply(x);
        assert_eq!(z.re, 0);
        assert_eq!(z.im, 1i128 << 63);
    }

    #[test]
    fn test_cint16_by_cint32_multiply() {
        let x = Complex::new(i16::MIN, i16::MIN);
        let z = x.multiply(Complex::new(i32::MIN, i32::MIN));
        assert_eq!(z.re, 0);
        assert_eq!(z.im, 1i64 << 47);
    }

    #[test]
    fn test_float_from_acc() {
        let y = f32::from_acc(0.25, 0, RoundingMode::ConvEven, SaturationMode::None);
        assert_eq!(y, 0.25);
        assert_eq!(1.5f32.multiply(2.0f32), 3.0f64);
    }
}
