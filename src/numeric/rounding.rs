use std::fmt;
use std::str::FromStr;

/// Rounding applied when an accumulator is shifted down to output precision
///
/// Codes follow the hardware numbering, so a code read from a configuration
/// file selects the same behavior the reference model uses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Truncate toward negative infinity
    Floor,
    /// Round up to the next representable value
    Ceil,
    /// Round half toward positive infinity
    PosInf,
    /// Round half toward negative infinity
    NegInf,
    /// Round half away from zero
    SymInf,
    /// Round half toward zero
    SymZero,
    /// Round half to even
    #[default]
    ConvEven,
    /// Round half to odd
    ConvOdd,
}

impl RoundingMode {
    pub const ALL: [RoundingMode; 8] = [
        RoundingMode::Floor,
        RoundingMode::Ceil,
        RoundingMode::PosInf,
        RoundingMode::NegInf,
        RoundingMode::SymInf,
        RoundingMode::SymZero,
        RoundingMode::ConvEven,
        RoundingMode::ConvOdd,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    fn name(self) -> &'static str {
        match self {
            RoundingMode::Floor => "floor",
            RoundingMode::Ceil => "ceil",
            RoundingMode::PosInf => "pos_inf",
            RoundingMode::NegInf => "neg_inf",
            RoundingMode::SymInf => "sym_inf",
            RoundingMode::SymZero => "sym_zero",
            RoundingMode::ConvEven => "conv_even",
            RoundingMode::ConvOdd => "conv_odd",
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    /// Accepts either the numeric code or the mode name (`conv_even`, `conv-even`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| format!("invalid rounding code: {}", s));
        }
        let normalized = s.to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.name() == normalized)
            .ok_or_else(|| format!("invalid rounding mode: {}", s))
    }
}

/// Saturation applied after rounding
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SaturationMode {
    /// Keep the low bits (two's complement wrap)
    #[default]
    None,
    /// Clamp to `[MIN, MAX]`
    Asymmetric,
    /// Clamp to `[MIN + 1, MAX]`
    Symmetric,
}

impl SaturationMode {
    /// Code 2 is reserved by the hardware and has no mode.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SaturationMode::None),
            1 => Some(SaturationMode::Asymmetric),
            3 => Some(SaturationMode::Symmetric),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SaturationMode::None => 0,
            SaturationMode::Asymmetric => 1,
            SaturationMode::Symmetric => 3,
        }
    }
}

impl fmt::Display for SaturationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SaturationMode::None => "none",
            SaturationMode::Asymmetric => "asymmetric",
            SaturationMode::Symmetric => "symmetric",
        };
        f.write_str(name)
    }
}

/// Shift `acc` right by `shift` bits, rounding per `mode`.
pub fn round_shift(acc: i128, shift: u32, mode: RoundingMode) -> i128 {
    if shift == 0 {
        return acc;
    }
    let half_minus_one = (1i128 << (shift - 1)) - 1;
    let negative = acc < 0;
    let lsb_even = (acc >> shift) & 1 == 0;

    let bias = match mode {
        RoundingMode::Floor => 0,
        RoundingMode::Ceil => (1i128 << shift) - 1,
        RoundingMode::PosInf => half_minus_one + 1,
        RoundingMode::NegInf => half_minus_one,
        RoundingMode::SymInf if negative => half_minus_one,
        RoundingMode::SymInf => half_minus_one + 1,
        RoundingMode::SymZero if negative => half_minus_one + 1,
        RoundingMode::SymZero => half_minus_one,
        RoundingMode::ConvEven if lsb_even => half_minus_one,
        RoundingMode::ConvEven => half_minus_one + 1,
        RoundingMode::ConvOdd if lsb_even => half_minus_one + 1,
        RoundingMode::ConvOdd => half_minus_one,
    };
    (acc + bias) >> shift
}

/// Clamp `value` into `[min, max]` according to `mode`.
///
/// `SaturationMode::None` returns the value untouched; the narrowing cast that
/// follows performs the wrap.
pub fn saturate(value: i128, min: i128, max: i128, mode: SaturationMode) -> i128 {
    match mode {
        SaturationMode::None => value,
        SaturationMode::Asymmetric => value.clamp(min, max),
        SaturationMode::Symmetric => value.clamp(min + 1, max),
    }
}
