use crate::numeric::NumericKind;

/// Capabilities of the vector machine a filter is planned for
///
/// The engine runs on the host, but architecture selection, block-size rules
/// and lane addressing limits all follow from these numbers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TargetProfile {
    pub name: String,
    /// Lanes can be gathered at arbitrary strided offsets
    pub permute_support: bool,
    /// Size of one data register in bytes
    pub register_bytes: usize,
    /// Size of one data load in bytes
    pub load_bytes: usize,
    /// Data registers available to a streaming phase-parallel stage
    pub vector_registers: usize,
    /// Override of the per-lane offset addressing range, in samples
    pub max_offset_range: Option<usize>,
}

impl TargetProfile {
    /// A target with strided lane permutes (the default)
    pub fn permuting() -> Self {
        Self {
            name: "permuting".to_string(),
            permute_support: true,
            register_bytes: 128,
            load_bytes: 32,
            vector_registers: 4,
            max_offset_range: None,
        }
    }

    /// A target without lane permutes; decimation is done by phase splitting
    pub fn non_permuting() -> Self {
        Self {
            name: "non-permuting".to_string(),
            permute_support: false,
            ..Self::permuting()
        }
    }

    /// Largest lane offset the addressing scheme can express
    pub fn offset_range(&self, data: NumericKind) -> usize {
        self.max_offset_range.unwrap_or(match data {
            NumericKind::CFloat => 8,
            _ => 16,
        })
    }

    pub fn samples_in_register(&self, data: NumericKind) -> usize {
        self.register_bytes / data.bytes()
    }

    pub fn samples_per_load(&self, data: NumericKind) -> usize {
        self.load_bytes / data.bytes()
    }

    /// Loads needed to fill one data register
    pub fn loads_in_register(&self) -> usize {
        self.register_bytes / self.load_bytes
    }

    /// Coefficients fetched by one load
    pub fn coefficients_per_load(&self, coeff: NumericKind) -> usize {
        (self.load_bytes / coeff.bytes()).max(1)
    }
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self::permuting()
    }
}

/// Output lanes computed per vector for a data/coefficient pair
pub fn lanes(data: NumericKind, coeff: NumericKind) -> Option<usize> {
    use NumericKind::*;
    match (data, coeff) {
        (Int16, Int16) | (Int32, Int16) | (Float, Float) => Some(8),
        (CInt16, Int16)
        | (CInt16, CInt16)
        | (CInt16, Int32)
        | (CInt16, CInt32)
        | (Int32, Int32)
        | (CInt32, Int16)
        | (CInt32, CInt16)
        | (CInt32, Int32)
        | (CFloat, Float)
        | (CFloat, CFloat) => Some(4),
        (CInt32, CInt32) => Some(2),
        _ => None,
    }
}

/// Taps consumed per lane by one multiply-accumulate instruction
pub fn columns(data: NumericKind, coeff: NumericKind) -> Option<usize> {
    use NumericKind::*;
    match (data, coeff) {
        (Int16, Int16) | (CInt16, Int16) => Some(4),
        (Float, Float) | (CFloat, Float) | (CFloat, CFloat) => Some(1),
        _ => lanes(data, coeff).map(|_| 2),
    }
}
