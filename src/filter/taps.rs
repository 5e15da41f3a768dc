use crate::config::CoefficientPhase;
use crate::error::{ConfigError, Result};
use crate::numeric::Coefficient;

/// Coefficients of one stage in execution order
///
/// `single()` holds the stage's range reversed (index `i` weights the sample
/// `i` positions in the past), padded with null coefficients to a whole
/// number of column groups. Phase-parallel stages additionally carry one
/// sub-filter per decimation phase.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalTapSet<C> {
    range: usize,
    single: Vec<C>,
    phases: Option<Vec<Vec<C>>>,
}

impl<C: Coefficient> InternalTapSet<C> {
    /// Live (unpadded) tap count
    pub fn range(&self) -> usize {
        self.range
    }

    pub fn single(&self) -> &[C] {
        &self.single
    }

    /// Sub-filter of decimation phase `p`, if this set was phase split
    pub fn phase(&self, p: usize) -> Option<&[C]> {
        self.phases.as_ref().and_then(|phases| phases.get(p)).map(Vec::as_slice)
    }

    pub fn phase_count(&self) -> usize {
        self.phases.as_ref().map_or(0, Vec::len)
    }
}

/// Builds a stage's internal tap set from the caller's coefficient array
///
/// The transform is a pure function of the supplied taps and the static
/// stage geometry, so reloading identical taps reproduces the active set
/// exactly.
#[derive(Debug, Clone)]
pub struct TapSetManager {
    fir_length: usize,
    decimation: usize,
    offset: usize,
    range: usize,
    columns: usize,
    phase_split: bool,
    phase_pad: usize,
    coefficient_phase: CoefficientPhase,
}

impl TapSetManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fir_length: usize,
        decimation: usize,
        offset: usize,
        range: usize,
        columns: usize,
        phase_split: bool,
        phase_pad: usize,
        coefficient_phase: CoefficientPhase,
    ) -> Self {
        Self {
            fir_length,
            decimation,
            offset,
            range,
            columns: columns.max(1),
            phase_split,
            phase_pad: phase_pad.max(1),
            coefficient_phase,
        }
    }

    /// Number of coefficients callers must supply
    pub fn expected_len(&self) -> usize {
        self.coefficient_phase.supplied_len(self.fir_length)
    }

    /// Transform `taps` into this stage's internal layout.
    pub fn reload<C: Coefficient>(&self, taps: &[C]) -> Result<InternalTapSet<C>> {
        let expected = self.expected_len();
        if taps.len() != expected {
            return Err(ConfigError::TapCountMismatch {
                expected,
                actual: taps.len(),
            });
        }

        let mut single: Vec<C> = (0..self.range)
            .map(|i| self.source_index(i).map_or(C::null(), |k| taps[k]))
            .collect();
        let padded = self.range.next_multiple_of(self.columns);
        single.resize(padded, C::null());

        let phases = self.phase_split.then(|| self.split_phases(&single));

        Ok(InternalTapSet {
            range: self.range,
            single,
            phases,
        })
    }

    /// Index into the caller's array of internal tap `i`; `None` once the
    /// phase runs off the start of the array
    fn source_index(&self, i: usize) -> Option<usize> {
        let CoefficientPhase {
            phase,
            phase_offset,
            phases,
            ..
        } = self.coefficient_phase;
        let back = phases * (self.offset + i) + (phases - 1 - phase) + phase_offset;
        self.expected_len().checked_sub(back + 1)
    }

    fn split_phases<C: Coefficient>(&self, single: &[C]) -> Vec<Vec<C>> {
        let d = self.decimation;
        let per_phase = self.range.div_ceil(d).next_multiple_of(self.phase_pad);
        (0..d)
            .map(|p| {
                (0..per_phase)
                    .map(|k| {
                        let tap = k * d + d - 1 - p;
                        if tap < self.range {
                            single[tap]
                        } else {
                            C::null()
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(offset: usize, range: usize, phase_split: bool) -> TapSetManager {
        TapSetManager::new(16, 4, offset, range, 2, phase_split, 1, CoefficientPhase::default())
    }

    fn ramp(n: usize) -> Vec<i16> {
        (1..=n as i16).collect()
    }

    #[test]
    fn test_single_stage_reverses_taps() {
        let set = manager(0, 16, false).reload(&ramp(16)).unwrap();
        let expected: Vec<i16> = (1..=16).rev().collect();
        assert_eq!(set.single(), expected.as_slice());
        assert_eq!(set.phase_count(), 0);
    }

    #[test]
    fn test_cascade_offset_selects_sub_range() {
        // Stage covering internal taps 8..16 holds taps[7], taps[6], ...
        let set = manager(8, 8, false).reload(&ramp(16)).unwrap();
        assert_eq!(set.single(), &[8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_padding_to_columns() {
        let m = TapSetManager::new(12, 3, 0, 3, 2, false, 1, CoefficientPhase::default());
        let set = m.reload(&ramp(12)).unwrap();
        assert_eq!(set.range(), 3);
        assert_eq!(set.single(), &[12, 11, 10, 0]);
    }

    #[test]
    fn test_phase_split() {
        let set = manager(0, 16, true).reload(&ramp(16)).unwrap();
        assert_eq!(set.phase_count(), 4);
        // phase p, tap k = internal[k*4 + 3 - p]; internal = 16..=1
        assert_eq!(set.phase(0).unwrap(), &[13, 9, 5, 1]);
        assert_eq!(set.phase(3).unwrap(), &[16, 12, 8, 4]);
    }

    #[test]
    fn test_phase_split_pads_to_load_size() {
        let m = TapSetManager::new(16, 4, 0, 16, 2, true, 8, CoefficientPhase::default());
        let set = m.reload(&ramp(16)).unwrap();
        assert_eq!(set.phase(0).unwrap(), &[13, 9, 5, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_reload_is_idempotent() {
        let m = manager(4, 8, true);
        let taps = ramp(16);
        assert_eq!(m.reload(&taps).unwrap(), m.reload(&taps).unwrap());
    }

    #[test]
    fn test_coefficient_phase_extraction() {
        let phase = CoefficientPhase {
            phase: 1,
            phase_offset: 0,
            phases: 2,
            phases_len: None,
        };
        let m = TapSetManager::new(4, 2, 0, 4, 2, false, 1, phase);
        // 8 interleaved taps; phase 1 takes indices 7, 5, 3, 1
        let set = m.reload(&ramp(8)).unwrap();
        assert_eq!(set.single(), &[8, 6, 4, 2]);

        let phase = CoefficientPhase { phase: 0, ..phase };
        let m = TapSetManager::new(4, 2, 0, 4, 2, false, 1, phase);
        let set = m.reload(&ramp(8)).unwrap();
        assert_eq!(set.single(), &[7, 5, 3, 1]);
    }

    #[test]
    fn test_short_phase_reads_null_taps() {
        let phase = CoefficientPhase {
            phase: 0,
            phase_offset: 0,
            phases: 3,
            phases_len: Some(10),
        };
        let m = TapSetManager::new(4, 1, 0, 4, 1, false, 1, phase);
        // Phase 0 of three takes indices 7, 4, 1 and then runs out
        let set = m.reload(&ramp(10)).unwrap();
        assert_eq!(set.single(), &[8, 5, 2, 0]);
    }

    #[test]
    fn test_wrong_tap_count_is_rejected() {
        let err = manager(0, 16, false).reload(&ramp(15)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::TapCountMismatch {
                expected: 16,
                actual: 15
            }
        );
    }
}
