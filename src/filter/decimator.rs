use std::borrow::Cow;

use super::plan::FilterPlan;
use super::stage::{CascadeStage, StageOutput};
use super::target::TargetProfile;
use super::window::interleave_chunks;
use crate::config::{FilterConfig, ReloadMode};
use crate::constants::WINDOW_ACCESS_BYTES;
use crate::error::{ProcessError, Result};
use crate::numeric::{Coefficient, MulAcc, Sample};

/// Input of one invocation
#[derive(Debug, Clone, Copy)]
pub enum BlockInput<'a, T> {
    Single(&'a [T]),
    /// Two ports of half a block each, merged chunk-wise before filtering
    Dual(&'a [T], &'a [T]),
}

/// Output of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct BlockOutput<T> {
    pub primary: Vec<T>,
    /// Present for dual-output filters; always equal to `primary`
    pub secondary: Option<Vec<T>>,
}

impl<T> BlockOutput<T> {
    fn with_capacity(len: usize, dual: bool) -> Self {
        Self {
            primary: Vec::with_capacity(len),
            secondary: dual.then(|| Vec::with_capacity(len)),
        }
    }
}

/// Check the shape of `input` against `plan` and merge dual ports.
pub(crate) fn assemble_block<'a, T: Sample>(
    plan: &FilterPlan,
    input: BlockInput<'a, T>,
) -> std::result::Result<Cow<'a, [T]>, ProcessError> {
    let expected = plan.input_port_size();
    match (input, plan.dual_input) {
        (BlockInput::Single(block), false) => {
            if block.len() != expected {
                return Err(ProcessError::BlockLength {
                    expected,
                    actual: block.len(),
                });
            }
            Ok(Cow::Borrowed(block))
        }
        (BlockInput::Dual(first, second), true) => {
            if first.len() != second.len() {
                return Err(ProcessError::DualInputMismatch {
                    first: first.len(),
                    second: second.len(),
                });
            }
            if first.len() != expected {
                return Err(ProcessError::BlockLength {
                    expected,
                    actual: first.len(),
                });
            }
            let chunk = WINDOW_ACCESS_BYTES / T::KIND.bytes();
            Ok(Cow::Owned(interleave_chunks(first, second, chunk)))
        }
        (_, dual_input) => Err(ProcessError::InputKind { dual_input }),
    }
}

/// Decimating FIR filter running every cascade stage on the caller's thread
///
/// Each invocation moves one output vector at a time through the whole
/// cascade, so partial accumulations are handed from stage to stage in the
/// same order the threaded [`CascadePipeline`](super::CascadePipeline)
/// delivers them.
pub struct FirDecimator<T: MulAcc<C>, C: Coefficient> {
    plan: FilterPlan,
    stages: Vec<CascadeStage<T, C>>,
}

impl<T: MulAcc<C>, C: Coefficient> FirDecimator<T, C> {
    pub fn new(config: &FilterConfig, target: &TargetProfile, taps: &[C]) -> Result<Self> {
        let plan = FilterPlan::resolve(config, T::KIND, C::KIND, target)?;
        Self::from_plan(plan, taps)
    }

    /// Build the stages of an already resolved plan.
    pub fn from_plan(plan: FilterPlan, taps: &[C]) -> Result<Self> {
        let stages = plan
            .stages
            .iter()
            .map(|stage| CascadeStage::new(&plan, stage, taps))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { plan, stages })
    }

    pub fn plan(&self) -> &FilterPlan {
        &self.plan
    }

    pub fn stages(&self) -> &[CascadeStage<T, C>] {
        &self.stages
    }

    /// Filter one single-input block and return the primary output.
    pub fn process(&mut self, block: &[T]) -> std::result::Result<Vec<T>, ProcessError> {
        self.process_block(BlockInput::Single(block), None)
            .map(|out| out.primary)
    }

    /// Filter one block, optionally offering new taps first.
    ///
    /// New taps take effect from the first output of this invocation, in
    /// every stage at once. Supplying taps identical to the active set is a
    /// no-op.
    pub fn process_block(
        &mut self,
        input: BlockInput<'_, T>,
        taps: Option<&[C]>,
    ) -> std::result::Result<BlockOutput<T>, ProcessError> {
        self.begin_block(input, taps)?;

        let mut output = BlockOutput::with_capacity(
            self.plan.output_block_size(),
            self.plan.outputs.count() == 2,
        );
        for _ in 0..self.plan.vectors_per_block() {
            let mut partial: Option<Vec<T::Acc>> = None;
            for stage in &mut self.stages {
                match stage.compute_vector(partial.as_deref()) {
                    StageOutput::Partial(acc) => partial = Some(acc),
                    StageOutput::Samples { primary, secondary } => {
                        output.primary.extend(primary);
                        if let (Some(out), Some(samples)) = (output.secondary.as_mut(), secondary)
                        {
                            out.extend(samples);
                        }
                    }
                }
            }
        }
        Ok(output)
    }

    /// Filter one single-input block but return the final accumulators
    /// instead of rounded samples.
    ///
    /// Used where several filters' contributions are summed before a single
    /// rounding step.
    pub fn accumulate_block(
        &mut self,
        block: &[T],
        taps: Option<&[C]>,
    ) -> std::result::Result<Vec<T::Acc>, ProcessError> {
        self.begin_block(BlockInput::Single(block), taps)?;

        let mut acc = Vec::with_capacity(self.plan.output_block_size());
        for _ in 0..self.plan.vectors_per_block() {
            let mut partial: Option<Vec<T::Acc>> = None;
            for stage in &mut self.stages {
                partial = Some(stage.accumulate_vector(partial.as_deref()));
            }
            acc.extend(partial.unwrap_or_default());
        }
        Ok(acc)
    }

    /// Check the call, apply any reload and hand the block to every stage.
    fn begin_block(
        &mut self,
        input: BlockInput<'_, T>,
        taps: Option<&[C]>,
    ) -> std::result::Result<(), ProcessError> {
        if taps.is_some() && self.plan.reload == ReloadMode::Static {
            return Err(ProcessError::TapsWithoutReload);
        }
        let block = assemble_block(&self.plan, input)?;

        if self.plan.reload == ReloadMode::Reloadable
            && let Some((head, rest)) = self.stages.split_first_mut()
        {
            let trigger = head.initiate_reload(taps)?;
            for stage in rest {
                stage.follow_reload(&trigger)?;
            }
        }

        for stage in &mut self.stages {
            stage.load_block(&block);
        }
        Ok(())
    }

    /// Filter a whole single-input signal, block by block.
    ///
    /// The final partial block is padded with empty samples; outputs that
    /// fall entirely in the padding are dropped.
    pub fn process_signal(&mut self, signal: &[T]) -> std::result::Result<Vec<T>, ProcessError> {
        let block_size = self.plan.block_size;
        let mut output = Vec::with_capacity(signal.len() / self.plan.decimation + 1);
        for chunk in signal.chunks(block_size) {
            if chunk.len() == block_size {
                output.extend(self.process(chunk)?);
            } else {
                let mut padded = chunk.to_vec();
                padded.resize(block_size, T::empty());
                output.extend(self.process(&padded)?);
            }
        }
        output.truncate(signal.len().div_ceil(self.plan.decimation));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiMode;
    use crate::error::ConfigError;
    use num_complex::Complex;

    fn ramp(n: usize) -> Vec<i16> {
        (1..=n as i16).collect()
    }

    #[test]
    fn test_block_length_is_checked() {
        let mut filter =
            FirDecimator::<i32, i16>::new(&FilterConfig::default(), &TargetProfile::default(), &ramp(32))
                .unwrap();
        assert_eq!(
            filter.process(&[0; 100]),
            Err(ProcessError::BlockLength {
                expected: 256,
                actual: 100
            })
        );
        assert_eq!(
            filter.process_block(BlockInput::Dual(&[0; 128], &[0; 128]), None),
            Err(ProcessError::InputKind { dual_input: false })
        );
    }

    #[test]
    fn test_taps_require_reloadable_filter() {
        let taps = ramp(32);
        let mut filter =
            FirDecimator::<i32, i16>::new(&FilterConfig::default(), &TargetProfile::default(), &taps)
                .unwrap();
        assert_eq!(
            filter.process_block(BlockInput::Single(&[0; 256]), Some(taps.as_slice())),
            Err(ProcessError::TapsWithoutReload)
        );
    }

    #[test]
    fn test_construction_rejects_wrong_tap_count() {
        let result =
            FirDecimator::<i32, i16>::new(&FilterConfig::default(), &TargetProfile::default(), &ramp(31));
        assert!(matches!(
            result,
            Err(ConfigError::TapCountMismatch {
                expected: 32,
                actual: 31
            })
        ));
    }

    #[test]
    fn test_dual_input_interleaves_chunks() {
        let config = FilterConfig {
            fir_length: 4,
            decimation: 1,
            dual_input: true,
            api: ApiMode::Stream,
            block_size: 64,
            ..FilterConfig::default()
        };
        // Pass-through filter: the output is the merged input stream
        let taps = [Complex::new(0i16, 0), Complex::new(0, 0), Complex::new(0, 0), Complex::new(1, 0)];
        let mut filter =
            FirDecimator::<Complex<i16>, Complex<i16>>::new(&config, &TargetProfile::default(), &taps)
                .unwrap();

        let first: Vec<Complex<i16>> = (0..32).map(|i| Complex::new(i, 0)).collect();
        let second: Vec<Complex<i16>> = (100..132).map(|i| Complex::new(i, 0)).collect();
        let out = filter
            .process_block(BlockInput::Dual(first.as_slice(), second.as_slice()), None)
            .unwrap();

        // cint16 moves four samples per window access
        let re: Vec<i16> = out.primary.iter().map(|c| c.re).collect();
        assert_eq!(&re[..12], &[0, 1, 2, 3, 100, 101, 102, 103, 4, 5, 6, 7]);
        assert_eq!(out.primary.len(), 64);
    }

    #[test]
    fn test_accumulate_block_skips_rounding() {
        let config = FilterConfig {
            fir_length: 4,
            decimation: 2,
            block_size: 32,
            shift: 4,
            ..FilterConfig::default()
        };
        let taps = [0i16, 0, 0, 40];
        let mut filter =
            FirDecimator::<i32, i16>::new(&config, &TargetProfile::default(), &taps).unwrap();
        let mut block = vec![0; 32];
        block[0] = 1;
        let acc = filter.accumulate_block(&block, None).unwrap();
        assert_eq!(acc.len(), 16);
        assert_eq!(acc[0], 40);

        let mut filter =
            FirDecimator::<i32, i16>::new(&config, &TargetProfile::default(), &taps).unwrap();
        // 40 / 16 = 2.5 rounds to even
        assert_eq!(filter.process(&block).unwrap()[0], 2);
    }

    #[test]
    fn test_process_signal_pads_final_block() {
        let config = FilterConfig {
            fir_length: 4,
            decimation: 2,
            block_size: 32,
            ..FilterConfig::default()
        };
        let taps = [0.0f32, 0.0, 0.0, 1.0];
        let mut filter = FirDecimator::<f32, f32>::new(&config, &TargetProfile::default(), &taps).unwrap();
        let signal: Vec<f32> = (0..45).map(|i| i as f32).collect();
        let out = filter.process_signal(&signal).unwrap();
        assert_eq!(out.len(), 23);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[22], 44.0);
    }
}
