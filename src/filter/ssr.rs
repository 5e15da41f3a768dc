//! Super-sample-rate composition of the decimating FIR
//!
//! With `S` output paths and `P` decimation polyphases, the input arrives on
//! `N = S * P` paths: path `q` carries `x[j * N + q]`. Output path `r`
//! carries `y[k * S + r]`. Output `y[k * S + r]` splits into one sum per
//! input path, and each of those is an ordinary decimate-by-`D / P` filter
//! over every `N`th tap of the full filter, run on a single input path with
//! a small stream delay. The `S * N` sub-filters are plain [`FirDecimator`]s
//! whose accumulators are added per output path and rounded once, so the
//! composition is exact for integer types.

use super::decimator::{BlockOutput, FirDecimator};
use super::plan::FilterPlan;
use super::target::TargetProfile;
use super::validate::check_parallel_paths;
use crate::config::{CoefficientPhase, FilterConfig, OutputCount, ReloadMode};
use crate::error::{ConfigError, ProcessError, Result};
use crate::numeric::{Accumulator, Coefficient, MulAcc, RoundingMode, SaturationMode};

/// Where one sub-filter sits in the composition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch {
    pub input_path: usize,
    pub output_path: usize,
    /// Residue mod `N` of the full-filter taps this branch owns
    pub tap_phase: usize,
    /// Stream delay of the branch input; negative values advance it
    pub input_delay: isize,
}

/// Path counts and sub-filter sizes of a super-sample-rate filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsrLayout {
    pub ssr: usize,
    pub para_deci_poly: usize,
    pub decimation: usize,
    pub fir_length: usize,
    pub block_size: usize,
}

impl SsrLayout {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            ssr: config.ssr,
            para_deci_poly: config.para_deci_poly,
            decimation: config.decimation,
            fir_length: config.fir_length,
            block_size: config.block_size,
        }
    }

    /// Input paths `N`
    pub fn input_paths(&self) -> usize {
        self.ssr * self.para_deci_poly
    }

    /// Decimation factor of each sub-filter
    pub fn branch_decimation(&self) -> usize {
        self.decimation / self.para_deci_poly
    }

    /// Taps of each sub-filter, padded to whole decimation groups
    pub fn branch_fir_length(&self) -> usize {
        self.fir_length
            .div_ceil(self.input_paths())
            .next_multiple_of(self.branch_decimation())
    }

    /// Samples per input path and invocation
    pub fn branch_block_size(&self) -> usize {
        self.block_size / self.input_paths()
    }

    /// Decimated samples per output path and invocation
    pub fn path_output_size(&self) -> usize {
        self.block_size / (self.decimation * self.ssr)
    }

    /// The sub-filter feeding output path `r` from input path `q`.
    ///
    /// Output `k` of path `r` needs input `n = (k S + r) D - i` for tap `i`.
    /// On input path `q` these are the taps `i = t N + s` with
    /// `s = (r D - q) mod N`, reading path sample `k D' + c - t` where
    /// `c = (r D - q - s) / N`.
    pub fn branch(&self, q: usize, r: usize) -> Branch {
        let n = self.input_paths() as isize;
        let lead = (r * self.decimation) as isize - q as isize;
        let tap_phase = lead.rem_euclid(n);
        Branch {
            input_path: q,
            output_path: r,
            tap_phase: tap_phase as usize,
            input_delay: -((lead - tap_phase) / n),
        }
    }

    /// Configuration of one sub-filter, derived from the full `config`.
    pub fn branch_config(&self, config: &FilterConfig, branch: Branch) -> FilterConfig {
        let paths = self.input_paths();
        FilterConfig {
            fir_length: self.branch_fir_length(),
            decimation: self.branch_decimation(),
            block_size: self.branch_block_size(),
            outputs: 1,
            fir_range_lens: None,
            coefficient_phase: CoefficientPhase {
                phase: paths - 1 - branch.tap_phase,
                phase_offset: 0,
                phases: paths,
                phases_len: Some(self.fir_length),
            },
            input_delay: branch.input_delay,
            ssr: 1,
            para_deci_poly: 1,
            ..config.clone()
        }
    }
}

/// Split a full-rate block into `paths` interleaved paths.
pub fn deinterleave<T: Copy>(block: &[T], paths: usize) -> Vec<Vec<T>> {
    (0..paths)
        .map(|q| block.iter().skip(q).step_by(paths).copied().collect())
        .collect()
}

/// Merge equally long paths back into one full-rate sequence.
pub fn interleave<T: Copy>(paths: &[Vec<T>]) -> Vec<T> {
    let len = paths.first().map_or(0, Vec::len);
    (0..len)
        .flat_map(|k| paths.iter().map(move |path| path[k]))
        .collect()
}

/// Decimating FIR split over parallel input and output paths
///
/// Holds `S * N` sub-filters, each a complete cascade. Every invocation
/// takes one block per input path and returns one block per output path;
/// [`process`](Self::process) does the interleaving for callers holding a
/// full-rate stream.
pub struct SsrDecimator<T: MulAcc<C>, C: Coefficient> {
    layout: SsrLayout,
    reload: ReloadMode,
    shift: u32,
    rounding: RoundingMode,
    saturation: SaturationMode,
    outputs: OutputCount,
    /// `branches[r][q]` feeds output path `r` from input path `q`
    branches: Vec<Vec<FirDecimator<T, C>>>,
}

impl<T: MulAcc<C>, C: Coefficient> SsrDecimator<T, C> {
    pub fn new(config: &FilterConfig, target: &TargetProfile, taps: &[C]) -> Result<Self> {
        check_parallel_paths(config, T::KIND)?;
        if taps.len() != config.fir_length {
            return Err(ConfigError::TapCountMismatch {
                expected: config.fir_length,
                actual: taps.len(),
            });
        }
        let layout = SsrLayout::new(config);
        let paths = layout.input_paths();

        let branches = (0..layout.ssr)
            .map(|r| {
                (0..paths)
                    .map(|q| {
                        let branch = layout.branch(q, r);
                        let sub = layout.branch_config(config, branch);
                        log::trace!(
                            "Branch {}->{}: tap phase {}, input delay {}",
                            q,
                            r,
                            branch.tap_phase,
                            branch.input_delay
                        );
                        FirDecimator::new(&sub, target, taps)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Split {}-tap decimate-by-{} filter over {} input and {} output path(s): {} sub-filters of {} taps",
            layout.fir_length,
            layout.decimation,
            paths,
            layout.ssr,
            layout.ssr * paths,
            layout.branch_fir_length()
        );

        Ok(Self {
            layout,
            reload: config.reload,
            shift: config.shift,
            rounding: RoundingMode::from_code(config.rounding)
                .ok_or(ConfigError::UnsupportedRoundingMode(config.rounding))?,
            saturation: SaturationMode::from_code(config.saturation)
                .ok_or(ConfigError::UnsupportedSaturationMode(config.saturation))?,
            outputs: OutputCount::from_count(config.outputs)
                .ok_or(ConfigError::UnsupportedOutputCount(config.outputs))?,
            branches,
        })
    }

    pub fn layout(&self) -> &SsrLayout {
        &self.layout
    }

    /// Resolved plan of the sub-filter from input path `q` to output path `r`
    pub fn branch_plan(&self, q: usize, r: usize) -> Option<&FilterPlan> {
        self.branches.get(r)?.get(q).map(FirDecimator::plan)
    }

    /// Filter one block on every input path, optionally offering new taps.
    ///
    /// Returns one block per output path. New taps reach every sub-filter in
    /// the same invocation.
    pub fn process_paths(
        &mut self,
        inputs: &[&[T]],
        taps: Option<&[C]>,
    ) -> std::result::Result<Vec<BlockOutput<T>>, ProcessError> {
        let paths = self.layout.input_paths();
        if inputs.len() != paths {
            return Err(ProcessError::PathCount {
                expected: paths,
                actual: inputs.len(),
            });
        }
        let expected = self.layout.branch_block_size();
        if let Some(bad) = inputs.iter().find(|input| input.len() != expected) {
            return Err(ProcessError::BlockLength {
                expected,
                actual: bad.len(),
            });
        }
        if taps.is_some() && self.reload == ReloadMode::Static {
            return Err(ProcessError::TapsWithoutReload);
        }
        if let Some(taps) = taps
            && taps.len() != self.layout.fir_length
        {
            return Err(ProcessError::Reload(ConfigError::TapCountMismatch {
                expected: self.layout.fir_length,
                actual: taps.len(),
            }));
        }

        let size = self.layout.path_output_size();
        let mut outputs = Vec::with_capacity(self.layout.ssr);
        for row in &mut self.branches {
            let mut acc = vec![T::Acc::zero(); size];
            for (branch, input) in row.iter_mut().zip(inputs) {
                let partial = branch.accumulate_block(input, taps)?;
                for (total, part) in acc.iter_mut().zip(partial) {
                    *total += part;
                }
            }
            let primary: Vec<T> = acc
                .iter()
                .map(|&a| T::from_acc(a, self.shift, self.rounding, self.saturation))
                .collect();
            outputs.push(BlockOutput {
                secondary: (self.outputs == OutputCount::Dual).then(|| primary.clone()),
                primary,
            });
        }
        Ok(outputs)
    }

    /// Filter one full-rate block: deinterleave onto the input paths, filter
    /// and interleave the output paths.
    pub fn process(&mut self, block: &[T]) -> std::result::Result<Vec<T>, ProcessError> {
        if block.len() != self.layout.block_size {
            return Err(ProcessError::BlockLength {
                expected: self.layout.block_size,
                actual: block.len(),
            });
        }
        let paths = deinterleave(block, self.layout.input_paths());
        let inputs: Vec<&[T]> = paths.iter().map(Vec::as_slice).collect();
        let outputs = self.process_paths(&inputs, None)?;
        let primaries: Vec<Vec<T>> = outputs.into_iter().map(|out| out.primary).collect();
        Ok(interleave(&primaries))
    }

    /// Filter a whole full-rate signal; the last block is padded with empty
    /// samples and outputs past the signal are dropped.
    pub fn process_signal(&mut self, signal: &[T]) -> std::result::Result<Vec<T>, ProcessError> {
        let block_size = self.layout.block_size;
        let mut output = Vec::with_capacity(signal.len() / self.layout.decimation + 1);
        for chunk in signal.chunks(block_size) {
            if chunk.len() == block_size {
                output.extend(self.process(chunk)?);
            } else {
                let mut padded = chunk.to_vec();
                padded.resize(block_size, T::empty());
                output.extend(self.process(&padded)?);
            }
        }
        output.truncate(signal.len().div_ceil(self.layout.decimation));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiMode;

    fn ssr_config(ssr: usize, para_deci_poly: usize, decimation: usize) -> FilterConfig {
        FilterConfig {
            fir_length: 32,
            decimation,
            ssr,
            para_deci_poly,
            api: ApiMode::Stream,
            ..FilterConfig::default()
        }
    }

    #[test]
    fn test_branch_phases_and_delays() {
        let layout = SsrLayout::new(&ssr_config(2, 1, 2));
        assert_eq!(layout.input_paths(), 2);
        assert_eq!(layout.branch_fir_length(), 16);
        // r D - q = 2 - 1 = 1 for q = 1, r = 1: phase 1, no shift
        assert_eq!(layout.branch(1, 1).tap_phase, 1);
        assert_eq!(layout.branch(1, 1).input_delay, 0);
        // r D - q = 2 - 0: even taps, one sample of advance
        assert_eq!(layout.branch(0, 1).tap_phase, 0);
        assert_eq!(layout.branch(0, 1).input_delay, -1);
        // r D - q = -1: odd taps, delayed by one
        assert_eq!(layout.branch(1, 0).tap_phase, 1);
        assert_eq!(layout.branch(1, 0).input_delay, 1);
    }

    #[test]
    fn test_every_tap_is_owned_once_per_output_path() {
        let layout = SsrLayout::new(&ssr_config(3, 2, 4));
        let paths = layout.input_paths();
        for r in 0..layout.ssr {
            let mut phases: Vec<usize> = (0..paths).map(|q| layout.branch(q, r).tap_phase).collect();
            phases.sort_unstable();
            assert_eq!(phases, (0..paths).collect::<Vec<_>>());
            for q in 0..paths {
                let delay = layout.branch(q, r).input_delay;
                assert!(
                    (1 - layout.branch_decimation() as isize..=1).contains(&delay),
                    "delay {} for {}->{}",
                    delay,
                    q,
                    r
                );
            }
        }
    }

    #[test]
    fn test_branch_config_extracts_phase() {
        let config = ssr_config(2, 2, 2);
        let layout = SsrLayout::new(&config);
        let sub = layout.branch_config(&config, layout.branch(3, 0));
        assert_eq!(sub.decimation, 1);
        assert_eq!(sub.fir_length, 8);
        assert_eq!(sub.block_size, 64);
        assert_eq!(sub.coefficient_phase.phases, 4);
        assert_eq!(sub.coefficient_phase.phases_len, Some(32));
        assert_eq!((sub.ssr, sub.para_deci_poly), (1, 1));
    }

    #[test]
    fn test_interleave_round_trip() {
        let block: Vec<i32> = (0..12).collect();
        let paths = deinterleave(&block, 3);
        assert_eq!(paths[1], vec![1, 4, 7, 10]);
        assert_eq!(interleave(&paths), block);
    }

    #[test]
    fn test_path_count_is_checked() {
        let taps: Vec<i16> = (1..=32).collect();
        let mut filter =
            SsrDecimator::<i32, i16>::new(&ssr_config(2, 1, 2), &TargetProfile::default(), &taps)
                .unwrap();
        let path = vec![0; 128];
        assert_eq!(
            filter.process_paths(&[path.as_slice()], None),
            Err(ProcessError::PathCount {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            filter.process(&[0; 100]),
            Err(ProcessError::BlockLength {
                expected: 256,
                actual: 100
            })
        );
    }

    #[test]
    fn test_window_api_is_rejected() {
        let config = FilterConfig {
            api: ApiMode::Window,
            ..ssr_config(2, 1, 2)
        };
        let taps: Vec<i16> = (1..=32).collect();
        assert!(matches!(
            SsrDecimator::<i32, i16>::new(&config, &TargetProfile::default(), &taps),
            Err(ConfigError::UnsupportedParallelPaths { ssr: 2, .. })
        ));
    }
}
