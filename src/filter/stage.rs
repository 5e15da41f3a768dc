//! One cascade stage and its per-architecture strategies
//!
//! Sample addressing throughout: for output lane `l` of a vector whose lane-0
//! anchor is `base`, tap `i` of the stage weights the sample at
//! `base + l * D + (R - 1 - i)`. Lane 0's oldest sample sits at `base`.

use std::ops::Range;
use std::sync::Arc;

use super::arch::{Architecture, StreamPrologue};
use super::offsets::{DecimateOffsets, decimate_offsets};
use super::plan::{FilterPlan, StagePlan};
use super::reload::{ChangeDetector, ReloadOutcome, ReloadState, ReloadTrigger, TapBank};
use super::taps::{InternalTapSet, TapSetManager};
use super::window::{SampleWindow, StreamBuffer};
use crate::config::{OutputCount, ReloadMode};
use crate::error::{ConfigError, Result};
use crate::numeric::{Accumulator, Coefficient, MulAcc, RoundingMode, Sample, SaturationMode};

/// What one stage hands on after computing an output vector
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput<T: Sample> {
    /// Accumulators for the next stage
    Partial(Vec<T::Acc>),
    /// Final samples; `secondary` is present for dual-output filters
    Samples {
        primary: Vec<T>,
        secondary: Option<Vec<T>>,
    },
}

/// Fixed geometry shared by all strategies of a stage
#[derive(Debug, Clone)]
struct Geometry {
    fir_length: usize,
    decimation: usize,
    lanes: usize,
    offset: usize,
    range: usize,
    input_delay: isize,
    offsets: Arc<DecimateOffsets>,
}

impl Geometry {
    /// Samples one output vector spans
    fn span(&self) -> usize {
        (self.lanes - 1) * self.decimation + self.range
    }

    /// Samples between consecutive output vectors
    fn stride(&self) -> usize {
        self.lanes * self.decimation
    }

    /// Window position of lane 0's oldest sample in vector `v`
    fn window_base(&self, v: usize) -> usize {
        v * self.stride() + (self.fir_length - self.offset - self.range)
    }
}

/// Multiply-accumulate one column group at a time against strided data.
fn mac_strided<T, C>(
    acc: &mut [T::Acc],
    data: &[T],
    base: usize,
    taps: &[C],
    range: usize,
    offsets: &DecimateOffsets,
    lanes: Range<usize>,
) where
    T: MulAcc<C>,
    C: Coefficient,
{
    let cols = offsets.columns();
    for (group, coeffs) in taps.chunks(cols).enumerate() {
        // Anchor one past the newest sample the group touches
        let top = base + range - group * cols;
        for lane in lanes.clone() {
            for (col, &coeff) in coeffs.iter().rev().enumerate() {
                let tap = group * cols + coeffs.len() - 1 - col;
                if tap >= range {
                    continue;
                }
                let index = top + offsets.offset(lane, col) - coeffs.len();
                acc[lane] += data[index].multiply(coeff);
            }
        }
    }
}

/// Execution strategy of one stage architecture
trait StageStrategy<T: MulAcc<C>, C: Coefficient>: Send {
    /// Accept the input of the next invocation.
    fn load(&mut self, block: &[T]);

    /// Add this stage's contribution to output vector `v` of the invocation.
    fn accumulate(&mut self, v: usize, taps: &InternalTapSet<C>, acc: &mut [T::Acc]);
}

struct BasicStrategy<T> {
    geometry: Geometry,
    window: SampleWindow<T>,
    register: Vec<T>,
}

impl<T: MulAcc<C>, C: Coefficient> StageStrategy<T, C> for BasicStrategy<T> {
    fn load(&mut self, block: &[T]) {
        self.window.load(block);
    }

    fn accumulate(&mut self, v: usize, taps: &InternalTapSet<C>, acc: &mut [T::Acc]) {
        let g = &self.geometry;
        let start = g.window_base(v);
        self.register.clear();
        self.register
            .extend_from_slice(&self.window.as_slice()[start..start + g.span()]);
        mac_strided(acc, &self.register, 0, taps.single(), g.range, &g.offsets, 0..g.lanes);
    }
}

struct IncrementalStrobeStrategy<T> {
    geometry: Geometry,
    repeat: usize,
    window: SampleWindow<T>,
    register: Vec<T>,
}

impl<T: MulAcc<C>, C: Coefficient> StageStrategy<T, C> for IncrementalStrobeStrategy<T> {
    fn load(&mut self, block: &[T]) {
        self.window.load(block);
    }

    fn accumulate(&mut self, v: usize, taps: &InternalTapSet<C>, acc: &mut [T::Acc]) {
        let g = &self.geometry;
        if v.is_multiple_of(self.repeat) {
            let start = g.window_base(v);
            let len = (self.repeat - 1) * g.stride() + g.span();
            log::trace!("Strobe refill at vector {}: {} samples", v, len);
            self.register.clear();
            self.register
                .extend_from_slice(&self.window.as_slice()[start..start + len]);
        }
        let base = (v % self.repeat) * g.stride();
        mac_strided(acc, &self.register, base, taps.single(), g.range, &g.offsets, 0..g.lanes);
    }
}

/// Stream FIFO shared by both stream strategies
struct StreamCursor<T> {
    buffer: StreamBuffer<T>,
    prologue: StreamPrologue,
    vector: usize,
}

impl<T: Sample> StreamCursor<T> {
    fn new(g: &Geometry, prologue: StreamPrologue, load_size: usize) -> Self {
        Self {
            // Empty samples reaching back to the oldest tap of output 0
            buffer: StreamBuffer::new(
                (g.offset + g.range - 1).saturating_add_signed(g.input_delay),
                load_size,
            ),
            prologue,
            vector: 0,
        }
    }

    /// Make the next vector resident; returns its buffer-relative base and
    /// the lanes that see any real data.
    fn next_vector(&mut self, g: &Geometry) -> (usize, Range<usize>) {
        let anchor = self.vector * g.stride();
        if !self.buffer.ensure(anchor + g.span()) {
            // Block sizes are whole multiples of the vector stride, so a
            // stage is never asked for a vector past its loaded input.
            log::error!(
                "Stream stage ran out of input at vector {}; lanes left empty",
                self.vector
            );
            return (0, 0..0);
        }

        let first_live = if self.vector < self.prologue.null_accs {
            let done = self.vector * g.lanes;
            self.prologue.empty_init_lanes.saturating_sub(done).min(g.lanes)
        } else {
            0
        };
        (anchor - self.buffer.origin(), first_live..g.lanes)
    }

    fn finish_vector(&mut self, g: &Geometry) {
        self.vector += 1;
        self.buffer.discard_before(self.vector * g.stride());
    }
}

struct StreamStrategy<T> {
    geometry: Geometry,
    cursor: StreamCursor<T>,
}

impl<T: MulAcc<C>, C: Coefficient> StageStrategy<T, C> for StreamStrategy<T> {
    fn load(&mut self, block: &[T]) {
        self.cursor.buffer.push(block);
    }

    fn accumulate(&mut self, _v: usize, taps: &InternalTapSet<C>, acc: &mut [T::Acc]) {
        let g = &self.geometry;
        let (base, live) = self.cursor.next_vector(g);
        let data = self.cursor.buffer.as_slice();
        mac_strided(acc, data, base, taps.single(), g.range, &g.offsets, live);
        self.cursor.finish_vector(g);
    }
}

/// Sum the per-phase accumulators into `acc`.
fn fold_phases<A: Accumulator>(acc: &mut [A], phase_acc: &[Vec<A>]) {
    for phase in phase_acc {
        for (total, &partial) in acc.iter_mut().zip(phase) {
            *total += partial;
        }
    }
}

fn reset_phases<A: Accumulator>(phase_acc: &mut [Vec<A>]) {
    for phase in phase_acc.iter_mut() {
        phase.fill(A::zero());
    }
}

struct PhaseParallelStrategy<T: Sample> {
    geometry: Geometry,
    window: SampleWindow<T>,
    /// `phases[p][m]` is window sample `m * D + p`
    phases: Vec<Vec<T>>,
    phase_acc: Vec<Vec<T::Acc>>,
}

impl<T: MulAcc<C>, C: Coefficient> StageStrategy<T, C> for PhaseParallelStrategy<T> {
    fn load(&mut self, block: &[T]) {
        self.window.load(block);
        let d = self.geometry.decimation;
        let samples = self.window.as_slice();
        for (p, phase) in self.phases.iter_mut().enumerate() {
            phase.clear();
            phase.extend(samples.iter().skip(p).step_by(d).copied());
        }
    }

    fn accumulate(&mut self, v: usize, taps: &InternalTapSet<C>, acc: &mut [T::Acc]) {
        let g = &self.geometry;
        let d = g.decimation;
        let phase_taps = g.range / d;
        let lead = (g.fir_length - g.offset) / d;
        reset_phases(&mut self.phase_acc);

        for (p, (data, phase_acc)) in self.phases.iter().zip(&mut self.phase_acc).enumerate() {
            let Some(coeffs) = taps.phase(p) else {
                continue;
            };
            for (lane, total) in phase_acc.iter_mut().enumerate() {
                // Phase sample of tap k is (j - k - 1) + lead for output j
                let newest = v * g.lanes + lane + lead - 1;
                for (k, &coeff) in coeffs.iter().take(phase_taps).enumerate() {
                    *total += data[newest - k].multiply(coeff);
                }
            }
        }
        fold_phases(acc, &self.phase_acc);
    }
}

struct StreamPhaseParallelStrategy<T: Sample> {
    geometry: Geometry,
    cursor: StreamCursor<T>,
    phase_acc: Vec<Vec<T::Acc>>,
}

impl<T: MulAcc<C>, C: Coefficient> StageStrategy<T, C> for StreamPhaseParallelStrategy<T> {
    fn load(&mut self, block: &[T]) {
        self.cursor.buffer.push(block);
    }

    fn accumulate(&mut self, _v: usize, taps: &InternalTapSet<C>, acc: &mut [T::Acc]) {
        let g = &self.geometry;
        let d = g.decimation;
        let phase_taps = g.range / d;
        let (base, live) = self.cursor.next_vector(g);
        let data = self.cursor.buffer.as_slice();
        reset_phases(&mut self.phase_acc);

        for (p, phase_acc) in self.phase_acc.iter_mut().enumerate() {
            let Some(coeffs) = taps.phase(p) else {
                continue;
            };
            for lane in live.clone() {
                // Tap k of phase p is internal tap k * D + D - 1 - p
                let newest = base + lane * d + g.range - d + p;
                for (k, &coeff) in coeffs.iter().take(phase_taps).enumerate() {
                    phase_acc[lane] += data[newest - k * d].multiply(coeff);
                }
            }
        }
        fold_phases(acc, &self.phase_acc);
        self.cursor.finish_vector(g);
    }
}

/// One stage of a decimating cascade
///
/// Owns its sub-range of taps, its input buffering and the strategy selected
/// for it. The stage is agnostic of how partials travel between stages; the
/// drivers in [`decimator`](super::decimator) and
/// [`pipeline`](super::pipeline) move them.
pub struct CascadeStage<T: MulAcc<C>, C: Coefficient> {
    plan: StagePlan,
    shift: u32,
    rounding: RoundingMode,
    saturation: SaturationMode,
    outputs: OutputCount,
    manager: TapSetManager,
    bank: TapBank<C>,
    detector: Option<ChangeDetector<C>>,
    strategy: Box<dyn StageStrategy<T, C>>,
    vectors_per_block: usize,
    cursor: usize,
}

impl<T: MulAcc<C>, C: Coefficient> CascadeStage<T, C> {
    /// Build stage `stage` of `plan` with the caller's full tap array.
    pub fn new(plan: &FilterPlan, stage: &StagePlan, taps: &[C]) -> Result<Self> {
        let manager = plan.tap_manager(stage);
        let bank = TapBank::new(manager.reload(taps)?);
        let detector = (plan.reload == ReloadMode::Reloadable && stage.position.is_head())
            .then(|| ChangeDetector::new(taps));

        let geometry = Geometry {
            fir_length: plan.fir_length,
            decimation: plan.decimation,
            lanes: stage.lanes,
            offset: stage.offset,
            range: stage.range,
            input_delay: plan.input_delay,
            offsets: decimate_offsets(
                plan.decimation,
                stage.lanes,
                stage.columns,
                plan.target.offset_range(plan.data),
            ),
        };
        let strategy = build_strategy::<T, C>(plan, stage, geometry);

        Ok(Self {
            plan: stage.clone(),
            shift: plan.shift,
            rounding: plan.rounding,
            saturation: plan.saturation,
            outputs: plan.outputs,
            manager,
            bank,
            detector,
            strategy,
            vectors_per_block: plan.vectors_per_block(),
            cursor: 0,
        })
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    pub fn vectors_per_block(&self) -> usize {
        self.vectors_per_block
    }

    pub fn active_taps(&self) -> &InternalTapSet<C> {
        self.bank.active()
    }

    pub fn reload_state(&self) -> ReloadState {
        self.bank.state()
    }

    /// Accept the (already merged) input block of the next invocation.
    pub fn load_block(&mut self, block: &[T]) {
        self.strategy.load(block);
        self.cursor = 0;
    }

    /// Head-stage side of the reload protocol: compare `taps` with the last
    /// applied set, apply any change locally and return the trigger to send
    /// down the cascade.
    pub fn initiate_reload(&mut self, taps: Option<&[C]>) -> Result<ReloadTrigger<C>> {
        let Some(taps) = taps else {
            return Ok(ReloadTrigger::unchanged());
        };
        let expected = self.manager.expected_len();
        if taps.len() != expected {
            return Err(ConfigError::TapCountMismatch {
                expected,
                actual: taps.len(),
            });
        }
        let changed = match self.detector.as_mut() {
            Some(detector) => detector.compare(taps),
            None => Some(Arc::from(taps)),
        };
        let trigger = ReloadTrigger { taps: changed };
        self.follow_reload(&trigger)?;
        Ok(trigger)
    }

    /// Downstream side of the reload protocol.
    pub fn follow_reload(&mut self, trigger: &ReloadTrigger<C>) -> Result<ReloadOutcome> {
        let outcome = self.bank.apply(&self.manager, trigger)?;
        if outcome == ReloadOutcome::Applied {
            log::debug!("Stage {} applied new coefficients", self.plan.index);
        }
        Ok(outcome)
    }

    /// Add this stage's taps to the next output vector of the current
    /// invocation, without rounding even on the tail stage.
    ///
    /// `incoming` is the partial from the previous stage; head stages pass
    /// `None` and start from zero.
    pub fn accumulate_vector(&mut self, incoming: Option<&[T::Acc]>) -> Vec<T::Acc> {
        let lanes = self.plan.lanes;
        let mut acc = match incoming {
            Some(partial) => partial.to_vec(),
            None => vec![T::Acc::zero(); lanes],
        };
        debug_assert!(self.cursor < self.vectors_per_block);
        self.strategy
            .accumulate(self.cursor, self.bank.active(), &mut acc);
        self.cursor += 1;
        acc
    }

    /// Compute the next output vector of the current invocation.
    pub fn compute_vector(&mut self, incoming: Option<&[T::Acc]>) -> StageOutput<T> {
        let acc = self.accumulate_vector(incoming);
        if !self.plan.position.is_tail() {
            return StageOutput::Partial(acc);
        }
        let convert = |acc: &[T::Acc]| -> Vec<T> {
            acc.iter()
                .map(|&a| T::from_acc(a, self.shift, self.rounding, self.saturation))
                .collect()
        };
        StageOutput::Samples {
            primary: convert(&acc),
            secondary: (self.outputs == OutputCount::Dual).then(|| convert(&acc)),
        }
    }
}

fn build_strategy<T: MulAcc<C>, C: Coefficient>(
    plan: &FilterPlan,
    stage: &StagePlan,
    geometry: Geometry,
) -> Box<dyn StageStrategy<T, C>> {
    let margin = plan.fir_length - 1;
    let load_size = plan.target.samples_per_load(plan.data);
    let phase_acc = || vec![vec![T::Acc::zero(); stage.lanes]; plan.decimation];
    let prologue = || {
        stage
            .prologue
            .unwrap_or_else(|| StreamPrologue::new(stage.offset, plan.decimation, stage.lanes))
    };

    match stage.architecture {
        Architecture::Basic => Box::new(BasicStrategy {
            register: Vec::with_capacity(geometry.span()),
            geometry,
            window: SampleWindow::new(margin),
        }),
        Architecture::IncrementalStrobe => {
            let repeat = stage.strobe_repeat.unwrap_or(1);
            Box::new(IncrementalStrobeStrategy {
                register: Vec::with_capacity((repeat - 1) * geometry.stride() + geometry.span()),
                geometry,
                repeat,
                window: SampleWindow::new(margin),
            })
        }
        Architecture::Stream => Box::new(StreamStrategy {
            cursor: StreamCursor::new(&geometry, prologue(), load_size),
            geometry,
        }),
        Architecture::PhaseParallel => Box::new(PhaseParallelStrategy {
            geometry,
            window: SampleWindow::new(margin),
            phases: vec![Vec::new(); plan.decimation],
            phase_acc: phase_acc(),
        }),
        Architecture::StreamPhaseParallel => Box::new(StreamPhaseParallelStrategy {
            cursor: StreamCursor::new(&geometry, prologue(), load_size),
            geometry,
            phase_acc: phase_acc(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiMode, FilterConfig};
    use crate::filter::target::TargetProfile;
    use crate::numeric::NumericKind;

    fn resolve(config: &FilterConfig, target: &TargetProfile) -> FilterPlan {
        FilterPlan::resolve(config, NumericKind::Int32, NumericKind::Int16, target).unwrap()
    }

    fn impulse(len: usize) -> Vec<i32> {
        let mut x = vec![0; len];
        x[0] = 1;
        x
    }

    fn run_single_stage(config: &FilterConfig, target: &TargetProfile, taps: &[i16]) -> Vec<i32> {
        let plan = resolve(config, target);
        let mut stage = CascadeStage::<i32, i16>::new(&plan, &plan.stages[0], taps).unwrap();
        stage.load_block(&impulse(config.block_size));
        let mut out = Vec::new();
        for _ in 0..stage.vectors_per_block() {
            match stage.compute_vector(None) {
                StageOutput::Samples { primary, .. } => out.extend(primary),
                StageOutput::Partial(_) => panic!("single stage must emit samples"),
            }
        }
        out
    }

    #[test]
    fn test_impulse_response_every_architecture() {
        let taps: Vec<i16> = (1..=16).collect();
        let cases = [
            (ApiMode::Window, TargetProfile::permuting()),
            (ApiMode::Stream, TargetProfile::permuting()),
            (ApiMode::Window, TargetProfile::non_permuting()),
            (ApiMode::Stream, TargetProfile::non_permuting()),
        ];
        for (api, target) in cases {
            let config = FilterConfig {
                fir_length: 16,
                decimation: 2,
                api,
                ..FilterConfig::default()
            };
            let out = run_single_stage(&config, &target, &taps);
            assert_eq!(out.len(), 128);
            assert_eq!(&out[..8], &[16, 14, 12, 10, 8, 6, 4, 2], "{:?}", api);
            assert!(out[8..].iter().all(|&y| y == 0));
        }
    }

    #[test]
    fn test_incremental_strobe_matches_basic() {
        let taps: Vec<i16> = (1..=8).collect();
        let strobe = FilterConfig {
            fir_length: 8,
            ..FilterConfig::default()
        };
        let plan = resolve(&strobe, &TargetProfile::permuting());
        assert_eq!(plan.stages[0].architecture, Architecture::IncrementalStrobe);

        let out = run_single_stage(&strobe, &TargetProfile::permuting(), &taps);
        assert_eq!(&out[..4], &[8, 6, 4, 2]);
        assert!(out[4..].iter().all(|&y| y == 0));
    }

    #[test]
    fn test_middle_stage_forwards_partials() {
        let config = FilterConfig {
            fir_length: 16,
            cascade_length: 2,
            ..FilterConfig::default()
        };
        let plan = resolve(&config, &TargetProfile::permuting());
        let taps: Vec<i16> = (1..=16).collect();
        let mut first = CascadeStage::<i32, i16>::new(&plan, &plan.stages[0], &taps).unwrap();
        first.load_block(&impulse(256));
        match first.compute_vector(None) {
            StageOutput::Partial(acc) => assert_eq!(acc, vec![16, 14, 12, 10, 0, 0, 0, 0]),
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_vector_past_input_is_empty() {
        let config = FilterConfig {
            fir_length: 16,
            api: ApiMode::Stream,
            ..FilterConfig::default()
        };
        let plan = resolve(&config, &TargetProfile::permuting());
        let taps: Vec<i16> = (1..=16).collect();
        let mut stage = CascadeStage::<i32, i16>::new(&plan, &plan.stages[0], &taps).unwrap();
        stage.load_block(&vec![1; 256]);
        for _ in 0..stage.vectors_per_block() {
            stage.compute_vector(None);
        }
        // An invocation that delivers no samples
        stage.load_block(&[]);
        match stage.compute_vector(None) {
            StageOutput::Samples { primary, .. } => assert_eq!(primary, vec![0; 8]),
            other => panic!("expected samples, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_input_delay_shifts_outputs() {
        let taps: Vec<i16> = (1..=16).collect();
        let run = |input_delay| {
            let config = FilterConfig {
                fir_length: 16,
                api: ApiMode::Stream,
                input_delay,
                ..FilterConfig::default()
            };
            run_single_stage(&config, &TargetProfile::permuting(), &taps)
        };
        // Delayed by one, the impulse misses output 0; advanced by one, output
        // 0 already reaches it through its second-newest tap.
        assert_eq!(&run(0)[..3], &[16, 14, 12]);
        assert_eq!(&run(1)[..3], &[0, 15, 13]);
        assert_eq!(&run(-1)[..3], &[15, 13, 11]);
        assert_eq!(&run(1)[8..10], &[1, 0]);
        assert_eq!(&run(-1)[7..9], &[1, 0]);
    }

    #[test]
    fn test_dual_output_copies() {
        let config = FilterConfig {
            fir_length: 16,
            outputs: 2,
            ..FilterConfig::default()
        };
        let plan = resolve(&config, &TargetProfile::permuting());
        let taps: Vec<i16> = (1..=16).collect();
        let mut stage = CascadeStage::<i32, i16>::new(&plan, &plan.stages[0], &taps).unwrap();
        stage.load_block(&impulse(256));
        match stage.compute_vector(None) {
            StageOutput::Samples { primary, secondary } => {
                assert_eq!(secondary.as_ref(), Some(&primary));
            }
            other => panic!("expected samples, got {:?}", other),
        }
    }
}
