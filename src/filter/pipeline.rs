//! Threaded cascade driver
//!
//! Every stage runs on its own thread. Raw input blocks are broadcast to all
//! stages over bounded channels; neighbouring stages are joined by a bounded
//! cascade channel carrying one reload trigger per invocation (reloadable
//! filters only) followed by the partial accumulations of that invocation.
//! The tail stage collects a block's outputs and hands them back.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::thread;

use super::decimator::{BlockInput, BlockOutput, assemble_block};
use super::plan::FilterPlan;
use super::reload::ReloadTrigger;
use super::stage::{CascadeStage, StageOutput};
use super::target::TargetProfile;
use crate::config::{FilterConfig, ReloadMode};
use crate::constants::{CASCADE_CHANNEL_CAPACITY, INPUT_CHANNEL_CAPACITY};
use crate::error::{ConfigError, PipelineError, ProcessError, Result};
use crate::numeric::{Coefficient, MulAcc, Sample};

/// Message on the channel between neighbouring stages
#[derive(Debug, Clone)]
pub enum CascadeToken<A, C> {
    Trigger(ReloadTrigger<C>),
    Partial(Vec<A>),
}

/// One invocation as broadcast to every stage
struct Job<T, C> {
    block: Arc<[T]>,
    taps: Option<Arc<[C]>>,
}

impl<T, C> Clone for Job<T, C> {
    fn clone(&self) -> Self {
        Self {
            block: Arc::clone(&self.block),
            taps: self.taps.clone(),
        }
    }
}

type Token<T, C> = CascadeToken<<T as Sample>::Acc, C>;

/// Channel ends owned by one stage thread
struct StageLinks<T: MulAcc<C>, C: Coefficient> {
    jobs: Receiver<Job<T, C>>,
    upstream: Option<Receiver<Token<T, C>>>,
    downstream: Option<Sender<Token<T, C>>>,
    output: Option<Sender<BlockOutput<T>>>,
}

/// Decimating FIR filter with one thread per cascade stage
pub struct CascadePipeline<T: MulAcc<C>, C: Coefficient> {
    plan: FilterPlan,
    inputs: Vec<Sender<Job<T, C>>>,
    output: Receiver<BlockOutput<T>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl<T: MulAcc<C>, C: Coefficient> CascadePipeline<T, C> {
    /// Validate `config`, build every stage and start the stage threads.
    pub fn spawn(config: &FilterConfig, target: &TargetProfile, taps: &[C]) -> Result<Self> {
        let plan = FilterPlan::resolve(config, T::KIND, C::KIND, target)?;
        Self::from_plan(plan, taps)
    }

    /// Start the stage threads of an already resolved plan.
    pub fn from_plan(plan: FilterPlan, taps: &[C]) -> Result<Self> {
        let stages = plan
            .stages
            .iter()
            .map(|stage| CascadeStage::<T, C>::new(&plan, stage, taps))
            .collect::<Result<Vec<_>>>()?;

        let (output_tx, output_rx) = bounded(INPUT_CHANNEL_CAPACITY);
        let mut inputs = Vec::with_capacity(stages.len());
        let mut handles = Vec::with_capacity(stages.len());
        let mut upstream: Option<Receiver<Token<T, C>>> = None;
        let count = stages.len();

        for (index, stage) in stages.into_iter().enumerate() {
            let (job_tx, job_rx) = bounded(INPUT_CHANNEL_CAPACITY);
            inputs.push(job_tx);

            let (downstream, next_upstream) = if index + 1 < count {
                let (tx, rx) = bounded(CASCADE_CHANNEL_CAPACITY);
                (Some(tx), Some(rx))
            } else {
                (None, None)
            };
            let links = StageLinks {
                jobs: job_rx,
                upstream: upstream.take(),
                downstream,
                output: (index + 1 == count).then(|| output_tx.clone()),
            };
            upstream = next_upstream;

            let reload = plan.reload;
            let dual_output = plan.outputs.count() == 2;
            handles.push(thread::spawn(move || {
                run_stage(stage, links, reload, dual_output);
            }));
        }
        log::info!("Cascade pipeline started with {} stage thread(s)", count);

        Ok(Self {
            plan,
            inputs,
            output: output_rx,
            handles,
        })
    }

    pub fn plan(&self) -> &FilterPlan {
        &self.plan
    }

    /// Queue one invocation; blocks while the stages are saturated.
    pub fn submit(
        &self,
        input: BlockInput<'_, T>,
        taps: Option<&[C]>,
    ) -> std::result::Result<(), PipelineError> {
        if taps.is_some() && self.plan.reload == ReloadMode::Static {
            return Err(ProcessError::TapsWithoutReload.into());
        }
        if let Some(taps) = taps {
            let expected = self.plan.coefficient_phase.supplied_len(self.plan.fir_length);
            if taps.len() != expected {
                let err = ConfigError::TapCountMismatch {
                    expected,
                    actual: taps.len(),
                };
                return Err(ProcessError::Reload(err).into());
            }
        }
        let block = assemble_block(&self.plan, input)?;
        let job = Job {
            block: Arc::from(&*block),
            taps: taps.map(Arc::from),
        };
        for input in &self.inputs {
            input
                .send(job.clone())
                .map_err(|_| PipelineError::Disconnected)?;
        }
        Ok(())
    }

    /// Wait for the output of the oldest outstanding invocation.
    pub fn recv(&self) -> std::result::Result<BlockOutput<T>, PipelineError> {
        self.output.recv().map_err(|_| PipelineError::Disconnected)
    }

    /// Submit one invocation and wait for its output.
    pub fn process(
        &self,
        input: BlockInput<'_, T>,
        taps: Option<&[C]>,
    ) -> std::result::Result<BlockOutput<T>, PipelineError> {
        self.submit(input, taps)?;
        self.recv()
    }

    /// Close the input, discard undelivered outputs and join every stage.
    pub fn shutdown(mut self) -> std::result::Result<(), PipelineError> {
        self.stop()
    }

    fn stop(&mut self) -> std::result::Result<(), PipelineError> {
        self.inputs.clear();
        let mut discarded = 0;
        while self.output.recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            log::debug!("Discarded {} undelivered output block(s)", discarded);
        }

        let mut result = Ok(());
        for (index, handle) in self.handles.drain(..).enumerate() {
            if handle.join().is_err() {
                log::warn!("Cascade stage {} panicked", index);
                result = Err(PipelineError::StagePanicked(index));
            }
        }
        result
    }
}

impl<T: MulAcc<C>, C: Coefficient> Drop for CascadePipeline<T, C> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            let _ = self.stop();
        }
    }
}

fn run_stage<T: MulAcc<C>, C: Coefficient>(
    mut stage: CascadeStage<T, C>,
    links: StageLinks<T, C>,
    reload: ReloadMode,
    dual_output: bool,
) {
    let index = stage.plan().index;
    while let Ok(job) = links.jobs.recv() {
        if reload == ReloadMode::Reloadable && !sync_reload(&mut stage, &links, job.taps.as_deref())
        {
            return;
        }
        stage.load_block(&job.block);

        let mut block = BlockOutput {
            primary: Vec::new(),
            secondary: dual_output.then(Vec::new),
        };
        for _ in 0..stage.vectors_per_block() {
            let incoming = match &links.upstream {
                None => None,
                Some(upstream) => match upstream.recv() {
                    Ok(CascadeToken::Partial(acc)) => Some(acc),
                    Ok(CascadeToken::Trigger(_)) => {
                        log::warn!("Stage {} got a reload trigger mid-block", index);
                        return;
                    }
                    Err(_) => {
                        log::warn!("Stage {} lost its upstream stage", index);
                        return;
                    }
                },
            };
            match stage.compute_vector(incoming.as_deref()) {
                StageOutput::Partial(acc) => {
                    let sent = links
                        .downstream
                        .as_ref()
                        .is_some_and(|tx| tx.send(CascadeToken::Partial(acc)).is_ok());
                    if !sent {
                        log::warn!("Stage {} lost its downstream stage", index);
                        return;
                    }
                }
                StageOutput::Samples { primary, secondary } => {
                    block.primary.extend(primary);
                    if let (Some(out), Some(samples)) = (block.secondary.as_mut(), secondary) {
                        out.extend(samples);
                    }
                }
            }
        }

        if let Some(output) = &links.output
            && output.send(block).is_err()
        {
            log::debug!("Stage {} output receiver closed", index);
            return;
        }
    }
    log::debug!("Stage {} input closed", index);
}

/// Run this invocation's reload step and pass the trigger on. Returns false
/// when the cascade has come apart.
fn sync_reload<T: MulAcc<C>, C: Coefficient>(
    stage: &mut CascadeStage<T, C>,
    links: &StageLinks<T, C>,
    taps: Option<&[C]>,
) -> bool {
    let index = stage.plan().index;
    let trigger = match &links.upstream {
        None => stage.initiate_reload(taps).unwrap_or_else(|err| {
            log::warn!("Stage {} rejected new coefficients: {}", index, err);
            ReloadTrigger::unchanged()
        }),
        Some(upstream) => match upstream.recv() {
            Ok(CascadeToken::Trigger(trigger)) => {
                if let Err(err) = stage.follow_reload(&trigger) {
                    log::warn!("Stage {} rejected new coefficients: {}", index, err);
                }
                trigger
            }
            Ok(CascadeToken::Partial(_)) => {
                log::warn!("Stage {} expected a reload trigger", index);
                return false;
            }
            Err(_) => return false,
        },
    };
    match &links.downstream {
        Some(tx) => tx.send(CascadeToken::Trigger(trigger)).is_ok(),
        None => true,
    }
}
