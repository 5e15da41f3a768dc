use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use firdecim::config::{ApiMode, FilterConfig, RangeList, ReloadMode};
use firdecim::constants::{DEFAULT_COEFF_FRAC_BITS, DEFAULT_TRANSITION, INPUT_CHANNEL_CAPACITY};
use firdecim::design::{QuantizedCoefficient, design_lowpass, quantize};
use firdecim::filter::{BlockInput, CascadePipeline, FilterPlan, FirDecimator, TargetProfile};
use firdecim::numeric::{Coefficient, MulAcc, NumericKind, RoundingMode};
use firdecim::wav::{PcmSample, read_wav_mono, save_wav};

#[derive(Parser, Debug)]
#[command(name = "firdecim")]
#[command(about = "Decimate a mono WAV file through a cascaded polyphase FIR", long_about = None)]
struct Args {
    /// Input WAV file (mono). Without one, only the stage plan is printed
    input: Option<PathBuf>,

    /// Output WAV file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// TOML file with [filter] and [target] tables and optional taps
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Sample type the signal is filtered in
    #[arg(short = 't', long, value_enum, default_value = "float")]
    data: DataType,

    /// FIR length
    #[arg(short = 'l', long)]
    fir_length: Option<usize>,

    /// Decimation factor
    #[arg(short = 'd', long)]
    decimation: Option<usize>,

    /// Number of cascade stages
    #[arg(long)]
    cascade_length: Option<usize>,

    /// Explicit per-stage tap ranges (e.g., "16,16,8")
    #[arg(long)]
    ranges: Option<RangeList>,

    /// Input block size in samples
    #[arg(short = 'b', long)]
    block_size: Option<usize>,

    /// Window or stream API
    #[arg(long, value_enum)]
    api: Option<ApiMode>,

    /// Output right shift (integer types)
    #[arg(long)]
    shift: Option<u32>,

    /// Rounding mode
    #[arg(long)]
    rounding: Option<RoundingMode>,

    /// Model a target without lane permutes
    #[arg(long)]
    no_permute: bool,

    /// Anti-alias transition band (normalized) for designed taps
    #[arg(long, default_value_t = DEFAULT_TRANSITION)]
    transition: f64,

    /// Run each cascade stage on its own thread
    #[arg(short = 'p', long)]
    pipeline: bool,

    /// Print the resolved stage plan
    #[arg(long, value_enum)]
    plan: Option<PlanFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum DataType {
    Float,
    Int16,
    Int32,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum PlanFormat {
    Text,
    Json,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    filter: FilterConfig,
    target: TargetProfile,
    /// Caller taps in natural order; designed when absent
    taps: Option<Vec<f64>>,
}

fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

impl Args {
    fn apply_overrides(&self, file: &mut FileConfig) {
        let filter = &mut file.filter;
        if let Some(v) = self.fir_length {
            filter.fir_length = v;
        }
        if let Some(v) = self.decimation {
            filter.decimation = v;
        }
        if let Some(v) = self.cascade_length {
            filter.cascade_length = v;
        }
        if let Some(ranges) = &self.ranges {
            filter.cascade_length = ranges.0.len();
            filter.fir_range_lens = Some(ranges.0.clone());
        }
        if let Some(v) = self.block_size {
            filter.block_size = v;
        }
        if let Some(v) = self.api {
            filter.api = v;
        }
        if let Some(v) = self.shift {
            filter.shift = v;
        }
        if let Some(mode) = self.rounding {
            filter.rounding = mode.code();
        }
        if self.no_permute {
            file.target = TargetProfile::non_permuting();
        }
        if self.data == DataType::Int16 && file.target.permute_support {
            // int16 x int16 only has a phase-split kernel
            log::info!("int16 data selects the non-permuting target");
            file.target = TargetProfile {
                permute_support: false,
                ..file.target.clone()
            };
        }
        if self.data != DataType::Float && filter.shift == 0 {
            filter.shift = DEFAULT_COEFF_FRAC_BITS;
        }
        // The CLI feeds one input port and reads the first output.
        filter.dual_input = false;
        filter.reload = ReloadMode::Static;
    }

    fn kinds(&self) -> (NumericKind, NumericKind) {
        match self.data {
            DataType::Float => (NumericKind::Float, NumericKind::Float),
            DataType::Int16 => (NumericKind::Int16, NumericKind::Int16),
            DataType::Int32 => (NumericKind::Int32, NumericKind::Int16),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let mut file = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    args.apply_overrides(&mut file);

    let (data, coeff) = args.kinds();
    let plan = FilterPlan::resolve(&file.filter, data, coeff, &file.target)
        .context("Invalid filter configuration")?;

    match args.plan {
        Some(PlanFormat::Text) => print!("{}", plan),
        Some(PlanFormat::Json) => println!("{}", serde_json::to_string_pretty(&plan)?),
        None if args.input.is_none() => print!("{}", plan),
        None => {}
    }

    let Some(input) = &args.input else {
        return Ok(());
    };

    let taps = match file.taps.take() {
        Some(taps) => taps,
        None => design_lowpass(plan.fir_length, plan.decimation, args.transition)
            .context("Failed to design anti-alias taps")?,
    };

    let (samples, sample_rate) =
        read_wav_mono(input).with_context(|| format!("Failed to read {}", input.display()))?;
    log::info!(
        "Read {} samples at {} Hz from {}",
        samples.len(),
        sample_rate,
        input.display()
    );

    let output_rate = sample_rate / plan.decimation as u32;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| input.with_extension("decimated.wav"));

    let written = match args.data {
        DataType::Float => run::<f32, f32>(&args, plan, &taps, &samples, &output, output_rate)?,
        DataType::Int16 => run::<i16, i16>(&args, plan, &taps, &samples, &output, output_rate)?,
        DataType::Int32 => run::<i32, i16>(&args, plan, &taps, &samples, &output, output_rate)?,
    };

    println!(
        "Wrote {} samples at {} Hz to {}",
        written,
        output_rate,
        output.display()
    );
    Ok(())
}

fn run<T, C>(
    args: &Args,
    plan: FilterPlan,
    taps: &[f64],
    samples: &[f32],
    output: &Path,
    output_rate: u32,
) -> anyhow::Result<usize>
where
    T: MulAcc<C> + PcmSample,
    C: Coefficient + QuantizedCoefficient,
{
    let taps: Vec<C> = quantize(taps, plan.shift);
    let signal: Vec<T> = samples.iter().map(|&s| T::from_f32(s)).collect();

    let filtered = if args.pipeline {
        run_pipeline(&plan, &taps, &signal)?
    } else {
        let mut filter =
            FirDecimator::<T, C>::from_plan(plan, &taps).context("Failed to build filter")?;
        filter.process_signal(&signal)?
    };

    save_wav(output, &filtered, output_rate)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(filtered.len())
}

fn run_pipeline<T: MulAcc<C>, C: Coefficient>(
    plan: &FilterPlan,
    taps: &[C],
    signal: &[T],
) -> anyhow::Result<Vec<T>> {
    let pipeline = CascadePipeline::<T, C>::from_plan(plan.clone(), taps)
        .context("Failed to start cascade pipeline")?;

    let block_size = plan.block_size;
    let mut filtered = Vec::with_capacity(signal.len() / plan.decimation + 1);
    let mut outstanding = 0;
    for chunk in signal.chunks(block_size) {
        let mut block = chunk.to_vec();
        block.resize(block_size, T::empty());
        pipeline.submit(BlockInput::Single(block.as_slice()), None)?;
        outstanding += 1;
        if outstanding == INPUT_CHANNEL_CAPACITY {
            filtered.extend(pipeline.recv()?.primary);
            outstanding -= 1;
        }
    }
    for _ in 0..outstanding {
        filtered.extend(pipeline.recv()?.primary);
    }
    pipeline.shutdown()?;

    filtered.truncate(signal.len().div_ceil(plan.decimation));
    Ok(filtered)
}
