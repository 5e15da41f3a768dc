use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Sample types the filter can read from and write to WAV files
pub trait PcmSample: Copy {
    const FORMAT: SampleFormat;
    const BITS: u16;

    /// Convert from full-scale float.
    fn from_f32(value: f32) -> Self;

    fn write<W: std::io::Write + std::io::Seek>(
        self,
        writer: &mut WavWriter<W>,
    ) -> Result<(), hound::Error>;
}

impl PcmSample for f32 {
    const FORMAT: SampleFormat = SampleFormat::Float;
    const BITS: u16 = 32;

    fn from_f32(value: f32) -> Self {
        value
    }

    fn write<W: std::io::Write + std::io::Seek>(
        self,
        writer: &mut WavWriter<W>,
    ) -> Result<(), hound::Error> {
        writer.write_sample(self)
    }
}

impl PcmSample for i16 {
    const FORMAT: SampleFormat = SampleFormat::Int;
    const BITS: u16 = 16;

    fn from_f32(value: f32) -> Self {
        (value * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }

    fn write<W: std::io::Write + std::io::Seek>(
        self,
        writer: &mut WavWriter<W>,
    ) -> Result<(), hound::Error> {
        writer.write_sample(self)
    }
}

impl PcmSample for i32 {
    const FORMAT: SampleFormat = SampleFormat::Int;
    const BITS: u16 = 32;

    fn from_f32(value: f32) -> Self {
        (value as f64 * 2_147_483_648.0)
            .round()
            .clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }

    fn write<W: std::io::Write + std::io::Seek>(
        self,
        writer: &mut WavWriter<W>,
    ) -> Result<(), hound::Error> {
        writer.write_sample(self)
    }
}

/// Read a mono WAV file as full-scale floats, returning samples and rate.
pub fn read_wav_mono<P: AsRef<Path>>(path: P) -> anyhow::Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    if spec.channels != 1 {
        anyhow::bail!("Expected mono WAV file, got {} channels", spec.channels);
    }

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = 2_i32.pow(spec.bits_per_sample as u32 - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok((samples, spec.sample_rate))
}

pub fn save_wav<P: AsRef<Path>, T: PcmSample>(
    path: P,
    samples: &[T],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: T::BITS,
        sample_format: T::FORMAT,
    };

    let mut writer = WavWriter::create(path, spec)?;

    for &sample in samples {
        sample.write(&mut writer)?;
    }

    writer.finalize()?;
    Ok(())
}
