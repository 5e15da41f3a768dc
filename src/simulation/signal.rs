use num_complex::Complex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Values that can be built from a real and imaginary part
///
/// Real types ignore `im`. Integer types round and saturate.
pub trait Synthesize: Copy {
    fn from_parts(re: f64, im: f64) -> Self;
}

macro_rules! synthesize_int {
    ($ty:ty) => {
        impl Synthesize for $ty {
            fn from_parts(re: f64, _im: f64) -> Self {
                re.round().clamp(<$ty>::MIN as f64, <$ty>::MAX as f64) as $ty
            }
        }

        impl Synthesize for Complex<$ty> {
            fn from_parts(re: f64, im: f64) -> Self {
                Complex::new(<$ty>::from_parts(re, 0.0), <$ty>::from_parts(im, 0.0))
            }
        }
    };
}

synthesize_int!(i16);
synthesize_int!(i32);

impl Synthesize for f32 {
    fn from_parts(re: f64, _im: f64) -> Self {
        re as f32
    }
}

impl Synthesize for Complex<f32> {
    fn from_parts(re: f64, im: f64) -> Self {
        Complex::new(re as f32, im as f32)
    }
}

fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

/// Gaussian noise with standard deviation `amplitude` on each component
pub fn noise_signal<T: Synthesize>(len: usize, amplitude: f64, seed: Option<u64>) -> Vec<T> {
    let mut rng = create_rng(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    (0..len)
        .map(|_| {
            let re = normal.sample(&mut rng) * amplitude;
            let im = normal.sample(&mut rng) * amplitude;
            T::from_parts(re, im)
        })
        .collect()
}

/// Random filter taps; the same generator as [`noise_signal`].
pub fn random_taps<C: Synthesize>(len: usize, amplitude: f64, seed: Option<u64>) -> Vec<C> {
    noise_signal(len, amplitude, seed)
}

/// A single sample of `amplitude` at `position`, zero elsewhere
pub fn impulse<T: Synthesize>(len: usize, position: usize, amplitude: f64) -> Vec<T> {
    (0..len)
        .map(|n| {
            if n == position {
                T::from_parts(amplitude, 0.0)
            } else {
                T::from_parts(0.0, 0.0)
            }
        })
        .collect()
}

/// Complex exponential at `frequency` cycles per sample; real types keep
/// the cosine.
pub fn tone<T: Synthesize>(len: usize, frequency: f64, amplitude: f64) -> Vec<T> {
    (0..len)
        .map(|n| {
            let phase = 2.0 * PI * frequency * n as f64;
            T::from_parts(amplitude * phase.cos(), amplitude * phase.sin())
        })
        .collect()
}
