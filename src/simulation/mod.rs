mod reference;
mod signal;

pub use reference::{reference_decimate, reference_decimate_f64};
pub use signal::{Synthesize, impulse, noise_signal, random_taps, tone};
