mod common;

use approx::assert_relative_eq;
use num_complex::Complex;

use firdecim::config::{ApiMode, FilterConfig, ReloadMode};
use firdecim::filter::{FirDecimator, SsrDecimator, TargetProfile, deinterleave, interleave};
use firdecim::simulation::{noise_signal, random_taps};

fn stream_config(fir_length: usize, decimation: usize) -> FilterConfig {
    FilterConfig {
        fir_length,
        decimation,
        shift: 10,
        block_size: 256,
        api: ApiMode::Stream,
        ..FilterConfig::default()
    }
}

#[test]
fn test_ssr_matches_single_path_filter() {
    let config = stream_config(32, 2);
    let taps: Vec<i16> = random_taps(32, 2000.0, Some(31));
    let signal: Vec<i32> = noise_signal(256 * 4, 3000.0, Some(32));

    let mut single =
        FirDecimator::<i32, i16>::new(&config, &TargetProfile::default(), &taps).unwrap();
    let expected = common::run_blocks(&mut single, &signal);

    let ssr_config = FilterConfig { ssr: 2, ..config };
    let mut ssr =
        SsrDecimator::<i32, i16>::new(&ssr_config, &TargetProfile::default(), &taps).unwrap();
    assert_eq!(ssr.layout().branch_fir_length(), 16);
    let out = ssr.process_signal(&signal).unwrap();
    assert_eq!(out, expected);
}

#[test]
fn test_ssr_with_decimation_polyphases_matches_reference() {
    let taps: Vec<i16> = random_taps(32, 2000.0, Some(41));
    let signal: Vec<i32> = noise_signal(256 * 3, 3000.0, Some(42));

    // (ssr, para_deci_poly, decimation)
    for (ssr, para_deci_poly, decimation) in [(2, 2, 2), (1, 2, 4), (2, 1, 2)] {
        let config = FilterConfig {
            ssr,
            para_deci_poly,
            ..stream_config(32, decimation)
        };
        let expected = common::reference(&config, &taps, &signal);
        let mut filter =
            SsrDecimator::<i32, i16>::new(&config, &TargetProfile::default(), &taps).unwrap();
        let out = filter.process_signal(&signal).unwrap();
        assert_eq!(out, expected, "ssr {} poly {} D {}", ssr, para_deci_poly, decimation);
    }
}

#[test]
fn test_ssr_three_paths_complex_data() {
    let config = FilterConfig {
        ssr: 3,
        block_size: 192,
        ..stream_config(48, 2)
    };
    let taps: Vec<i16> = random_taps(48, 1500.0, Some(51));
    let signal: Vec<Complex<i16>> = noise_signal(192 * 3, 2000.0, Some(52));

    let expected = common::reference(&config, &taps, &signal);
    let mut filter =
        SsrDecimator::<Complex<i16>, i16>::new(&config, &TargetProfile::default(), &taps)
            .unwrap();
    assert_eq!(filter.process_signal(&signal).unwrap(), expected);
}

#[test]
fn test_ssr_sub_filters_cascade() {
    let config = FilterConfig {
        ssr: 2,
        cascade_length: 2,
        ..stream_config(64, 2)
    };
    let taps: Vec<i16> = random_taps(64, 1000.0, Some(61));
    let signal: Vec<i32> = noise_signal(256 * 3, 3000.0, Some(62));

    let mut filter =
        SsrDecimator::<i32, i16>::new(&config, &TargetProfile::default(), &taps).unwrap();
    let plan = filter.branch_plan(0, 1).unwrap();
    assert_eq!(plan.stages.len(), 2);
    assert_eq!(plan.fir_length, 32);

    let expected = common::reference(&config, &taps, &signal);
    assert_eq!(filter.process_signal(&signal).unwrap(), expected);
}

#[test]
fn test_ssr_float_matches_single_path_filter() {
    // Four input paths of 128 samples each
    let config = FilterConfig {
        shift: 0,
        block_size: 512,
        ..stream_config(32, 2)
    };
    let taps: Vec<f32> = random_taps(32, 0.2, Some(71));
    let signal: Vec<f32> = noise_signal(512 * 2, 1.0, Some(72));

    let mut single =
        FirDecimator::<f32, f32>::new(&config, &TargetProfile::default(), &taps).unwrap();
    let expected = common::run_blocks(&mut single, &signal);

    let ssr_config = FilterConfig { ssr: 4, ..config };
    let mut ssr =
        SsrDecimator::<f32, f32>::new(&ssr_config, &TargetProfile::default(), &taps).unwrap();
    let out = ssr.process_signal(&signal).unwrap();
    assert_eq!(out.len(), expected.len());
    for (y, r) in out.iter().zip(&expected) {
        assert_relative_eq!(*y, *r, epsilon = 1e-5, max_relative = 1e-4);
    }
}

#[test]
fn test_ssr_reload_reaches_every_path() {
    let config = FilterConfig {
        ssr: 2,
        reload: ReloadMode::Reloadable,
        ..stream_config(32, 2)
    };
    let old: Vec<i16> = random_taps(32, 2000.0, Some(81));
    let new: Vec<i16> = random_taps(32, 2000.0, Some(82));
    let signal: Vec<i32> = noise_signal(256 * 2, 3000.0, Some(83));

    let mut filter =
        SsrDecimator::<i32, i16>::new(&config, &TargetProfile::default(), &old).unwrap();
    let mut out = Vec::new();
    for (b, block) in signal.chunks(256).enumerate() {
        let paths = deinterleave(block, 2);
        let inputs: Vec<&[i32]> = paths.iter().map(Vec::as_slice).collect();
        let taps = (b == 1).then_some(new.as_slice());
        let outputs = filter.process_paths(&inputs, taps).unwrap();
        let primaries: Vec<Vec<i32>> = outputs.into_iter().map(|o| o.primary).collect();
        out.extend(interleave(&primaries));
    }

    let before = common::reference(&config, &old, &signal);
    let after = common::reference(&config, &new, &signal);
    assert_eq!(&out[..128], &before[..128]);
    assert_eq!(&out[128..], &after[128..]);
}
