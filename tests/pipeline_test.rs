mod common;

use firdecim::config::{ApiMode, FilterConfig, ReloadMode};
use firdecim::error::{PipelineError, ProcessError};
use firdecim::filter::{BlockInput, CascadePipeline, FirDecimator, TargetProfile};
use firdecim::simulation::{noise_signal, random_taps};

#[test]
fn test_pipeline_matches_reference_with_queued_blocks() {
    let config = FilterConfig {
        fir_length: 48,
        decimation: 2,
        cascade_length: 3,
        api: ApiMode::Stream,
        shift: 10,
        ..FilterConfig::default()
    };
    let taps: Vec<i16> = random_taps(48, 2000.0, Some(41));
    let signal: Vec<i32> = noise_signal(256 * 6, 3000.0, Some(42));
    let pipeline = CascadePipeline::<i32, i16>::spawn(&config, &TargetProfile::default(), &taps).unwrap();

    // Queue several invocations before collecting any output
    for block in signal.chunks(256).take(4) {
        pipeline.submit(BlockInput::Single(block), None).unwrap();
    }
    let mut out = Vec::new();
    for _ in 0..4 {
        out.extend(pipeline.recv().unwrap().primary);
    }
    for block in signal.chunks(256).skip(4) {
        out.extend(pipeline.process(BlockInput::Single(block), None).unwrap().primary);
    }
    pipeline.shutdown().unwrap();

    assert_eq!(out, common::reference(&config, &taps, &signal));
}

#[test]
fn test_pipeline_reload_matches_single_threaded() {
    let config = FilterConfig {
        fir_length: 32,
        decimation: 2,
        cascade_length: 4,
        reload: ReloadMode::Reloadable,
        outputs: 2,
        shift: 10,
        ..FilterConfig::default()
    };
    let target = TargetProfile::default();
    let tap_sets: Vec<Vec<i16>> = (0..3).map(|s| random_taps(32, 2000.0, Some(43 + s))).collect();
    let signal: Vec<i32> = noise_signal(256 * 6, 3000.0, Some(46));

    let pipeline = CascadePipeline::<i32, i16>::spawn(&config, &target, &tap_sets[0]).unwrap();
    let mut filter = FirDecimator::<i32, i16>::new(&config, &target, &tap_sets[0]).unwrap();

    for (n, block) in signal.chunks(256).enumerate() {
        // Change taps every other block, repeat them in between
        let taps = tap_sets[(n / 2) % tap_sets.len()].as_slice();
        let expected = filter
            .process_block(BlockInput::Single(block), Some(taps))
            .unwrap();
        let got = pipeline
            .process(BlockInput::Single(block), Some(taps))
            .unwrap();
        assert_eq!(got, expected, "block {}", n);
        assert_eq!(got.secondary.as_ref(), Some(&got.primary));
    }
    pipeline.shutdown().unwrap();
}

#[test]
fn test_pipeline_rejects_bad_calls_without_stalling() {
    let config = FilterConfig {
        fir_length: 16,
        cascade_length: 2,
        reload: ReloadMode::Reloadable,
        ..FilterConfig::default()
    };
    let taps: Vec<i16> = random_taps(16, 2000.0, Some(47));
    let pipeline = CascadePipeline::<i32, i16>::spawn(&config, &TargetProfile::default(), &taps).unwrap();

    assert!(matches!(
        pipeline.submit(BlockInput::Single(&[0; 100]), None),
        Err(PipelineError::Process(ProcessError::BlockLength { .. }))
    ));
    assert!(matches!(
        pipeline.submit(BlockInput::Single(&[0; 256]), Some(&[1i16, 2, 3][..])),
        Err(PipelineError::Process(ProcessError::Reload(_)))
    ));

    // Still serving after the rejected calls
    let out = pipeline.process(BlockInput::Single(&[0; 256]), None).unwrap();
    assert_eq!(out.primary, vec![0; 128]);
    pipeline.shutdown().unwrap();
}
