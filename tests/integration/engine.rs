//! Engine lifecycle integration tests
//!
//! Construction, configuration validation and the status counters the
//! audio thread publishes.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use mosaic::prelude::*;
use mosaic::{AllocationStrategy, MAX_OUTPUTS};

#[test]
fn test_engine_reports_configuration() {
    let engine = Engine::builder()
        .sample_rate(44100.0)
        .max_voices(12)
        .stealing(AllocationStrategy::Quietest)
        .build()
        .unwrap();

    assert_eq!(engine.sample_rate(), 44100.0);
    assert_eq!(engine.config().max_voices, 12);
    assert_eq!(engine.voices().capacity(), 12);
    assert!(!engine.is_running());
}

#[test]
fn test_invalid_config_converts_to_umbrella_error() {
    fn build() -> mosaic::Result<Engine> {
        Ok(Engine::builder().sample_rate(1000.0).build()?)
    }
    let err = build().unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    assert!(err.to_string().contains("sample_rate"));
}

#[test]
fn test_empty_engine_renders_silence_on_every_output() {
    let mut engine = test_engine();
    for _ in 0..4 {
        let outputs = engine.process_audio();
        for output in outputs.iter().take(MAX_OUTPUTS) {
            assert_is_silent(&output[0], 0.0, "left");
            assert_is_silent(&output[1], 0.0, "right");
        }
    }
    assert_eq!(engine.tail_samples(), 0);
}

#[test]
fn test_status_tracks_blocks_voices_and_peak() {
    let mut engine = test_engine();
    let id = dc_sample(&engine, 0.5);
    engine.add_zone(0, 0, instant_zone(id)).unwrap();

    engine.note_on(0, 60, -1, 1.0, 0.0);
    engine.note_on(0, 62, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 3);

    let status = engine.status().snapshot();
    assert_eq!(status.blocks_processed, 3);
    assert_eq!(status.active_voices, 2);
    assert!((status.peak - 1.0).abs() < DSP_EPSILON, "peak {}", status.peak);

    engine.all_notes_off();
    render_blocks(&mut engine, 0, 2);
    assert_eq!(engine.status().active_voices(), 0);
}

#[test]
fn test_missing_sample_file_is_an_error() {
    let engine = test_engine();
    let result = engine.load_sample("/definitely/not/here.wav");
    assert!(result.is_err());
    assert!(engine.samples().is_empty());
}

#[test]
fn test_zone_with_unknown_sample_is_not_added() {
    let mut engine = test_engine();
    let spec = ZoneSpec {
        data: instant_data(),
        sample: SampleRef::Id(SampleId(u64::MAX)),
    };
    assert!(engine.add_zone(0, 0, spec).is_err());
    assert_eq!(engine.patch().group(0, 0).unwrap().zones.len(), 0);
    assert_eq!(engine.note_on(0, 60, -1, 1.0, 0.0), 0);
}

#[test]
fn test_panic_silences_within_one_block() {
    let mut engine = test_engine();
    let id = dc_sample(&engine, 0.5);
    engine.add_zone(0, 0, instant_zone(id)).unwrap();
    for key in 60..64 {
        engine.note_on(0, key, -1, 1.0, 0.0);
    }
    render_blocks(&mut engine, 0, 2);

    engine.panic();
    // One block of fade-out, then nothing
    render_blocks(&mut engine, 0, 1);
    let (left, right) = render_blocks(&mut engine, 0, 2);
    assert_is_silent(&left, SILENCE_THRESHOLD, "left after panic");
    assert_is_silent(&right, SILENCE_THRESHOLD, "right after panic");
    assert_eq!(engine.active_voices(), 0);
}
