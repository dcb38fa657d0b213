//! Zone selection and sample playback through the full engine
//!
//! Staircase samples (each frame equals its index) make the playback
//! position visible in the rendered output.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use mosaic::prelude::*;
use mosaic::BLOCK_SIZE;

/// Staircase scale; keeps a 256-frame ramp under 1.0.
const STEP: f32 = 1.0 / 256.0;

fn add_staircase(engine: &mut Engine, frames: usize, data: ZoneData) {
    let id = staircase_sample(engine, frames, STEP);
    engine
        .add_zone(
            0,
            0,
            ZoneSpec {
                data,
                sample: SampleRef::Id(id),
            },
        )
        .unwrap();
}

#[test]
fn test_root_key_plays_frames_verbatim() {
    let mut engine = test_engine();
    add_staircase(&mut engine, 256, instant_data());

    engine.note_on(0, 60, -1, 1.0, 0.0);
    let (left, right) = render_blocks(&mut engine, 0, 4);

    // The first sub-block carries the envelope's attack ramp
    for i in BLOCK_SIZE..left.len() {
        let expected = i as f32 * STEP;
        assert!((left[i] - expected).abs() < DSP_EPSILON, "frame {i}: {}", left[i]);
    }
    assert_eq!(left, right);
}

#[test]
fn test_octave_up_reads_twice_as_fast() {
    let mut engine = test_engine();
    add_staircase(&mut engine, 256, instant_data());

    engine.note_on(0, 72, -1, 1.0, 0.0);
    let (left, _) = render_blocks(&mut engine, 0, 3);
    for i in BLOCK_SIZE..left.len() {
        let expected = 2.0 * i as f32 * STEP;
        assert!(
            (left[i] - expected).abs() < PERCEPTUAL_EPSILON,
            "frame {i}: {} vs {expected}",
            left[i]
        );
    }
}

#[test]
fn test_zone_selection_by_key_and_velocity() {
    let mut engine = test_engine();
    let soft = dc_sample(&engine, 0.25);
    let loud = dc_sample(&engine, 0.5);
    let high = dc_sample(&engine, 0.125);

    let zone = |sample, keys: MidiRange, velocities: MidiRange| ZoneSpec {
        data: ZoneData {
            keys,
            velocities,
            velocity_tracking: 0.0,
            ..instant_data()
        },
        sample: SampleRef::Id(sample),
    };
    engine
        .add_zone(0, 0, zone(soft, MidiRange::new(0, 63), MidiRange::new(0, 63)))
        .unwrap();
    engine
        .add_zone(0, 0, zone(loud, MidiRange::new(0, 63), MidiRange::new(64, 127)))
        .unwrap();
    engine
        .add_zone(0, 1, zone(high, MidiRange::new(64, 127), MidiRange::FULL))
        .unwrap();

    let level = |engine: &mut Engine, key: u8, velocity: f32| {
        assert_eq!(engine.note_on(0, key, -1, velocity, 0.0), 1);
        render_blocks(engine, 0, 1);
        let level = settled_level(engine, 0);
        engine.panic();
        render_blocks(engine, 0, 2);
        level
    };

    assert!((level(&mut engine, 40, 0.3) - 0.25).abs() < DSP_EPSILON);
    assert!((level(&mut engine, 40, 0.9) - 0.5).abs() < DSP_EPSILON);
    assert!((level(&mut engine, 80, 0.1) - 0.125).abs() < DSP_EPSILON);
    assert_eq!(engine.patch().group(0, 1).unwrap().voice_count(), 0);
}

#[test]
fn test_key_crossfade_scales_level() {
    let mut engine = test_engine();
    let id = dc_sample(&engine, 1.0);
    engine
        .add_zone(
            0,
            0,
            ZoneSpec {
                data: ZoneData {
                    keys: MidiRange::new(60, 72).with_fades(3, 0),
                    ..instant_data()
                },
                sample: SampleRef::Id(id),
            },
        )
        .unwrap();

    // First key of a 3-key fade sits at a quarter
    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 1);
    assert!((settled_level(&mut engine, 0) - 0.25).abs() < DSP_EPSILON);

    engine.panic();
    render_blocks(&mut engine, 0, 2);
    engine.note_on(0, 63, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 1);
    assert!((settled_level(&mut engine, 0) - 1.0).abs() < DSP_EPSILON);
}

#[test]
fn test_one_shot_ignores_note_off_and_retires_at_sample_end() {
    let mut engine = test_engine();
    add_staircase(
        &mut engine,
        160,
        ZoneData {
            play_mode: PlayMode::OneShot,
            ..instant_data()
        },
    );

    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 1);
    engine.note_off(0, 60, -1, 0.0);
    render_blocks(&mut engine, 0, 2);
    assert_eq!(engine.active_voices(), 1, "note-off must not end a one-shot");

    // 160 frames is five blocks
    render_blocks(&mut engine, 0, 4);
    assert_eq!(engine.active_voices(), 0);
    let (left, _) = render_blocks(&mut engine, 0, 1);
    assert_is_silent(&left, FLOAT_EPSILON, "after one-shot");
}

#[test]
fn test_gated_voice_without_loop_ends_with_sample() {
    let mut engine = test_engine();
    add_staircase(&mut engine, 64, instant_data());

    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 4);
    assert_eq!(engine.active_voices(), 0, "key still held, sample ran out");
}

#[test]
fn test_forward_loop_wraps_exactly() {
    let mut engine = test_engine();
    add_staircase(
        &mut engine,
        64,
        ZoneData {
            region: SampleRegion {
                loop_mode: LoopMode::Forward,
                loop_start: 32,
                loop_end: 64,
                ..SampleRegion::default()
            },
            ..instant_data()
        },
    );

    engine.note_on(0, 60, -1, 1.0, 0.0);
    let (left, _) = render_blocks(&mut engine, 0, 8);
    assert_eq!(engine.active_voices(), 1);
    for i in 2 * BLOCK_SIZE..left.len() {
        let frame = 32 + (i - 32) % 32;
        let expected = frame as f32 * STEP;
        assert!((left[i] - expected).abs() < DSP_EPSILON, "frame {i}: {}", left[i]);
    }

    engine.note_off(0, 60, -1, 0.0);
    render_blocks(&mut engine, 0, 2);
    assert_eq!(engine.active_voices(), 0);
}

#[test]
fn test_until_release_loop_plays_out_after_note_off() {
    let mut engine = test_engine();
    let mut data = ZoneData {
        region: SampleRegion {
            loop_mode: LoopMode::UntilRelease,
            loop_start: 64,
            loop_end: 128,
            ..SampleRegion::default()
        },
        ..instant_data()
    };
    // One-second release keeps the voice alive past the sample end
    data.envelopes[0].release = 0.0;
    add_staircase(&mut engine, 256, data);

    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 12);
    assert_eq!(engine.active_voices(), 1, "held loop outlives the sample length");

    engine.note_off(0, 60, -1, 0.0);
    let (left, _) = render_blocks(&mut engine, 0, 2);
    assert_not_silent(&left, 0.1, "release keeps playing");

    // At most 256 - 64 frames remain after leaving the loop
    render_blocks(&mut engine, 0, 6);
    assert_eq!(engine.active_voices(), 0);
}

#[test]
fn test_transposed_part_shifts_pitch() {
    let mut engine = test_engine();
    add_staircase(&mut engine, 256, instant_data());
    engine
        .set_part(
            0,
            PartSettings {
                transpose: 12,
                ..PartSettings::default()
            },
        )
        .unwrap();

    engine.note_on(0, 60, -1, 1.0, 0.0);
    let (left, _) = render_blocks(&mut engine, 0, 2);
    let i = BLOCK_SIZE + 8;
    assert!((left[i] - 2.0 * i as f32 * STEP).abs() < PERCEPTUAL_EPSILON);
}
