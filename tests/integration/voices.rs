//! Voice pool integration tests
//!
//! Bounded polyphony and the stealing policy, seen from the engine API.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use mosaic::prelude::*;
use mosaic::AllocationStrategy;

const MAX_VOICES: usize = 4;

fn engine_with(strategy: AllocationStrategy, data: ZoneData) -> Engine {
    let mut engine = Engine::builder()
        .max_voices(MAX_VOICES)
        .stealing(strategy)
        .build()
        .unwrap();
    let id = dc_sample(&engine, 0.1);
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
    engine
}

#[test]
fn test_one_more_note_than_voices_steals() {
    let mut engine = engine_with(AllocationStrategy::Oldest, instant_data());
    for key in 0..=MAX_VOICES as u8 {
        assert_eq!(engine.note_on(0, 60 + key, -1, 1.0, 0.0), 1);
        render_blocks(&mut engine, 0, 1);
        assert!(engine.active_voices() <= MAX_VOICES);
    }
    assert_eq!(engine.active_voices(), MAX_VOICES);

    // The oldest key was taken; releasing it frees nothing
    engine.note_off(0, 60, -1, 0.0);
    render_blocks(&mut engine, 0, 2);
    assert_eq!(engine.active_voices(), MAX_VOICES);
}

#[test]
fn test_stolen_voice_fades_instead_of_clicking() {
    let mut engine = engine_with(AllocationStrategy::Oldest, instant_data());
    for key in 0..MAX_VOICES as u8 {
        engine.note_on(0, 60 + key, -1, 1.0, 0.0);
    }
    render_blocks(&mut engine, 0, 2);
    let full = settled_level(&mut engine, 0);

    engine.note_on(0, 72, -1, 1.0, 0.0);
    let (left, _) = render_blocks(&mut engine, 0, 1);
    // Old voice fades out under the new one: level never exceeds the
    // steady state by more than one voice
    assert!(peak(&left) <= full + 0.1 + DSP_EPSILON);
    let settled = settled_level(&mut engine, 0);
    assert!((settled - full).abs() < DSP_EPSILON);
}

#[test]
fn test_no_steal_drops_excess_notes() {
    let mut engine = engine_with(AllocationStrategy::NoSteal, instant_data());
    for key in 0..MAX_VOICES as u8 {
        assert_eq!(engine.note_on(0, 60 + key, -1, 1.0, 0.0), 1);
    }
    assert_eq!(engine.note_on(0, 80, -1, 1.0, 0.0), 0);
    assert_eq!(engine.active_voices(), MAX_VOICES);
}

#[test]
fn test_releasing_voice_is_stolen_first() {
    let mut data = instant_data();
    // Long release so the released voice lingers
    data.envelopes[0].release = 1.0;
    let mut engine = engine_with(AllocationStrategy::Oldest, data);

    for key in 0..MAX_VOICES as u8 {
        engine.note_on(0, 60 + key, -1, 1.0, 0.0);
        render_blocks(&mut engine, 0, 1);
    }
    // Release the newest; oldest-first stealing would otherwise take key 60
    engine.note_off(0, 63, -1, 0.0);
    render_blocks(&mut engine, 0, 1);
    assert_eq!(engine.voices().releasing_count(), 1);

    engine.note_on(0, 72, -1, 1.0, 0.0);
    assert_eq!(engine.voices().releasing_count(), 0);
    let keys: Vec<u8> = engine
        .voices()
        .allocator()
        .slots()
        .iter()
        .map(|slot| slot.key)
        .collect();
    assert!(keys.contains(&60));
    assert!(keys.contains(&72));
    assert!(!keys.contains(&63));
}

#[test]
fn test_layered_zones_share_the_pool() {
    let mut engine = engine_with(AllocationStrategy::Oldest, instant_data());
    let id = dc_sample(&engine, 0.1);
    engine.add_zone(0, 1, instant_zone(id)).unwrap();

    // Two zones per note: two notes fill the pool
    assert_eq!(engine.note_on(0, 60, -1, 1.0, 0.0), 2);
    assert_eq!(engine.note_on(0, 62, -1, 1.0, 0.0), 2);
    assert_eq!(engine.note_on(0, 64, -1, 1.0, 0.0), 2);
    assert_eq!(engine.active_voices(), MAX_VOICES);
    let patch = engine.patch();
    let counted: usize = (0..2)
        .map(|g| patch.group(0, g).unwrap().voice_count())
        .sum();
    assert_eq!(counted, MAX_VOICES);
}

#[test]
fn test_note_id_release_targets_one_voice() {
    let mut engine = engine_with(AllocationStrategy::Oldest, instant_data());
    engine.note_on(0, 60, 1, 1.0, 0.0);
    engine.note_on(0, 60, 2, 1.0, 0.0);
    render_blocks(&mut engine, 0, 1);

    engine.note_off(0, 60, 2, 0.0);
    render_blocks(&mut engine, 0, 2);
    assert_eq!(engine.active_voices(), 1);
}

#[test]
fn test_sustain_pedal_holds_released_keys() {
    let mut engine = engine_with(AllocationStrategy::Oldest, instant_data());
    engine.sustain_pedal(0, true);
    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 1);
    engine.note_off(0, 60, -1, 0.0);
    render_blocks(&mut engine, 0, 2);
    assert_eq!(engine.active_voices(), 1);

    engine.sustain_pedal(0, false);
    render_blocks(&mut engine, 0, 2);
    assert_eq!(engine.active_voices(), 0);
}
