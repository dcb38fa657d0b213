//! Bus routing integration tests
//!
//! Part busses, aux sends at each tap, dedicated outputs and effect
//! ringout, checked with DC samples so every level is exact.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use approx::assert_abs_diff_eq;
use mosaic::prelude::*;

/// Blocks long enough for bus level ramps to settle.
const SETTLE_BLOCKS: usize = 100;

/// Engine with a DC zone in part 0 (0.25) and part 1 (0.5); both parts are
/// omni, so one note sounds both.
fn two_part_engine() -> Engine {
    let mut engine = test_engine();
    let quarter = dc_sample(&engine, 0.25);
    let half = dc_sample(&engine, 0.5);
    engine.add_zone(0, 0, instant_zone(quarter)).unwrap();
    engine.add_zone(1, 0, instant_zone(half)).unwrap();
    engine
}

fn send_to(aux: usize, level: f32, tap: SendTap) -> BusSettings {
    let mut settings = BusSettings::default();
    settings.sends[aux] = SendSettings { level, tap };
    settings
}

#[test]
fn test_parts_sum_exactly_on_main() {
    let mut engine = two_part_engine();
    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 1);
    let (left, right) = render_blocks(&mut engine, 0, 2);
    for (l, r) in left.iter().zip(&right) {
        assert_abs_diff_eq!(*l, 0.75, epsilon = FLOAT_EPSILON);
        assert_abs_diff_eq!(*r, 0.75, epsilon = FLOAT_EPSILON);
    }
}

#[test]
fn test_dedicated_output_bypasses_main() {
    let mut engine = two_part_engine();
    engine
        .set_bus(
            BusAddress::Part(1),
            BusSettings {
                output: 3,
                ..BusSettings::default()
            },
        )
        .unwrap();

    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 1);
    let outputs = engine.process_audio();
    let last = outputs[0][0].len() - 1;
    assert!((outputs[0][0][last] - 0.25).abs() < FLOAT_EPSILON);
    assert!((outputs[3][0][last] - 0.5).abs() < FLOAT_EPSILON);
    assert_is_silent(&outputs[1][0], 0.0, "unused output");
}

#[test]
fn test_pre_fx_send_survives_muted_part_bus() {
    let mut engine = two_part_engine();
    let mut settings = send_to(0, 0.5, SendTap::PreFx);
    settings.mute = true;
    engine.set_bus(BusAddress::Part(0), settings).unwrap();
    // Part 1 silent so the main bus only hears the aux return
    engine
        .set_part(
            1,
            PartSettings {
                enabled: false,
                ..PartSettings::default()
            },
        )
        .unwrap();

    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, SETTLE_BLOCKS);
    let level = settled_level(&mut engine, 0);
    assert!((level - 0.125).abs() < DSP_EPSILON, "aux return {level}");
}

#[test]
fn test_post_vca_send_follows_part_level() {
    let mut engine = two_part_engine();
    let mut settings = send_to(1, 1.0, SendTap::PostVca);
    settings.mute = true;
    engine.set_bus(BusAddress::Part(0), settings).unwrap();
    engine
        .set_part(
            1,
            PartSettings {
                enabled: false,
                ..PartSettings::default()
            },
        )
        .unwrap();

    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, SETTLE_BLOCKS);
    let (left, _) = render_blocks(&mut engine, 0, 2);
    assert_is_silent(&left, SILENCE_THRESHOLD, "muted bus feeds nothing post-VCA");
}

#[test]
fn test_aux_chain_feeds_later_aux_in_same_block() {
    let mut engine = two_part_engine();
    engine
        .set_part(
            1,
            PartSettings {
                enabled: false,
                ..PartSettings::default()
            },
        )
        .unwrap();
    let mut part = send_to(0, 1.0, SendTap::PreFx);
    part.mute = true;
    engine.set_bus(BusAddress::Part(0), part).unwrap();

    // aux 0 -> aux 2 only; aux 2 -> output 5
    let mut aux0 = send_to(2, 1.0, SendTap::PreFx);
    aux0.mute = true;
    engine.set_bus(BusAddress::Aux(0), aux0).unwrap();
    engine
        .set_bus(
            BusAddress::Aux(2),
            BusSettings {
                output: 5,
                ..BusSettings::default()
            },
        )
        .unwrap();

    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, SETTLE_BLOCKS);
    let outputs = engine.process_audio();
    let last = outputs[5][0].len() - 1;
    assert!((outputs[5][0][last] - 0.25).abs() < DSP_EPSILON);
    assert!(outputs[0][0][last].abs() < SILENCE_THRESHOLD);
}

#[test]
fn test_backward_aux_send_is_rejected() {
    let mut engine = test_engine();
    let result = engine.set_bus(BusAddress::Aux(2), send_to(1, 1.0, SendTap::PostVca));
    assert!(result.is_err());
    let result = engine.set_bus(BusAddress::Main, send_to(0, 1.0, SendTap::PostVca));
    assert!(result.is_err());
}

#[test]
fn test_delay_rings_out_after_voices_end() {
    let mut engine = two_part_engine();
    engine
        .set_bus_effect(
            BusAddress::Main,
            0,
            Some(BusEffectSpec::Delay {
                time_ms: 5.0,
                feedback: 0.5,
                mix: 0.5,
            }),
        )
        .unwrap();

    let render = OfflineRenderer::new(&mut engine)
        .note(0, 64, 60, 1.0)
        .render(64)
        .unwrap();

    // Voices are gone after a few blocks; the echoes are not
    let echo_start = 8 * mosaic::BLOCK_SIZE;
    assert!(render.length_samples > echo_start);
    assert_not_silent(&render.left[echo_start..], 0.01, "delay tail");
    assert_eq!(engine.active_voices(), 0);
    assert_eq!(engine.tail_samples(), 0);
}

#[test]
fn test_part_bus_effect_tail_keeps_main_alive() {
    let mut engine = two_part_engine();
    engine
        .set_bus_effect(
            BusAddress::Part(0),
            0,
            Some(BusEffectSpec::Delay {
                time_ms: 10.0,
                feedback: 0.3,
                mix: 1.0,
            }),
        )
        .unwrap();

    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 2);
    engine.note_off(0, 60, -1, 0.0);
    render_blocks(&mut engine, 0, 2);
    assert_eq!(engine.active_voices(), 0);
    assert!(engine.tail_samples() > 0, "main inherits the part bus tail");
}
