//! Client <-> serialization <-> audio round trips
//!
//! Thread tests run the real serialization thread and act as the audio
//! thread themselves. Pump tests drive the same loop synchronously.

use crate::helpers::*;
use mosaic::engine::messaging::{Handler, SerializationContext};
use mosaic::messages::{
    AddZone, LoadSample, Ping, RequestPatchSummary, RequestStatus, SetBusEffect, SetGroupOutput,
    SetZoneRouting, CUSTOM_ID_BASE,
};
use mosaic::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Play audio thread until `predicate` accepts a reply, or time out.
fn process_until(
    engine: &mut Engine,
    replies: &crossbeam_channel::Receiver<SerializationToClient>,
    mut predicate: impl FnMut(&SerializationToClient) -> bool,
) -> Option<SerializationToClient> {
    let deadline = Instant::now() + REPLY_TIMEOUT;
    while Instant::now() < deadline {
        engine.process_audio();
        if let Ok(reply) = replies.recv_timeout(Duration::from_millis(5)) {
            if predicate(&reply) {
                return Some(reply);
            }
        }
    }
    None
}

#[test]
fn test_every_ping_answered_in_order() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    engine.start().unwrap();

    let client = engine.client();
    for nonce in 0..50 {
        client.send(&Ping { nonce }).unwrap();
    }
    for nonce in 0..50 {
        let reply = replies.recv_timeout(REPLY_TIMEOUT).unwrap();
        assert_eq!(reply, SerializationToClient::Pong { nonce });
    }
    engine.stop();
}

#[test]
fn test_pings_from_many_client_threads() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    engine.start().unwrap();

    let workers: Vec<_> = (0..4u64)
        .map(|t| {
            let client = engine.client();
            std::thread::spawn(move || {
                for i in 0..25 {
                    client.send(&Ping { nonce: t * 100 + i }).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut nonces: Vec<u64> = (0..100)
        .map(|_| match replies.recv_timeout(REPLY_TIMEOUT).unwrap() {
            SerializationToClient::Pong { nonce } => nonce,
            other => panic!("unexpected reply {other:?}"),
        })
        .collect();
    nonces.sort_unstable();
    let expected: Vec<u64> = (0..4u64).flat_map(|t| (0..25).map(move |i| t * 100 + i)).collect();
    assert_eq!(nonces, expected);
    engine.stop();
}

#[test]
fn test_unknown_id_is_recoverable() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    engine.start().unwrap();

    engine.client().send_raw(4242, vec![1, 2, 3]).unwrap();
    engine.client().send_bytes(vec![0xff]);
    engine.client().send(&Ping { nonce: 1 }).unwrap();

    assert!(replies.recv_timeout(REPLY_TIMEOUT).unwrap().is_error());
    assert!(replies.recv_timeout(REPLY_TIMEOUT).unwrap().is_error());
    assert_eq!(
        replies.recv_timeout(REPLY_TIMEOUT).unwrap(),
        SerializationToClient::Pong { nonce: 1 }
    );
    engine.stop();
}

#[test]
fn test_zone_edit_reaches_audio_thread() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    let id = dc_sample(&engine, 0.5);
    engine.start().unwrap();

    engine
        .client()
        .send(&AddZone {
            part: 2,
            group: 3,
            zone: instant_zone(id),
        })
        .unwrap();
    let reply = process_until(&mut engine, &replies, |r| {
        matches!(r, SerializationToClient::ZonesChanged { .. })
    });
    assert_eq!(
        reply,
        Some(SerializationToClient::ZonesChanged {
            part: 2,
            group: 3,
            zone_count: 1
        })
    );
    engine.stop();

    assert_eq!(engine.note_on(0, 60, -1, 1.0, 0.0), 1);
    engine.process_audio();
    assert!((settled_level(&mut engine, 0) - 0.5).abs() < 1e-4);
}

#[test]
fn test_bad_routing_ids_are_rejected() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    let id = dc_sample(&engine, 0.5);
    engine.add_zone(0, 0, instant_zone(id)).unwrap();

    engine
        .client()
        .send(&SetZoneRouting {
            part: 0,
            group: 0,
            zone: 0,
            slot: 0,
            route: RawRoute {
                source: 200,
                destination: ModDest::Pitch as u8,
                depth: 1.0,
            },
        })
        .unwrap();
    engine.pump_messages().unwrap();
    assert!(replies.try_recv().unwrap().is_error());

    // Nothing reached the audio thread
    engine.process_audio();
    engine.pump_messages().unwrap();
    assert!(replies.try_recv().is_err());
    let zone = &engine.patch().group(0, 0).unwrap().zones[0];
    assert_eq!(zone.data.routing.active_count(), 0);
}

#[test]
fn test_valid_routing_swaps_zone_list() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    let id = dc_sample(&engine, 0.5);
    engine.add_zone(0, 0, instant_zone(id)).unwrap();

    engine
        .client()
        .send(&SetZoneRouting {
            part: 0,
            group: 0,
            zone: 0,
            slot: 3,
            route: RawRoute {
                source: ModSource::Velocity as u8,
                destination: ModDest::Volume as u8,
                depth: -6.0,
            },
        })
        .unwrap();
    engine.pump_messages().unwrap();
    engine.process_audio();
    engine.pump_messages().unwrap();
    assert!(matches!(
        replies.try_recv(),
        Ok(SerializationToClient::ZonesChanged { zone_count: 1, .. })
    ));
    let zone = &engine.patch().group(0, 0).unwrap().zones[0];
    assert_eq!(zone.data.routing.active_count(), 1);
}

#[test]
fn test_nan_delay_feedback_replies_error_and_bus_stays_finite() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    let id = dc_sample(&engine, 0.5);
    engine.add_zone(0, 0, instant_zone(id)).unwrap();

    engine
        .client()
        .send(&SetBusEffect {
            bus: BusAddress::Main,
            slot: 0,
            effect: Some(BusEffectSpec::Delay {
                time_ms: 10.0,
                feedback: f32::NAN,
                mix: 0.5,
            }),
        })
        .unwrap();
    engine.pump_messages().unwrap();
    assert!(replies.try_recv().unwrap().is_error());

    engine.process_audio();
    engine.pump_messages().unwrap();
    assert!(replies.try_recv().is_err());

    engine.note_on(0, 60, -1, 1.0, 0.0);
    let (left, right) = render_blocks(&mut engine, 0, 8);
    assert!(left.iter().chain(&right).all(|s| s.is_finite()));
    assert_not_silent(&left, 0.1, "main bus after rejected effect");
}

#[test]
fn test_group_mute_message_silences_group() {
    let mut engine = test_engine();
    let _replies = reply_channel(&engine);
    let id = dc_sample(&engine, 0.5);
    engine.add_zone(0, 0, instant_zone(id)).unwrap();
    engine.note_on(0, 60, -1, 1.0, 0.0);
    render_blocks(&mut engine, 0, 2);

    engine
        .client()
        .send(&SetGroupOutput {
            part: 0,
            group: 0,
            volume_db: 0.0,
            pan: 0.0,
            mute: true,
        })
        .unwrap();
    engine.pump_messages().unwrap();
    render_blocks(&mut engine, 0, 100);
    let (left, _) = render_blocks(&mut engine, 0, 1);
    assert_is_silent(&left, tolerances::SILENCE_THRESHOLD, "muted group");
    assert!(engine.patch().group(0, 0).unwrap().settings().mute);
}

#[test]
fn test_status_reflects_audio_thread() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    render_blocks(&mut engine, 0, 5);

    engine.client().send(&RequestStatus).unwrap();
    engine.pump_messages().unwrap();
    assert_eq!(
        replies.try_recv().unwrap(),
        SerializationToClient::Status {
            active_voices: 0,
            blocks_processed: 5,
            tail_samples: 0,
        }
    );
}

#[test]
fn test_patch_summary_lists_populated_groups() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    let id = dc_sample(&engine, 0.5);
    engine.add_zone(4, 2, instant_zone(id)).unwrap();
    engine.add_zone(4, 2, instant_zone(id)).unwrap();

    engine.client().send(&RequestPatchSummary).unwrap();
    engine.pump_messages().unwrap();
    let SerializationToClient::PatchSummary { parts } = replies.try_recv().unwrap() else {
        panic!("expected a patch summary");
    };
    assert_eq!(parts[4].groups.len(), 1);
    assert_eq!(parts[4].groups[0].index, 2);
    assert_eq!(parts[4].groups[0].zones, 2);
    assert!(parts.iter().enumerate().all(|(i, p)| i == 4 || p.groups.is_empty()));
}

#[test]
fn test_missing_sample_file_replies_error() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    engine
        .client()
        .send(&LoadSample {
            path: "/nope/missing.wav".into(),
        })
        .unwrap();
    engine.pump_messages().unwrap();
    assert!(replies.try_recv().unwrap().is_error());
}

#[test]
fn test_callbacks_run_once_and_recycle() {
    let mut engine = test_engine();
    let ran = Arc::new(AtomicUsize::new(0));
    let seen_voices = Arc::new(AtomicUsize::new(0));

    let handler: Handler = {
        let ran = Arc::clone(&ran);
        let seen_voices = Arc::clone(&seen_voices);
        Box::new(move |context: &mut SerializationContext<'_>, _payload: &[u8]| {
            let ran = Arc::clone(&ran);
            let seen_voices = Arc::clone(&seen_voices);
            context.schedule_callback(move |audio| {
                ran.fetch_add(1, Ordering::Relaxed);
                seen_voices.store(audio.voices.active_count(), Ordering::Relaxed);
            })
        })
    };
    engine.register_handler(CUSTOM_ID_BASE, handler).unwrap();

    let id = dc_sample(&engine, 0.5);
    engine.add_zone(0, 0, instant_zone(id)).unwrap();
    engine.note_on(0, 60, -1, 1.0, 0.0);

    // More rounds than the pool holds shells
    for round in 1..=10 {
        for _ in 0..10 {
            engine.client().send_raw(CUSTOM_ID_BASE, Vec::new()).unwrap();
        }
        engine.pump_messages().unwrap();
        engine.process_audio();
        engine.pump_messages().unwrap();
        assert_eq!(ran.load(Ordering::Relaxed), round * 10);
    }
    assert_eq!(seen_voices.load(Ordering::Relaxed), 1);
}

#[test]
fn test_pump_handles_messages_sent_while_pumping() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);

    let client = engine.client();
    let handler: Handler = Box::new(move |_: &mut SerializationContext<'_>, _: &[u8]| {
        client.send(&Ping { nonce: 9 })
    });
    engine.register_handler(CUSTOM_ID_BASE, handler).unwrap();

    engine.client().send_raw(CUSTOM_ID_BASE, Vec::new()).unwrap();
    assert_eq!(engine.pump_messages().unwrap(), 2);
    assert_eq!(
        replies.try_recv().unwrap(),
        SerializationToClient::Pong { nonce: 9 }
    );
    assert_eq!(engine.pump_messages().unwrap(), 0);
}

#[test]
fn test_custom_handler_must_register_before_start() {
    let mut engine = test_engine();
    engine.start().unwrap();
    let handler: Handler = Box::new(|_: &mut SerializationContext<'_>, _: &[u8]| Ok(()));
    assert!(engine.register_handler(CUSTOM_ID_BASE + 1, handler).is_err());
    engine.stop();
}

#[test]
fn test_messages_wait_while_stopped() {
    let mut engine = test_engine();
    let replies = reply_channel(&engine);
    engine.start().unwrap();
    engine.stop();

    engine.client().send(&Ping { nonce: 7 }).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(engine.client().pending(), 1);
    assert!(replies.try_recv().is_err());

    // Picked up once the thread is back
    engine.start().unwrap();
    assert_eq!(
        replies.recv_timeout(REPLY_TIMEOUT).unwrap(),
        SerializationToClient::Pong { nonce: 7 }
    );
    engine.stop();
}
