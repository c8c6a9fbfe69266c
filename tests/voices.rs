// Copyright (c) 2024 Mike Tsao

use float_cmp::approx_eq;
use more_asserts::{assert_gt, assert_le, assert_lt};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use voicebox::{
    cores::{Tone, Wav, Waveform},
    prelude::*,
};

fn engine_with_capacity(capacity: usize) -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut settings = EngineSettings::default();
    settings.set_voice_capacity(capacity);
    Engine::new_with(settings)
}

fn constant_wav(frames: usize, value: f32) -> Wav {
    Wav::from_samples(&vec![value; frames], 44100.0, 1).unwrap()
}

// Interleaved stereo, `frames` long.
fn mix_frames(engine: &Engine, frames: usize) -> Vec<f32> {
    let mut out = vec![0.0; frames * 2];
    engine.mix(&mut out);
    out
}

#[test]
fn full_table_evicts_the_oldest_voice() {
    let engine = engine_with_capacity(1);
    let tone = Tone::default();

    let first = engine.play(&tone, &PlayOptions::default());
    assert!(engine.is_valid_voice_handle(first));
    let second = engine.play(&tone, &PlayOptions::default());
    assert!(engine.is_valid_voice_handle(second));
    assert!(
        !engine.is_valid_voice_handle(first),
        "the second play should have evicted the first voice"
    );
    assert_eq!(engine.voice_count(), 1);
}

#[test]
fn protected_voices_survive_eviction_while_others_remain() {
    let engine = engine_with_capacity(2);
    let tone = Tone::default();

    let keeper = engine.play(&tone, &PlayOptions::default());
    engine.set_protect_voice(keeper, true);
    let victim = engine.play(&tone, &PlayOptions::default());
    let newcomer = engine.play(&tone, &PlayOptions::default());

    assert!(engine.is_valid_voice_handle(keeper));
    assert!(engine.is_voice_protected(keeper));
    assert!(!engine.is_valid_voice_handle(victim));
    assert!(engine.is_valid_voice_handle(newcomer));
}

#[test]
fn stale_handles_return_defaults() {
    let engine = engine_with_capacity(1);
    let tone = Tone::default();

    let old = engine.play(&tone, &PlayOptions::default());
    engine.set_relative_play_speed(old, 2.0).unwrap();
    engine.stop(old);
    let new = engine.play(
        &tone,
        &PlayOptionsBuilder::default()
            .volume(0.25)
            .pan(0.5)
            .build()
            .unwrap(),
    );
    assert!(engine.is_valid_voice_handle(new));

    // The new voice lives in the old one's slot, but the old handle must not
    // see it.
    assert_eq!(engine.volume(old), 0.0);
    assert_eq!(engine.pan(old), 0.0);
    assert_eq!(engine.relative_play_speed(old), 1.0);
    assert!(!engine.pause(old));
    assert!(!engine.looping(old));
    engine.set_volume(old, 1.0);
    assert_eq!(engine.volume(new), 0.25, "setters on stale handles do nothing");
    assert_eq!(engine.pan(new), 0.5);
    assert!(engine.seek(old, 1.0).is_ok());
}

#[test]
fn silence_with_no_voices() {
    let engine = Engine::default();
    let out = mix_frames(&engine, 1000);
    assert!(out.iter().all(|s| *s == 0.0));
    assert_eq!(engine.active_voice_count(), 0);
    assert_gt!(engine.stream_time(), 0.0);
}

#[test]
fn volume_fade_is_linear() {
    let engine = Engine::default();
    let tone = Tone::default();
    let handle = engine.play(
        &tone,
        &PlayOptionsBuilder::default().volume(0.0).build().unwrap(),
    );
    engine.fade_volume(handle, 1.0, 1.0);

    // Half a second.
    mix_frames(&engine, 22050);
    let volume = engine.volume(handle);
    assert!(
        approx_eq!(f32, volume, 0.5, epsilon = 0.01),
        "expected about 0.5 halfway through the fade, got {volume}"
    );
}

#[test]
fn short_sounds_stop_themselves() {
    let engine = Engine::default();
    let wav = constant_wav(100, 0.5);
    let handle = engine.play(&wav, &PlayOptions::default());
    assert_eq!(engine.count_audio_source(&wav), 1);

    let out = mix_frames(&engine, 512);
    assert_gt!(out[2 * 10].abs(), 0.1, "the sound should be heard");
    assert_eq!(out[2 * 200], 0.0, "and then it should be over");
    assert!(!engine.is_valid_voice_handle(handle));
    assert_eq!(engine.voice_count(), 0);
}

#[test]
fn looping_sounds_keep_going() {
    let engine = Engine::default();
    let mut wav = constant_wav(100, 0.5);
    wav.settings_mut().set_looping(true);
    let handle = engine.play(&wav, &PlayOptions::default());
    assert!(engine.looping(handle));

    let out = mix_frames(&engine, 1024);
    assert!(engine.is_valid_voice_handle(handle));
    assert_gt!(engine.loop_count(handle), 5);
    assert_gt!(out[2 * 1000].abs(), 0.1);
}

#[test]
fn paused_voices_are_silent() {
    let engine = Engine::default();
    let tone = Tone::new_with(Waveform::Square, 441.0);
    let handle = engine.play(
        &tone,
        &PlayOptionsBuilder::default().paused(true).build().unwrap(),
    );
    assert!(engine.pause(handle));
    assert!(mix_frames(&engine, 512).iter().all(|s| *s == 0.0));
    assert_eq!(engine.voice_stream_time(handle), 0.0);

    engine.set_pause(handle, false);
    assert!(mix_frames(&engine, 512).iter().any(|s| *s != 0.0));
    assert_gt!(engine.voice_stream_time(handle), 0.0);
}

#[test]
fn scheduled_stop_fires() {
    let engine = Engine::default();
    let tone = Tone::default();
    let handle = engine.play(&tone, &PlayOptions::default());
    engine.schedule_stop(handle, 0.01);
    assert!(engine.is_valid_voice_handle(handle));
    mix_frames(&engine, 1024);
    assert!(!engine.is_valid_voice_handle(handle));
}

#[test]
fn panning_moves_the_sound() {
    let engine = Engine::default();
    let wav = constant_wav(4096, 0.5);
    let handle = engine.play(
        &wav,
        &PlayOptionsBuilder::default().pan(-1.0).build().unwrap(),
    );
    let out = mix_frames(&engine, 256);
    assert_gt!(out[200].abs(), 0.1, "left should be loud");
    assert_lt!(out[201].abs(), 0.001, "right should be silent");

    engine.set_pan_absolute(handle, 0.0, 1.0);
    assert!(approx_eq!(f32, engine.channel_volume(handle, 1), 1.0));
    assert_eq!(engine.channel_volume(handle, 0), 0.0);
}

#[test]
fn max_active_voice_budget() {
    let engine = Engine::default();
    assert!(engine.set_max_active_voice_count(0).is_err());
    assert!(engine.set_max_active_voice_count(2).is_ok());
    assert_eq!(engine.max_active_voice_count(), 2);

    let tone = Tone::default();
    let quiet = engine.play(
        &tone,
        &PlayOptionsBuilder::default().volume(0.1).build().unwrap(),
    );
    let loud = engine.play(&tone, &PlayOptions::default());
    let louder = engine.play(
        &tone,
        &PlayOptionsBuilder::default().volume(2.0).build().unwrap(),
    );
    assert_eq!(engine.voice_count(), 3);
    assert_eq!(engine.active_voice_count(), 2);

    // The quietest voice isn't mixed, but its clock and faders still run.
    mix_frames(&engine, 512);
    assert_gt!(engine.voice_stream_time(loud), 0.0);
    assert_gt!(engine.voice_stream_time(louder), 0.0);
    assert_gt!(engine.voice_stream_time(quiet), 0.0);
    assert!(engine.is_valid_voice_handle(quiet));
}

#[test]
fn single_instance_sources_replace_themselves() {
    let engine = Engine::default();
    let mut tone = Tone::default();
    tone.settings_mut().set_single_instance(true);
    let first = engine.play(&tone, &PlayOptions::default());
    let second = engine.play(&tone, &PlayOptions::default());
    assert!(!engine.is_valid_voice_handle(first));
    assert!(engine.is_valid_voice_handle(second));
    assert_eq!(engine.count_audio_source(&tone), 1);

    engine.stop_audio_source(&tone);
    assert_eq!(engine.count_audio_source(&tone), 0);
}

#[test]
fn seeking_and_rewinding() {
    let engine = Engine::default();
    let wav = constant_wav(44100, 0.5);
    let handle = engine.play(&wav, &PlayOptions::default());
    assert!(engine.seek(handle, 0.5).is_ok());
    assert!(approx_eq!(f64, engine.stream_position(handle), 0.5));
    assert!(engine.rewind(handle).is_ok());
    assert_eq!(engine.stream_position(handle), 0.0);
}

#[test]
fn relative_play_speed_is_validated() {
    let engine = Engine::default();
    let tone = Tone::default();
    let handle = engine.play(&tone, &PlayOptions::default());
    assert!(engine.set_relative_play_speed(handle, 0.0).is_err());
    assert!(engine.set_relative_play_speed(handle, 2.0).is_ok());
    assert_eq!(engine.relative_play_speed(handle), 2.0);
    assert!(engine.set_samplerate(handle, -1.0).is_err());
    assert!(engine.set_samplerate(handle, 22050.0).is_ok());
    assert_eq!(engine.sample_rate(handle), 22050.0);
}

#[test]
fn global_volume_scales_everything() {
    let engine = Engine::default();
    let wav = constant_wav(4096, 0.5);
    engine.play(&wav, &PlayOptions::default());
    let loud = mix_frames(&engine, 256);

    let engine = Engine::default();
    engine.play(&wav, &PlayOptions::default());
    engine.set_global_volume(0.5);
    assert_eq!(engine.global_volume(), 0.5);
    let quiet = mix_frames(&engine, 256);
    assert_lt!(quiet[100].abs(), loud[100].abs());
}

#[test]
fn deinit_stops_everything() {
    let engine = Engine::default();
    let tone = Tone::default();
    for _ in 0..5 {
        engine.play(&tone, &PlayOptions::default());
    }
    assert_eq!(engine.voice_count(), 5);
    engine.deinit();
    assert_eq!(engine.voice_count(), 0);
}

#[test]
fn pitched_voices_are_smooth_across_blocks() {
    let engine = Engine::default();
    engine.set_clipper(Clipper::Hard);
    engine.set_main_resampler(Resampler::Linear);
    let ramp: Vec<f32> = (0..4096).map(|i| i as f32 * 1e-4).collect();
    let wav = Wav::from_samples(&ramp, 22050.0, 1).unwrap();
    engine.play(&wav, &PlayOptions::default());

    let out = mix_frames(&engine, 4096);
    let left: Vec<f32> = out.iter().step_by(2).copied().collect();
    // Half a source sample per output frame, panned center, then scaled
    // after clipping.
    let expected = 0.5e-4 * core::f32::consts::FRAC_1_SQRT_2 * 0.95;
    for (i, pair) in left.windows(2).enumerate().skip(4) {
        let step = pair[1] - pair[0];
        assert!(
            approx_eq!(f32, step, expected, epsilon = 1e-6),
            "output should rise evenly, but frame {} moved by {step} instead of {expected}",
            i + 1
        );
    }
}

#[test]
fn voices_returning_to_the_mix_are_heard_right_away() {
    let engine = Engine::default();
    engine.set_max_active_voice_count(1).unwrap();
    let slow = Wav::from_samples(&vec![0.5; 44100], 22050.0, 1).unwrap();
    let returning = engine.play(&slow, &PlayOptions::default());
    mix_frames(&engine, 512);

    let tone = Tone::default();
    let louder = engine.play(
        &tone,
        &PlayOptionsBuilder::default().volume(2.0).build().unwrap(),
    );
    mix_frames(&engine, 512);
    assert!(engine.is_valid_voice_handle(returning));

    engine.stop(louder);
    let out = mix_frames(&engine, 512);
    assert_gt!(
        out[2 * 10].abs(),
        0.1,
        "the voice should pick up its source audio as soon as it's mixed again"
    );
}

#[test]
fn control_and_audio_threads_share_the_engine() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Engine>();

    let engine = Arc::new(engine_with_capacity(16));
    let running = Arc::new(AtomicBool::new(true));
    let audio = {
        let engine = Arc::clone(&engine);
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            let mut out = vec![0.0; 256 * 2];
            let mut ticks = 0;
            loop {
                engine.mix(&mut out);
                ticks += 1;
                if !running.load(Ordering::Relaxed) {
                    break ticks;
                }
            }
        })
    };

    let tone = Tone::default();
    let group = engine.create_voice_group().unwrap();
    let mut stopped = Vec::new();
    for i in 0..200 {
        let handle = if i % 3 == 0 {
            engine.play_3d(
                &tone,
                Vec3::new(i as f32, 0.0, 0.0),
                Vec3::zeros(),
                &PlayOptions::default(),
            )
        } else {
            engine.play(&tone, &PlayOptions::default())
        };
        engine.add_voice_to_group(group, handle).unwrap();
        engine.set_volume(group, 0.5);
        engine.set_3d_source_position(handle, Vec3::new(1.0, 2.0, 3.0));
        if i % 2 == 0 {
            engine.stop(handle);
            stopped.push(handle);
        }
    }

    running.store(false, Ordering::Relaxed);
    let ticks = audio.join().unwrap();
    assert_gt!(ticks, 0);

    for handle in stopped {
        assert!(!engine.is_valid_voice_handle(handle));
        assert_eq!(engine.volume(handle), 0.0);
        assert_eq!(engine.relative_play_speed(handle), 1.0);
        assert!(!engine.pause(handle));
    }
    assert_le!(engine.voice_count(), 16);
    assert_eq!(engine.volume(group), 0.5);

    engine.stop(group);
    assert_eq!(
        engine.voice_count(),
        0,
        "every surviving voice was in the group"
    );
    assert!(engine.is_voice_group_empty(group));
}
