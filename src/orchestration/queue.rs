// Copyright (c) 2024 Mike Tsao

use super::SourceSettings;
use crate::{
    error::{Error, Result},
    prelude::*,
    types::QUEUE_CAPACITY,
};
use bounded_vec_deque::BoundedVecDeque;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct QueueEntry {
    instance: Box<dyn AudioSourceInstance>,
    source: SourceUid,
}

#[derive(Debug)]
struct QueueState {
    ring: BoundedVecDeque<QueueEntry>,
    finished: usize,
}

/// Plays other sources back to back without gaps. Play the queue once, then
/// feed it with [Queue::play()]. Everything queued must have the queue's
/// channel count, and is played at the queue's sample rate.
#[derive(Debug)]
pub struct Queue {
    settings: SourceSettings,
    shared: Arc<Mutex<QueueState>>,
}
impl Default for Queue {
    fn default() -> Self {
        let mut settings = SourceSettings::default();
        let flags = settings.flags_mut();
        flags.single_instance = true;
        flags.protected = true;
        if let Err(e) = settings.set_format(SampleRate::DEFAULT_SAMPLE_RATE as f32, 2) {
            log::warn!("couldn't set queue format: {e}");
        }
        Self {
            settings,
            shared: Arc::new(Mutex::new(QueueState {
                ring: BoundedVecDeque::new(QUEUE_CAPACITY),
                finished: 0,
            })),
        }
    }
}
impl AudioSource for Queue {
    fn create_instance(&self) -> Box<dyn AudioSourceInstance> {
        Box::new(QueueInstance {
            shared: Arc::clone(&self.shared),
        })
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut SourceSettings {
        &mut self.settings
    }
}
impl Queue {
    /// Appends a new instance of `source` to the queue.
    pub fn play(&self, source: &dyn AudioSource) -> Result<()> {
        let channels = source.settings().channels();
        if channels != self.settings.channels() {
            return Err(Error::invalid(format!(
                "queue has {} channels but the sound has {channels}",
                self.settings.channels()
            )));
        }
        if self.shared.lock().ring.is_full() {
            return Err(Error::QueueFull);
        }
        let instance = source.create_instance();
        let mut state = self.shared.lock();
        if state.ring.is_full() {
            return Err(Error::QueueFull);
        }
        state.ring.push_back(QueueEntry {
            instance,
            source: source.settings().uid(),
        });
        Ok(())
    }

    /// How many sounds are waiting or playing.
    pub fn queue_count(&self) -> usize {
        self.shared.lock().ring.len()
    }

    /// Whether the sound at the front of the queue came from `source`.
    pub fn is_currently_playing(&self, source: &dyn AudioSource) -> bool {
        self.shared
            .lock()
            .ring
            .front()
            .is_some_and(|entry| entry.source == source.settings().uid())
    }

    /// Adopts `source`'s sample rate and channel count.
    pub fn set_params_from_audio_source(&mut self, source: &dyn AudioSource) -> Result<()> {
        let settings = source.settings();
        self.set_params(settings.base_sample_rate(), settings.channels())
    }

    #[allow(missing_docs)]
    pub fn set_params(&mut self, sample_rate: f32, channels: usize) -> Result<()> {
        self.settings.set_format(sample_rate, channels)
    }
}

#[derive(Debug)]
struct QueueInstance {
    shared: Arc<Mutex<QueueState>>,
}
impl AudioSourceInstance for QueueInstance {
    fn get_audio(&mut self, buffer: &mut [f32], samples: usize, stride: usize) -> usize {
        let mut state = self.shared.lock();
        let mut copied = 0;
        while copied < samples {
            let Some(front) = state.ring.front_mut() else {
                break;
            };
            let read = front
                .instance
                .get_audio(&mut buffer[copied..], samples - copied, stride)
                .min(samples - copied);
            copied += read;
            if front.instance.has_ended() {
                state.ring.pop_front();
                state.finished += 1;
            } else if read == 0 {
                break;
            }
        }
        copied
    }

    fn has_ended(&self) -> bool {
        let state = self.shared.lock();
        state.finished > 0 && state.ring.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Produces a fixed number of frames of a constant value.
    #[derive(Debug)]
    struct Burst {
        settings: SourceSettings,
        frames: usize,
        value: f32,
    }
    impl Burst {
        fn new(frames: usize, value: f32) -> Self {
            let mut settings = SourceSettings::default();
            settings.set_format(44100.0, 2).unwrap();
            Self {
                settings,
                frames,
                value,
            }
        }
    }
    impl AudioSource for Burst {
        fn create_instance(&self) -> Box<dyn AudioSourceInstance> {
            Box::new(BurstInstance {
                remaining: self.frames,
                value: self.value,
            })
        }
        fn settings(&self) -> &SourceSettings {
            &self.settings
        }
        fn settings_mut(&mut self) -> &mut SourceSettings {
            &mut self.settings
        }
    }
    #[derive(Debug)]
    struct BurstInstance {
        remaining: usize,
        value: f32,
    }
    impl AudioSourceInstance for BurstInstance {
        fn get_audio(&mut self, buffer: &mut [f32], samples: usize, stride: usize) -> usize {
            let n = samples.min(self.remaining);
            for c in 0..2 {
                buffer[c * stride..c * stride + n].fill(self.value);
            }
            self.remaining -= n;
            n
        }
        fn has_ended(&self) -> bool {
            self.remaining == 0
        }
    }

    #[test]
    fn plays_back_to_back() {
        let queue = Queue::default();
        let a = Burst::new(3, 0.5);
        let b = Burst::new(3, -0.5);
        queue.play(&a).unwrap();
        queue.play(&b).unwrap();
        assert_eq!(queue.queue_count(), 2);
        assert!(queue.is_currently_playing(&a));

        let mut instance = queue.create_instance();
        assert!(!instance.has_ended());
        let mut buffer = vec![0.0; 16];
        assert_eq!(instance.get_audio(&mut buffer, 8, 8), 6);
        assert_eq!(buffer[..8], [0.5, 0.5, 0.5, -0.5, -0.5, -0.5, 0.0, 0.0]);
        assert_eq!(buffer[8..14], [0.5, 0.5, 0.5, -0.5, -0.5, -0.5]);
        assert_eq!(queue.queue_count(), 0);
        assert!(instance.has_ended());
    }

    #[test]
    fn rejects_when_full_or_mismatched() {
        let queue = Queue::default();
        let sound = Burst::new(1, 1.0);
        for _ in 0..QUEUE_CAPACITY {
            assert!(queue.play(&sound).is_ok());
        }
        assert_eq!(queue.play(&sound), Err(Error::QueueFull));

        let mut mono = Burst::new(1, 1.0);
        mono.settings_mut().set_format(44100.0, 1).unwrap();
        let queue = Queue::default();
        assert!(matches!(queue.play(&mono), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn empty_queue_has_not_ended() {
        let queue = Queue::default();
        let instance = queue.create_instance();
        assert!(
            !instance.has_ended(),
            "a queue that never played anything is waiting, not finished"
        );
    }
}
