// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The mixing root that the output device pulls from.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::collection::{ChangeQueue, DiscreteTimeCollection};
use super::error::AudioError;
use super::format::{WaveFormat, OUTPUT_FORMAT};
use super::instance::{SoundInstance, SoundState};
use super::SampleProvider;
use crate::config::EngineConfig;

/// Default master volume.
pub const DEFAULT_VOLUME: f32 = 1.0;
/// Default number of simultaneously mixed instances.
pub const DEFAULT_MAX_SOUNDS: usize = 64;
/// Upper bound for the instance limit.
pub const MAX_SOUNDS_LIMIT: usize = 256;

/// Clamps a master volume to [0, 1]. NaN falls back to the default.
pub fn sanitize_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        DEFAULT_VOLUME
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Clamps an instance limit to [1, MAX_SOUNDS_LIMIT].
pub fn sanitize_max_sounds(max_sounds: usize) -> usize {
    max_sounds.clamp(1, MAX_SOUNDS_LIMIT)
}

struct Settings {
    volume: f32,
    max_sounds: usize,
}

/// Everything the mix pass touches, owned by whoever holds the lock.
struct MixState {
    instances: DiscreteTimeCollection<Arc<SoundInstance>>,
    /// Grows to the largest count requested, never shrinks.
    scratch: Vec<f32>,
}

/// Sums every live instance into one interleaved stream in the output format.
///
/// Instances are started with [`AudioEngine::play`] and taken out with
/// [`AudioEngine::remove`] from any thread. Both only stage the change; the
/// live set is updated at the top of the next [`AudioEngine::read`].
pub struct AudioEngine {
    format: WaveFormat,
    settings: Mutex<Settings>,
    queue: Arc<ChangeQueue<Arc<SoundInstance>>>,
    mix: Mutex<MixState>,
    last_mix_nanos: AtomicU64,
    live_count: AtomicUsize,
}

impl AudioEngine {
    pub fn new() -> Self {
        let instances = DiscreteTimeCollection::new();
        let queue = Arc::clone(instances.queue());
        Self {
            format: OUTPUT_FORMAT,
            settings: Mutex::new(Settings {
                volume: DEFAULT_VOLUME,
                max_sounds: DEFAULT_MAX_SOUNDS,
            }),
            queue,
            mix: Mutex::new(MixState {
                instances,
                scratch: Vec::new(),
            }),
            last_mix_nanos: AtomicU64::new(0),
            live_count: AtomicUsize::new(0),
        }
    }

    /// Creates an engine with the volume and instance limit from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        let engine = Self::new();
        engine.set_volume(config.volume());
        engine.set_max_sounds(config.max_sounds());
        info!(
            volume = engine.volume(),
            max_sounds = engine.max_sounds(),
            "Audio engine created"
        );
        engine
    }

    pub fn format(&self) -> WaveFormat {
        self.format
    }

    pub fn volume(&self) -> f32 {
        self.settings.lock().volume
    }

    pub fn set_volume(&self, volume: f32) {
        self.settings.lock().volume = sanitize_volume(volume);
    }

    pub fn max_sounds(&self) -> usize {
        self.settings.lock().max_sounds
    }

    pub fn set_max_sounds(&self, max_sounds: usize) {
        self.settings.lock().max_sounds = sanitize_max_sounds(max_sounds);
    }

    /// Starts the instance and stages it for mixing.
    pub fn play(&self, instance: Arc<SoundInstance>) {
        instance.play();
        debug!(instance = instance.id(), "Instance queued");
        self.queue.add(instance);
    }

    /// Stages the instance for removal. Its state is left untouched.
    pub fn remove(&self, instance: &Arc<SoundInstance>) {
        self.queue.remove(Arc::clone(instance));
    }

    /// Stops every live instance. They leave the mix at the next read.
    pub fn stop_all(&self) {
        let mix = self.mix.lock();
        for instance in mix.instances.iter() {
            instance.stop();
        }
        info!(stopped = mix.instances.len(), "All instances stopped");
    }

    /// Live instances as of the last read.
    pub fn active_count(&self) -> usize {
        self.live_count.load(Ordering::Relaxed)
    }

    /// Wall-clock time spent in the last read.
    pub fn last_mix_duration(&self) -> Duration {
        Duration::from_nanos(self.last_mix_nanos.load(Ordering::Relaxed))
    }

    /// Mixes `count` samples into `buffer[offset..offset + count]`.
    ///
    /// Staged adds and removes are applied first, and finished or stopped
    /// instances are dropped. An instance that fails is stopped and its error
    /// is returned; the output region is left unspecified.
    pub fn read(
        &self,
        buffer: &mut [f32],
        offset: usize,
        count: usize,
    ) -> Result<usize, AudioError> {
        let end = offset
            .checked_add(count)
            .filter(|end| *end <= buffer.len())
            .ok_or(AudioError::BufferOutOfRange {
                offset,
                count,
                length: buffer.len(),
            })?;
        if count % self.format.channels as usize != 0 {
            return Err(AudioError::InvalidSampleCount {
                count,
                channels: self.format.channels,
            });
        }

        let start = Instant::now();
        let (volume, max_sounds) = {
            let settings = self.settings.lock();
            (settings.volume, settings.max_sounds)
        };
        let output = &mut buffer[offset..end];

        let mut mix = self.mix.lock();
        let MixState { instances, scratch } = &mut *mix;
        Self::flush(instances, max_sounds);
        self.live_count.store(instances.len(), Ordering::Relaxed);

        if instances.is_empty() {
            output.fill(0.0);
        } else {
            if scratch.len() < count {
                scratch.resize(count, 0.0);
            }
            let scratch = &mut scratch[..count];

            for (i, instance) in instances.iter().enumerate() {
                if let Err(e) = instance.get_samples(scratch, &self.format) {
                    error!(
                        instance = instance.id(),
                        err = %e,
                        "Instance failed while mixing, stopping it"
                    );
                    instance.stop();
                    return Err(e);
                }

                if i == 0 {
                    for (out, sample) in output.iter_mut().zip(scratch.iter()) {
                        *out = sample * volume;
                    }
                } else {
                    for (out, sample) in output.iter_mut().zip(scratch.iter()) {
                        *out += sample * volume;
                    }
                }
            }
        }

        let elapsed = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
        self.last_mix_nanos.store(elapsed, Ordering::Relaxed);
        Ok(count)
    }

    /// Applies staged changes, drops dead instances and enforces the instance limit.
    fn flush(instances: &mut DiscreteTimeCollection<Arc<SoundInstance>>, max_sounds: usize) {
        instances.apply();
        instances.retain(|instance| match instance.state() {
            SoundState::Stopped | SoundState::Finished => {
                debug!(instance = instance.id(), "Instance left the mix");
                false
            }
            SoundState::Playing | SoundState::Paused => true,
        });

        while instances.len() > max_sounds {
            let oldest = instances.remove_at(0);
            oldest.stop();
            warn!(
                max_sounds,
                instance = oldest.id(),
                "Sound limit reached, stealing oldest"
            );
        }
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleProvider for AudioEngine {
    fn format(&self) -> WaveFormat {
        self.format
    }

    fn read(&self, buffer: &mut [f32], offset: usize, count: usize) -> Result<usize, AudioError> {
        AudioEngine::read(self, buffer, offset, count)
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("format", &self.format)
            .field("volume", &self.volume())
            .field("max_sounds", &self.max_sounds())
            .field("active", &self.active_count())
            .finish()
    }
}
