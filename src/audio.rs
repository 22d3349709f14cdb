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
//! Real-time sample playback.
//!
//! A [`PreSampledSound`] holds decoded audio. Each [`SoundInstance`] plays one
//! sound through a [`Sampler`] and an optional chain of modifiers. The
//! [`AudioEngine`] sums its live instances into the fixed output format and is
//! pulled by an [`OutputDevice`].

pub mod collection;
pub mod cpal;
pub mod engine;
pub mod error;
pub mod format;
pub mod instance;
pub mod loader;
pub mod modifier;
pub mod sampler;
pub mod sound;

pub use self::cpal::{DeviceInfo, OutputDevice};
pub use collection::{ChangeQueue, DiscreteTimeCollection};
pub use engine::AudioEngine;
pub use error::AudioError;
pub use format::{WaveFormat, OUTPUT_FORMAT};
pub use instance::{InstanceListener, SoundInstance, SoundState};
pub use loader::SoundLoader;
pub use modifier::{
    BiquadModifier, FilterKind, Modifier, ModifierChain, PanModifier, ReverbModifier,
};
pub use sampler::{SampleResult, SampleTransition, Sampler, SamplerParams};
pub use sound::PreSampledSound;

/// Something an output device can pull interleaved samples from.
pub trait SampleProvider: Send + Sync {
    /// The format of the samples produced by [`SampleProvider::read`].
    fn format(&self) -> WaveFormat;

    /// Writes `count` samples into `buffer[offset..offset + count]`, returning
    /// how many were written. Called from the real-time audio thread.
    fn read(&self, buffer: &mut [f32], offset: usize, count: usize) -> Result<usize, AudioError>;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    OutputDevice::list()
}
