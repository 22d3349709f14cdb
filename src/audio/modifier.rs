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

//! DSP modifiers applied to an instance's samples after resampling.
//!
//! Modifiers run in list order and each one sees the output of the one before
//! it, so the order in a [`ModifierChain`] is significant.

pub mod biquad;
pub mod pan;
pub mod reverb;

pub use biquad::{BiquadModifier, FilterKind};
pub use pan::PanModifier;
pub use reverb::ReverbModifier;

use super::error::AudioError;
use super::format::WaveFormat;

/// An in-place transform over a block of interleaved samples.
pub trait Modifier: Send {
    /// Processes `buffer` in place for the given format.
    ///
    /// Returns true while the modifier still has audible output pending (an
    /// effect tail), which keeps the owning instance alive past the end of its
    /// sound. The format may differ from the previous call; any state derived
    /// from it is rebuilt lazily.
    fn modify(&mut self, buffer: &mut [f32], format: &WaveFormat) -> Result<bool, AudioError>;

    /// Drops filter state and history.
    fn reset(&mut self) {}

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// An ordered list of modifiers.
#[derive(Default)]
pub struct ModifierChain {
    modifiers: Vec<Box<dyn Modifier>>,
}

impl ModifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a modifier to the end of the chain.
    pub fn add(&mut self, modifier: Box<dyn Modifier>) {
        self.modifiers.push(modifier);
    }

    /// Inserts a modifier at `index`, or at the end if `index` is past it.
    pub fn insert(&mut self, index: usize, modifier: Box<dyn Modifier>) {
        let index = index.min(self.modifiers.len());
        self.modifiers.insert(index, modifier);
    }

    /// Removes and returns the modifier at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Modifier>> {
        if index < self.modifiers.len() {
            Some(self.modifiers.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.modifiers.clear();
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// Names of the modifiers in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.modifiers.iter().map(|m| m.name()).collect()
    }

    /// Runs every modifier in order. Returns true if any of them has a pending tail.
    pub fn apply(&mut self, buffer: &mut [f32], format: &WaveFormat) -> Result<bool, AudioError> {
        let mut pending = false;
        for modifier in self.modifiers.iter_mut() {
            pending |= modifier.modify(buffer, format)?;
        }
        Ok(pending)
    }

    pub fn reset(&mut self) {
        for modifier in self.modifiers.iter_mut() {
            modifier.reset();
        }
    }
}

impl std::fmt::Debug for ModifierChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::OUTPUT_FORMAT;

    /// Multiplies every sample by a fixed gain.
    struct Gain(f32);

    impl Modifier for Gain {
        fn modify(&mut self, buffer: &mut [f32], _format: &WaveFormat) -> Result<bool, AudioError> {
            buffer.iter_mut().for_each(|s| *s *= self.0);
            Ok(false)
        }

        fn name(&self) -> &'static str {
            "gain"
        }
    }

    /// Adds a fixed offset to every sample.
    struct Offset(f32);

    impl Modifier for Offset {
        fn modify(&mut self, buffer: &mut [f32], _format: &WaveFormat) -> Result<bool, AudioError> {
            buffer.iter_mut().for_each(|s| *s += self.0);
            Ok(true)
        }

        fn name(&self) -> &'static str {
            "offset"
        }
    }

    #[test]
    fn test_chain_order_matters() {
        let mut chain = ModifierChain::new();
        chain.add(Box::new(Gain(2.0)));
        chain.add(Box::new(Offset(1.0)));
        let mut buffer = vec![1.0, 1.0];
        assert!(chain.apply(&mut buffer, &OUTPUT_FORMAT).unwrap());
        assert_eq!(buffer, vec![3.0, 3.0]);

        let mut chain = ModifierChain::new();
        chain.add(Box::new(Offset(1.0)));
        chain.add(Box::new(Gain(2.0)));
        let mut buffer = vec![1.0, 1.0];
        chain.apply(&mut buffer, &OUTPUT_FORMAT).unwrap();
        assert_eq!(buffer, vec![4.0, 4.0]);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut chain = ModifierChain::new();
        chain.add(Box::new(Gain(2.0)));
        chain.insert(0, Box::new(Offset(1.0)));
        chain.insert(10, Box::new(Gain(0.5)));
        assert_eq!(chain.names(), vec!["offset", "gain", "gain"]);

        let removed = chain.remove(0).unwrap();
        assert_eq!(removed.name(), "offset");
        assert!(chain.remove(5).is_none());
        assert_eq!(chain.len(), 2);

        chain.clear();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_empty_chain_is_passthrough() {
        let mut chain = ModifierChain::new();
        let mut buffer = vec![0.3, -0.3];
        assert!(!chain.apply(&mut buffer, &OUTPUT_FORMAT).unwrap());
        assert_eq!(buffer, vec![0.3, -0.3]);
    }
}
