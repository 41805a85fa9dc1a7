//! Random effect module
//!
//! The one built-in module that answers inline. It draws from OS-seeded
//! thread randomness by default, or from a seeded ChaCha stream when a
//! simulation needs reproducible values.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spacetime_core::{Effect, EffectPayload, Event, EventPayload, EventSender, Module, ModuleName};

#[derive(Debug)]
enum RandomSource {
    Thread,
    Seeded(Mutex<ChaCha8Rng>),
}

/// Answers `Random` with a uniformly distributed `u64`
#[derive(Debug)]
pub struct RandomModule {
    source: RandomSource,
}

impl Default for RandomModule {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomModule {
    /// Module backed by thread randomness
    pub fn new() -> Self {
        Self {
            source: RandomSource::Thread,
        }
    }

    /// Module backed by a deterministic stream
    pub fn seeded(seed: u64) -> Self {
        Self {
            source: RandomSource::Seeded(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Draw the next value over the full `u64` range
    pub fn next_u64(&self) -> u64 {
        match &self.source {
            RandomSource::Thread => rand::thread_rng().gen(),
            RandomSource::Seeded(rng) => rng.lock().gen(),
        }
    }
}

impl Module for RandomModule {
    fn name(&self) -> ModuleName {
        ModuleName::RANDOM
    }

    fn handle_effect(&self, effect: Effect, _events: &EventSender) -> Option<Event> {
        match effect.payload() {
            EffectPayload::Random => Some(Event::reply(
                effect.id(),
                EventPayload::RandomSuccess {
                    value: self.next_u64(),
                },
            )),
            _ => {
                tracing::debug!(effect = %effect, "random module cannot handle effect");
                Some(Event::failure(effect.id()))
            }
        }
    }
}
