//! Canned assistant reply selection.

use medichat_types::Language;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform-random picker over the per-language reply pool.
///
/// The generator is injectable through `with_seed` so callers can pin the
/// sequence; selection keeps no memory of prior picks, repeats are possible.
pub struct ReplyPicker {
    rng: StdRng,
}

impl ReplyPicker {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick one reply from the language's candidate pool.
    pub fn pick(&mut self, language: Language) -> &'static str {
        let pool = language.reply_pool();
        pool[self.rng.gen_range(0..pool.len())]
    }
}

impl Default for ReplyPicker {
    fn default() -> Self {
        Self::new()
    }
}
