use rand::{Rng, SeedableRng, rngs::StdRng};
use std::cell::RefCell;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::seed_from_u64(0));
}

/// Reseeds the thread-local generator. Experiment runners call this once per
/// run so that env reseeds and minibatch shuffles are reproducible.
pub fn set_global_seed(seed: u64) {
    RNG.with_borrow_mut(|rng| *rng = StdRng::seed_from_u64(seed));
}

/// Draws a fresh seed, typically handed to [`crate::env::Env::reset`].
pub fn next_seed() -> u64 {
    RNG.with_borrow_mut(|rng| rng.random())
}

pub fn with_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    RNG.with_borrow_mut(f)
}
