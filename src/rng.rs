use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::cell::RefCell;

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

/// Borrow the engine's shared, thread-local PRNG. spec.md §5 leaves seeding
/// policy outside the core spec; this crate defaults to OS entropy per
/// thread (`rand::rngs::SmallRng`, the same RNG type the teacher's
/// `mccfr::profile::Profile::rng` builds per-node), and exposes [`seed`] for
/// deterministic runs (tests, the `explore --seed` flag).
pub fn with_rng<R>(f: impl FnOnce(&mut SmallRng) -> R) -> R {
    RNG.with(|rng| f(&mut rng.borrow_mut()))
}

/// Reseed the calling thread's PRNG. Intended for reproducible demos and
/// tests, not for production seeding policy (spec.md explicitly leaves that
/// question open).
pub fn seed(seed: u64) {
    RNG.with(|rng| *rng.borrow_mut() = SmallRng::seed_from_u64(seed));
}
