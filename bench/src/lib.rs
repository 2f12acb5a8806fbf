//! Benchmark utilities for Rusty Dispatch.
//!
//! Provides observer doubles and population helpers shared by the criterion
//! benchmarks in `benches/`.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p rusty_bench
//!
//! # Run specific benchmark group
//! cargo bench -p rusty_bench -- fanout
//! ```
//!
//! Results are written to `target/criterion/` with HTML reports.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusty_dispatch::{Arity, Observer, Payload, Selector};

pub const TICK: Selector = Selector::new("tick");
pub const IGNORED: Selector = Selector::new("ignored");

/// Counts the `TICK` events it receives.
#[derive(Default)]
pub struct Counter {
    hits: AtomicU64,
}

impl Counter {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

impl Observer for Counter {
    fn responds_to(&self, selector: Selector, _arity: Arity) -> bool {
        selector == TICK
    }

    fn perform(&self, _selector: Selector, _payload: &Payload) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
}

/// `n` fresh counters, already erased to `dyn Observer`.
pub fn counters(n: usize) -> Vec<Arc<dyn Observer>> {
    (0..n)
        .map(|_| Arc::new(Counter::default()) as Arc<dyn Observer>)
        .collect()
}

/// Drop roughly `fraction` of `observers`, chosen with a fixed seed so runs
/// are comparable.
pub fn cull(observers: &mut Vec<Arc<dyn Observer>>, fraction: f64, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    observers.retain(|_| !rng.gen_bool(fraction));
}
