//! Reusable test scenarios for batch writer simulation.
//!
//! Scenarios define record workloads and store profiles that can be combined
//! with a seed to produce reproducible runs.

/// Seeds for reproducible testing.
pub mod seeds {
    /// Standard test seeds that have historically found bugs.
    pub const REGRESSION_SEEDS: &[u64] = &[
        42,
        12345,
        0xDEAD_BEEF,
        999,
        7777,
        0x1337,
        0xCAFE_BABE,
        1,
        u64::MAX,
        0,
    ];

    /// Number of random seeds to test in CI.
    pub const CI_SEED_COUNT: u32 = 100;
}

/// Record workloads.
pub mod workloads {
    use bulkload_core::Record;
    use bytes::Bytes;
    use rand::rngs::StdRng;
    use rand::Rng;

    /// Returns the key used for the `index`-th record of a workload.
    #[must_use]
    pub fn key(index: u64) -> Bytes {
        Bytes::from(format!("key-{index:08}"))
    }

    /// `count` records with sequential keys and small fixed values.
    #[must_use]
    pub fn sequential(count: u64) -> Vec<Record> {
        (0..count)
            .map(|i| Record::new(key(i), Bytes::from(i.to_le_bytes().to_vec()), 0))
            .collect()
    }

    /// `count` records with sequential keys, random value sizes in
    /// `0..=max_value` and random metadata bytes.
    #[must_use]
    pub fn random(rng: &mut StdRng, count: u64, max_value: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                let len = rng.gen_range(0..=max_value);
                let value: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                Record::new(key(i), value, rng.gen())
            })
            .collect()
    }
}

/// Store profiles.
pub mod stores {
    use std::time::Duration;

    use bulkload_store::StoreFaultConfig;

    /// Store that completes writes out of order: every write sleeps for a
    /// seed-derived time up to `max_jitter`.
    #[must_use]
    pub fn jittery(max_jitter: Duration) -> StoreFaultConfig {
        StoreFaultConfig::none().with_write_jitter(max_jitter)
    }

    /// Jittery store that also fails batches, records and syncs at random.
    #[must_use]
    pub fn flaky(max_jitter: Duration) -> StoreFaultConfig {
        StoreFaultConfig::flaky().with_write_jitter(max_jitter)
    }
}

/// Installs a test subscriber that honors `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
