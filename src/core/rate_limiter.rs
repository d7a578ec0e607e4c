//! Fixed-size token-bucket table keyed by an opaque byte string.
//!
//! Each slot holds exactly one bucket. Two keys hashing to the same slot
//! compete: the older bucket is evicted and replaced rather than chained,
//! which bounds memory and keeps `touch` O(1) at the cost of slightly
//! over-permissive admission under collision — this is the design, not a
//! bug, and must not be "fixed" with a resizing map.

use std::hash::{Hash, Hasher};
use std::time::Instant;

struct TokenBucket {
    key: Vec<u8>,
    occupied: bool,
    rate: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn empty(burst: f64, rate: f64, now: Instant) -> Self {
        Self {
            key: Vec::new(),
            occupied: false,
            rate,
            burst,
            tokens: burst,
            last_refill: now,
        }
    }

    fn reset(&mut self, key: &[u8], now: Instant) {
        self.key.clear();
        self.key.extend_from_slice(key);
        self.occupied = true;
        self.tokens = self.burst;
        self.last_refill = now;
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + self.rate * elapsed).min(self.burst);
    }

    /// Consumes one token if available. Returns `true` (admit) or `false` (deny).
    fn touch(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// A fixed-size, single-slot-per-bucket token-bucket table.
///
/// `capacity` buckets are allocated once at construction and never resized.
/// All buckets share the same `rate` and `burst`.
pub struct HashLimit {
    buckets: Vec<TokenBucket>,
    capacity: usize,
    seed: u64,
}

impl HashLimit {
    /// Allocates a table of `capacity` buckets, each with the given rate
    /// (tokens/sec) and burst (max tokens). `capacity` must be `> 0`.
    pub fn alloc(capacity: usize, rate: f64, burst: f64) -> Self {
        assert!(capacity > 0, "HashLimit capacity must be positive");
        let now = Instant::now();
        let buckets = (0..capacity)
            .map(|_| TokenBucket::empty(burst, rate, now))
            .collect();
        Self {
            buckets,
            capacity,
            seed: 0x9E3779B97F4A7C15,
        }
    }

    /// A single-bucket limiter keyed by a constant — the `iface` limiter
    /// keyed by a constant — a single-bucket limiter with capacity one.
    pub fn alloc_single(rate: f64, burst: f64) -> Self {
        Self::alloc(1, rate, burst)
    }

    fn slot(&self, key: &[u8]) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.capacity
    }

    /// Consumes one token for `key` if available.
    ///
    /// If the slot for `key` is occupied by a different key, the existing
    /// bucket is reset (key replaced, tokens reset to `burst`) before the
    /// refill step.
    pub fn touch(&mut self, key: &[u8]) -> bool {
        let slot = self.slot(key);
        let now = Instant::now();
        let bucket = &mut self.buckets[slot];
        if !bucket.occupied || bucket.key != key {
            bucket.reset(key, now);
        }
        bucket.touch(now)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
