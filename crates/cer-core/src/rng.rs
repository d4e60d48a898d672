//! Seeded RNG used by every sampling path.
//!
//! Deliberately small and dependency-free; the evaluator contract requires
//! runs to be a deterministic function of (policy, seed), so all randomness
//! flows through an explicitly seeded generator. Not cryptographic.

/// Source of randomness for distribution sampling.
pub trait SampleRng {
    fn next_u64(&mut self) -> u64;

    /// Uniform draw in `[0, 1)` with 53 bits of precision.
    fn next_f64_unit(&mut self) -> f64 {
        let bits = self.next_u64() >> 11;
        (bits as f64) / ((1u64 << 53) as f64)
    }

    /// Uniform index into a collection of `len` elements.
    ///
    /// Returns 0 for `len == 0`; callers guard emptiness themselves.
    fn next_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_f64_unit() * len as f64) as usize
    }
}

/// SplitMix64: a small, fast, well-mixed generator. Fine for sampling and
/// for deriving per-stream seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }
}

impl SampleRng for SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        mix64(self.state)
    }
}

/// Finalizer of the SplitMix64 family; also usable as a standalone hash.
pub fn mix64(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Derive an independent stream seed from a run seed.
///
/// Used to give each episode and each sampled policy its own stream while
/// keeping the whole run reproducible from one seed.
pub fn derive_seed(run_seed: u64, stream: u64) -> u64 {
    mix64(run_seed ^ mix64(stream.wrapping_add(0x9E37_79B9_7F4A_7C15)))
}
