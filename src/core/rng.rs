//! Deterministic Random Number Generator
//!
//! Uses the mulberry32 recurrence: a 32-bit state advanced by a fixed odd
//! constant, then two rounds of xor-shift/multiply mixing.
//! Given the same seed, produces identical sequence on all platforms,
//! including the browser client that renders the same balls.

/// Increment added to the state before every draw.
const MULBERRY_INCREMENT: u32 = 0x6D2B79F5;

/// 2^32 as f64, used to normalize draws into [0, 1).
const U32_RANGE: f64 = 4_294_967_296.0;

/// Deterministic PRNG using the mulberry32 algorithm.
///
/// # Determinism Guarantee
///
/// All arithmetic is wrapping 32-bit, mirroring the JavaScript
/// `Math.imul`/`>>> 0` formulation bit for bit.
///
/// # Example
///
/// ```
/// use speedclick::core::rng::Mulberry32;
///
/// let mut rng = Mulberry32::new(0);
/// let value = rng.next_f64();
/// assert!((value - 0.266_429_208_684_712_65).abs() < 1e-15); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mulberry32 {
    state: u32,
}

impl Default for Mulberry32 {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Mulberry32 {
    /// Create a new RNG from a 32-bit seed.
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Create an RNG from a wide seed, keeping only the low 32 bits
    /// (the `>>> 0` truncation a JavaScript client applies).
    pub fn from_seed(seed: i64) -> Self {
        Self::new(seed as u32)
    }

    /// Generate the next raw 32-bit value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Generate the next value in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / U32_RANGE
    }
}

// =============================================================================
// TESTS
// =============================================================================
