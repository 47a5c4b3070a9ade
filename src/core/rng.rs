//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ for fast, seedable randomness.
//! Every session owns one, so a play-through replays identically from its seed.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Deterministic PRNG using the Xorshift128+ family.
///
/// # Example
///
/// ```
/// use arcade::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a random integer in range [min, max].
    #[inline]
    pub fn next_int_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let range = (max - min + 1) as u32;
        min + self.next_int(range) as i32
    }

    /// Generate a float in [0, 1).
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        // 24 high bits fit the f32 mantissa exactly
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Generate a float in [min, max).
    #[inline]
    pub fn next_f32_range(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        min + self.next_f32() * (max - min)
    }

    /// Generate a random boolean with given probability in [0, 1].
    #[inline]
    pub fn next_bool(&mut self, probability: f32) -> bool {
        self.next_f32() < probability
    }

    /// Random sign: `1.0` or `-1.0` with equal odds.
    #[inline]
    pub fn next_sign(&mut self) -> f32 {
        if self.next_bool(0.5) { 1.0 } else { -1.0 }
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(slice.len() as u32) as usize;
            Some(&slice[idx])
        }
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a session seed from the session id and game slug.
///
/// Two sessions of the same game never share a seed unless they share an id.
pub fn derive_session_seed(session_id: &[u8; 16], game_slug: &str) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"ARCADE_SESSION_SEED_V1");
    hasher.update(session_id);
    hasher.update(game_slug.as_bytes());

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        // Same seed must produce same sequence
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);

        // Very unlikely to match
        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_next_int() {
        let mut rng = DeterministicRng::new(1234);

        for _ in 0..1000 {
            let val = rng.next_int(100);
            assert!(val < 100);
        }

        // Edge case: max = 0
        assert_eq!(rng.next_int(0), 0);

        // Edge case: max = 1
        assert_eq!(rng.next_int(1), 0);
    }

    #[test]
    fn test_next_int_range() {
        let mut rng = DeterministicRng::new(5678);

        for _ in 0..1000 {
            let val = rng.next_int_range(1, 6);
            assert!((1..=6).contains(&val));
        }

        assert_eq!(rng.next_int_range(5, 5), 5);
    }

    #[test]
    fn test_next_f32_bounds() {
        let mut rng = DeterministicRng::new(9999);

        for _ in 0..1000 {
            let val = rng.next_f32();
            assert!((0.0..1.0).contains(&val));

            let ranged = rng.next_f32_range(50.0, 450.0);
            assert!((50.0..450.0).contains(&ranged));
        }
    }

    #[test]
    fn test_next_sign() {
        let mut rng = DeterministicRng::new(31);
        let signs: Vec<f32> = (0..200).map(|_| rng.next_sign()).collect();

        assert!(signs.iter().all(|s| *s == 1.0 || *s == -1.0));
        assert!(signs.contains(&1.0));
        assert!(signs.contains(&-1.0));
    }

    #[test]
    fn test_choose() {
        let mut rng = DeterministicRng::new(2);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());

        let moves = [3u8, 5, 7];
        for _ in 0..50 {
            let picked = rng.choose(&moves).copied();
            assert!(matches!(picked, Some(3 | 5 | 7)));
        }
    }

    #[test]
    fn test_derive_session_seed() {
        let id = [1u8; 16];

        let seed1 = derive_session_seed(&id, "snake-game");
        let seed2 = derive_session_seed(&id, "snake-game");
        assert_eq!(seed1, seed2);

        assert_ne!(seed1, derive_session_seed(&id, "pong"));
        assert_ne!(seed1, derive_session_seed(&[2u8; 16], "snake-game"));
    }
}
