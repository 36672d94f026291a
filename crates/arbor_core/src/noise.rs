//! Simulated noisy channel for exercising the integrity codecs.

use rand::Rng;

/// Flips every bit independently with a fixed probability.
pub struct NoiseInjector<R> {
    probability: f64,
    rng: R,
}

impl<R: Rng> NoiseInjector<R> {
    pub fn new(probability: f64, rng: R) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability, rng }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Return a copy of `data` with random bit flips applied.
    pub fn inject(&mut self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .map(|&byte| {
                (0..8).fold(byte, |b, bit| {
                    if self.rng.gen_bool(self.probability) {
                        b ^ (1 << bit)
                    } else {
                        b
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn flipped_bits(a: &[u8], b: &[u8]) -> u32 {
        a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
    }

    #[test]
    fn test_zero_probability_is_identity() {
        let mut noise = NoiseInjector::new(0.0, StdRng::seed_from_u64(1));
        let data = vec![0xA5; 512];
        assert_eq!(noise.inject(&data), data);
    }

    #[test]
    fn test_full_probability_inverts() {
        let mut noise = NoiseInjector::new(1.0, StdRng::seed_from_u64(1));
        assert_eq!(noise.inject(&[0x00, 0xF0]), vec![0xFF, 0x0F]);
    }

    #[test]
    fn test_flip_rate_close_to_probability() {
        let mut noise = NoiseInjector::new(0.01, StdRng::seed_from_u64(99));
        let data = vec![0u8; 100_000];
        let flips = flipped_bits(&data, &noise.inject(&data));

        // 800_000 bits at 1% gives 8_000 expected flips
        assert!((7_000..9_000).contains(&flips), "{flips} flips");
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let data = vec![0x3C; 1024];
        let a = NoiseInjector::new(0.05, StdRng::seed_from_u64(8)).inject(&data);
        let b = NoiseInjector::new(0.05, StdRng::seed_from_u64(8)).inject(&data);
        assert_eq!(a, b);
    }

    #[test]
    fn test_probability_is_clamped() {
        let noise = NoiseInjector::new(3.0, StdRng::seed_from_u64(0));
        assert_eq!(noise.probability(), 1.0);
    }
}
