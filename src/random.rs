use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution as SampleDistribution, Normal};
use serde::{Deserialize, Serialize};

use crate::utils::fill_random_ternary_secret_with_hamming_weight;

pub(crate) trait NewWithSeed {
    type Seed;
    fn new_with_seed(seed: Self::Seed) -> Self;
}

pub(crate) trait RandomFillUniformInModulus<M: ?Sized, P> {
    fn random_fill(&mut self, modulus: &P, container: &mut M);
}

/// Default PRNG owned by every encryptor, key generator and evaluator.
/// Never shared: each instance (and each shallow copy) holds its own.
pub struct DefaultSecureRng {
    rng: ChaCha20Rng,
}

impl DefaultSecureRng {
    pub fn new() -> Self {
        DefaultSecureRng {
            rng: ChaCha20Rng::from_entropy(),
        }
    }
}

impl Default for DefaultSecureRng {
    fn default() -> Self {
        Self::new()
    }
}

impl NewWithSeed for DefaultSecureRng {
    type Seed = [u8; 32];
    fn new_with_seed(seed: Self::Seed) -> Self {
        DefaultSecureRng {
            rng: ChaCha20Rng::from_seed(seed),
        }
    }
}

impl DefaultSecureRng {
    /// Deterministic instance for reproducible key material and tests.
    pub fn new_seeded(seed: [u8; 32]) -> Self {
        Self::new_with_seed(seed)
    }
}

impl RngCore for DefaultSecureRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

impl CryptoRng for DefaultSecureRng {}

impl RandomFillUniformInModulus<[u64], u64> for DefaultSecureRng {
    fn random_fill(&mut self, modulus: &u64, container: &mut [u64]) {
        container
            .iter_mut()
            .for_each(|v| *v = self.rng.gen_range(0..*modulus));
    }
}

/// Secret / error distributions understood by the samplers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum Distribution {
    /// Ternary with exactly `hamming_weight` nonzero coefficients.
    Ternary { hamming_weight: usize },
    /// Ternary where each coefficient is zero with probability `zero_prob`
    /// and otherwise uniformly signed.
    TernaryDensity { zero_prob: f64 },
    /// Rounded Gaussian of the given standard deviation.
    DiscreteGaussian { std: f64 },
}

/// Draws `len` signed coefficients from `dist`. Total: never fails.
pub(crate) fn sample_distribution_i64<R: Rng>(
    dist: &Distribution,
    len: usize,
    rng: &mut R,
) -> Vec<i64> {
    match dist {
        Distribution::Ternary { hamming_weight } => {
            let mut s = vec![0i32; len];
            fill_random_ternary_secret_with_hamming_weight(&mut s, *hamming_weight, rng);
            s.iter().map(|v| *v as i64).collect()
        }
        Distribution::TernaryDensity { zero_prob } => (0..len)
            .map(|_| {
                if rng.gen::<f64>() < *zero_prob {
                    0
                } else if rng.gen::<bool>() {
                    1
                } else {
                    -1
                }
            })
            .collect(),
        Distribution::DiscreteGaussian { std } => {
            let normal = Normal::new(0.0f64, *std).unwrap();
            (0..len).map(|_| normal.sample(rng).round() as i64).collect()
        }
    }
}

/// Centered rounded-Gaussian error generator for LWE encodings.
pub struct GaussianErrorSampler {
    normal: Normal<f64>,
}

impl GaussianErrorSampler {
    pub fn new(std: f64) -> Self {
        GaussianErrorSampler {
            normal: Normal::new(0.0, std).unwrap(),
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> i64 {
        self.normal.sample(rng).round() as i64
    }
}
