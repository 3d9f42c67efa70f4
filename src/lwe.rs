use std::sync::Arc;

use itertools::izip;
use rand::Rng;

use crate::decomposer::{Decomposer, SignedDecomposer};
use crate::error::{Error, Result};
use crate::ntru::NtruCiphertext;
use crate::parameters::LweParameters;
use crate::random::{DefaultSecureRng, GaussianErrorSampler, RandomFillUniformInModulus};
use crate::ring::RingQ;
use crate::utils::fill_random_ternary_secret_with_hamming_weight;

/// LWE ciphertext (A, B) with B - <A, s> = encoded message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LweCiphertext {
    pub a: Vec<u64>,
    pub b: u64,
}

impl LweCiphertext {
    pub fn zero(n: usize) -> Self {
        LweCiphertext {
            a: vec![0u64; n],
            b: 0,
        }
    }
}

#[derive(Clone)]
pub struct LweSecret {
    values: Vec<i32>,
}

impl LweSecret {
    pub fn random(hamming_weight: usize, n: usize, rng: &mut DefaultSecureRng) -> LweSecret {
        let mut values = vec![0i32; n];
        fill_random_ternary_secret_with_hamming_weight(&mut values, hamming_weight, rng);
        LweSecret { values }
    }

    /// Ternary secret where each coefficient is zero with probability
    /// `zero_prob`.
    pub fn random_with_density(zero_prob: f64, n: usize, rng: &mut DefaultSecureRng) -> LweSecret {
        let values = (0..n)
            .map(|_| {
                if rng.gen::<f64>() < zero_prob {
                    0
                } else if rng.gen::<bool>() {
                    1
                } else {
                    -1
                }
            })
            .collect();
        LweSecret { values }
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }
}

/// Encode(m, e) = (q/2p) m + e + q/4p mod q. The q/4p offset recenters the
/// rounding window so decoding tolerates errors up to +- q/4p.
pub fn encode(params: &LweParameters, m: u64, e: i64) -> u64 {
    let q = params.q();
    let err = e.rem_euclid(q as i64) as u64;
    (params.delta() * m + err + params.window()) % q
}

/// Decode maps the phase back to [0, 2p).
pub fn decode(params: &LweParameters, m_tilde: u64) -> u64 {
    let q = params.q();
    ((m_tilde + params.window()) % q) * 2 * params.p() / q
}

pub struct LweEncryptor {
    params: LweParameters,
    sk: Arc<LweSecret>,
    rng: DefaultSecureRng,
}

impl LweEncryptor {
    pub fn new(params: LweParameters, sk: Arc<LweSecret>, rng: DefaultSecureRng) -> Self {
        assert!(sk.values().len() >= params.n());
        LweEncryptor { params, sk, rng }
    }

    /// Encrypts an already encoded message (error included by the encoder).
    pub fn encrypt_new(&mut self, encoded_m: u64) -> LweCiphertext {
        let n = self.params.n();
        let q = self.params.q();
        let mut ct = LweCiphertext::zero(n);
        self.rng.random_fill(&q, &mut ct.a);

        let mut dot: i64 = 0;
        izip!(ct.a.iter(), self.sk.values().iter()).for_each(|(ai, si)| {
            if *si != 0 {
                dot += *ai as i64 * *si as i64;
            }
        });
        ct.b = (dot.rem_euclid(q as i64) as u64 + encoded_m) % q;
        ct
    }

    pub fn shallow_copy(&self) -> Self {
        LweEncryptor {
            params: self.params,
            sk: self.sk.clone(),
            rng: DefaultSecureRng::new(),
        }
    }
}

pub struct LweDecryptor {
    params: LweParameters,
    sk: Arc<LweSecret>,
}

impl LweDecryptor {
    pub fn new(params: LweParameters, sk: Arc<LweSecret>) -> Self {
        assert!(sk.values().len() >= params.n());
        LweDecryptor { params, sk }
    }

    /// Returns the noisy phase B - <A, s> mod q.
    pub fn decrypt_new(&self, ct: &LweCiphertext) -> u64 {
        let q = self.params.q();
        let mut dot: i64 = 0;
        izip!(ct.a.iter(), self.sk.values().iter()).for_each(|(ai, si)| {
            if *si != 0 {
                dot += *ai as i64 * *si as i64;
            }
        });
        (ct.b as i64 - dot).rem_euclid(q as i64) as u64
    }
}

/// Rescales every coordinate with the same rounding rule; mixing rules
/// between A and B accumulates decryption drift.
pub fn lwe_modulus_switch(ct: &LweCiphertext, from_q: u64, to_q: u64) -> LweCiphertext {
    let switch = |x: u64| -> u64 {
        (((x as u128 * to_q as u128 + (from_q as u128 >> 1)) / from_q as u128) % to_q as u128)
            as u64
    };
    LweCiphertext {
        a: ct.a.iter().map(|x| switch(*x)).collect(),
        b: switch(ct.b),
    }
}

/// Key switching key from the NTRU secret f (in coefficient view) to an LWE
/// secret s. For every f coefficient the key holds LWE samples of
/// v * B^j * f_i for all nonzero digits v, stored in a centered split.
pub struct LweKeySwitchKey {
    // keys[i][j][v-1] = LWE(v * B^j * f_i + e) for v in 1..B, where slots
    // v >= B/2 encode the negative digit -(v - B/2 + 1).
    keys: Vec<Vec<Vec<LweCiphertext>>>,
    decomposer: SignedDecomposer,
    params: LweParameters,
}

impl LweKeySwitchKey {
    pub fn base_log(&self) -> usize {
        self.decomposer.base_log()
    }

    pub fn decomposition_count(&self) -> usize {
        self.decomposer.decomposition_count()
    }

    pub fn params(&self) -> &LweParameters {
        &self.params
    }
}

/// d_KS = ceil(log2 Q_KS / log2 B_KS) + 1; the +1 absorbs the carry of the
/// signed decomposition.
fn key_switch_decomposition_count(q_ks: u64, base_log: usize) -> usize {
    let log_q = 64 - (q_ks - 1).leading_zeros() as usize;
    log_q.div_ceil(base_log) + 1
}

/// Generates the table-driven key switching key. `f` is the NTRU secret in
/// NTT form over `ring`; `enc` encrypts under the target LWE secret at the
/// key-switch modulus Q_KS.
pub fn lwe_ksk_keygen(
    base_log: usize,
    ring: &RingQ,
    f: &crate::ring::Poly,
    enc: &mut LweEncryptor,
    err_sampler: &GaussianErrorSampler,
) -> LweKeySwitchKey {
    let params = enc.params;
    let q_ks = params.q() as i64;
    let base = 1i64 << base_log;
    let d_ks = key_switch_decomposition_count(params.q(), base_log);
    let decomposer = SignedDecomposer::with_count(params.q(), base_log, d_ks);

    let mut f_coeff = f.clone();
    ring.intt(&mut f_coeff);
    let f_centered = ring.to_centered_i64(&f_coeff);

    let keys = f_centered
        .iter()
        .map(|f_i| {
            let mut cur_val = f_i.rem_euclid(q_ks);
            (0..d_ks)
                .map(|_| {
                    let row = (1..base)
                        .map(|v| {
                            let e = err_sampler.sample(&mut enc.rng);
                            let m = if v < base / 2 {
                                (cur_val * v + e).rem_euclid(q_ks)
                            } else {
                                (cur_val * (q_ks - (v - base / 2 + 1)) + e).rem_euclid(q_ks)
                            };
                            enc.encrypt_new(m as u64)
                        })
                        .collect::<Vec<_>>();
                    cur_val = (cur_val * base).rem_euclid(q_ks);
                    row
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    LweKeySwitchKey {
        keys,
        decomposer,
        params,
    }
}

/// Switches an NTRU ciphertext, read as an LWE ciphertext under the secret
/// f, to an LWE ciphertext under s at Q_KS. Deterministic; cannot fail once
/// the input is well formed.
pub fn lwe_key_switch(
    ct: &NtruCiphertext,
    ring: &RingQ,
    ksk: &LweKeySwitchKey,
) -> Result<LweCiphertext> {
    if !ct.is_ntt {
        return Err(Error::FormatMismatch {
            op: "lwe_key_switch",
            expected: "NTT",
        });
    }
    assert!(ksk.keys.len() == ring.n(), "key switching key ring degree mismatch");

    let params = ksk.params;
    let q_ks = params.q();
    let base = 1u64 << ksk.base_log();
    let n_ring = ring.n();

    let mut c_poly = ct.value[ct.value.len() - 1].clone();
    ring.intt(&mut c_poly);
    let scaled = ring.scale_coeffs_to(&c_poly, q_ks);

    let mut out = LweCiphertext::zero(params.n());
    let mut digits = vec![0i64; ksk.decomposition_count()];

    for i in 0..n_ring {
        // A_i are the coefficients of the negacyclic constant-term pairing
        // <c, f>: A_0 = c_0, A_i = -c_{N-i}.
        let a_i = if i == 0 {
            scaled[0] % q_ks
        } else {
            (q_ks - scaled[n_ring - i] % q_ks) % q_ks
        };
        if a_i == 0 {
            continue;
        }

        ksk.decomposer.decompose_into(a_i, &mut digits);
        for (j, d) in digits.iter().enumerate() {
            if *d == 0 {
                continue;
            }
            let slot = if *d > 0 {
                (*d - 1) as usize
            } else {
                (base / 2) as usize + (-*d) as usize - 2
            };
            let sample = &ksk.keys[i][j][slot];
            izip!(out.a.iter_mut(), sample.a.iter())
                .for_each(|(o, s)| *o = (*o + *s) % q_ks);
            out.b = (out.b + sample.b) % q_ks;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::NewWithSeed;
    use std::sync::Arc;

    fn seeded(tag: u8) -> DefaultSecureRng {
        DefaultSecureRng::new_with_seed([tag; 32])
    }

    #[test]
    fn decode_inverts_offset_free_phases() {
        // Decode inverts phases of the form delta*m + e (the shape produced
        // by bootstrapping); the q/4p offset added by encode is consumed by
        // the rotation, which indexes the center of the test polynomial
        // window.
        let params = LweParameters::new(64, 1024, 4).unwrap();
        for m in 0..2 * params.p() {
            for e in [-60i64, -7, 0, 9, 60] {
                let phase = (params.delta() * m).wrapping_add_signed(e) % params.q();
                assert_eq!(decode(&params, phase), m);
            }
        }
    }

    #[test]
    fn encode_centers_messages_inside_their_window() {
        let params = LweParameters::new(64, 1024, 4).unwrap();
        for m in 0..params.p() {
            let enc = encode(&params, m, 0);
            assert_eq!(enc, params.delta() * m + params.window());
        }
    }

    #[test]
    fn encrypt_decrypt_works() {
        let params = LweParameters::new(128, 1 << 12, 4).unwrap();
        let mut rng = seeded(1);
        let sk = Arc::new(LweSecret::random(64, params.n(), &mut rng));
        let mut enc = LweEncryptor::new(params, sk.clone(), seeded(2));
        let dec = LweDecryptor::new(params, sk);
        let errs = GaussianErrorSampler::new(3.2);
        let mut erng = seeded(3);

        for m in 0..params.p() {
            let ct = enc.encrypt_new(encode(&params, m, errs.sample(&mut erng)));
            let m_back = decode(&params, dec.decrypt_new(&ct));
            assert_eq!(m, m_back);
        }
    }

    #[test]
    fn modulus_switch_preserves_decryption() {
        let params = LweParameters::new(128, 1 << 16, 4).unwrap();
        let small = params.with_modulus(1 << 10).unwrap();
        let mut rng = seeded(4);
        let sk = Arc::new(LweSecret::random(64, params.n(), &mut rng));
        let mut enc = LweEncryptor::new(params, sk.clone(), seeded(5));
        let dec = LweDecryptor::new(small, sk);

        for m in 0..params.p() {
            let ct = enc.encrypt_new(encode(&params, m, 0));
            let ct_small = lwe_modulus_switch(&ct, params.q(), small.q());
            assert_eq!(decode(&small, dec.decrypt_new(&ct_small)), m);
        }
    }

    #[test]
    fn key_switch_tracks_the_constant_term_pairing() {
        let ring = RingQ::new(256, &[995329]).unwrap();
        let n_lwe = 64usize;
        let q_ks = 1u64 << 16;
        let params_ks = LweParameters::new(n_lwe, q_ks, 4).unwrap();

        let mut rng = seeded(6);
        let sk = Arc::new(LweSecret::random(32, n_lwe, &mut rng));
        let mut enc = LweEncryptor::new(params_ks, sk.clone(), seeded(7));
        let dec = LweDecryptor::new(params_ks, sk);
        let errs = GaussianErrorSampler::new(2.0);

        // ternary f, kept in NTT form like the NTRU secret
        let f_signed =
            crate::random::sample_distribution_i64(
                &crate::random::Distribution::Ternary { hamming_weight: 128 },
                ring.n(),
                &mut seeded(8),
            );
        let mut f = ring.poly_from_signed(&f_signed);
        ring.ntt(&mut f);

        let ksk = lwe_ksk_keygen(4, &ring, &f, &mut enc, &errs);

        // a ciphertext-like polynomial with a known pairing against f
        let mut c = ring.new_poly();
        let mut crng = seeded(9);
        RandomFillUniformInModulus::random_fill(&mut crng, &995329u64, c.row_mut(0));
        let mut c_ntt = c.clone();
        ring.ntt(&mut c_ntt);
        let ct = NtruCiphertext {
            value: vec![ring.new_poly(), c_ntt],
            is_ntt: true,
        };

        // expected phase: constant coefficient of c * f, rescaled to Q_KS
        let mut prod = ct.value[1].clone();
        ring.mul_assign(&mut prod, &f);
        ring.intt(&mut prod);
        let expected = ring.scale_coeffs_to(&prod, q_ks)[0];

        let ct_ks = lwe_key_switch(&ct, &ring, &ksk).unwrap();
        let got = dec.decrypt_new(&ct_ks);

        let diff = (got as i64 - expected as i64).rem_euclid(q_ks as i64);
        let centered = if diff > q_ks as i64 / 2 {
            diff - q_ks as i64
        } else {
            diff
        };
        assert!(
            centered.abs() < 600,
            "key switch noise too large: {centered}"
        );
    }
}
