use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::backend::{Modulus, ShoupOps};
use crate::decomposer::{Decomposer, SignedDecomposer};
use crate::error::{Error, Result};
use crate::ngsw::{GaloisKeySet, NgswCiphertext};
use crate::ntru::NtruCiphertext;
use crate::parameters::RingParameters;
use crate::ring::{Poly, RingQ};
use crate::utils::bit_reverse_order;

/// 5^k mod 2N, the canonical trace automorphism elements.
pub(crate) fn galois_element(k: usize, two_n: u64) -> u64 {
    let mut out = 1u64;
    let mut base = 5u64 % two_n;
    let mut exp = k;
    while exp > 0 {
        if exp & 1 == 1 {
            out = ((out as u128 * base as u128) % two_n as u128) as u64;
        }
        base = ((base as u128 * base as u128) % two_n as u128) as u64;
        exp >>= 1;
    }
    out
}

/// Scratch for one external product; owned per evaluator instance.
struct EpScratch {
    inv_ntt: Poly,
    digit_cols: Vec<Vec<i64>>,
    digit_one: Vec<i64>,
    digit_poly: Poly,
    acc: Poly,
}

impl EpScratch {
    fn new(params: &RingParameters) -> Self {
        let ring = params.ring();
        let max_d = *params.gadget_counts().iter().max().unwrap();
        EpScratch {
            inv_ntt: ring.new_poly(),
            digit_cols: vec![vec![0i64; ring.n()]; max_d],
            digit_one: vec![0i64; max_d],
            digit_poly: ring.new_poly(),
            acc: ring.new_poly(),
        }
    }
}

/// Contracts `input_ntt` against the NGSW gadget: per chain prime, centered
/// signed-digit decomposition of the coefficient form, NTT of each digit,
/// Shoup-FMA against the matching key row. Result lands in `scratch.acc`
/// (plain NTT form).
fn external_product_core(
    ring: &RingQ,
    gadget: &[SignedDecomposer],
    ngsw: &NgswCiphertext,
    input_ntt: &Poly,
    scratch: &mut EpScratch,
) {
    scratch.inv_ntt.copy_from(input_ntt);
    ring.intt(&mut scratch.inv_ntt);
    scratch.acc.set_zero();

    for (i, dec) in gadget.iter().enumerate() {
        let d_i = dec.decomposition_count();

        for (w, x) in scratch.inv_ntt.row(i).iter().enumerate() {
            dec.decompose_into(*x, &mut scratch.digit_one[..d_i]);
            for j in 0..d_i {
                scratch.digit_cols[j][w] = scratch.digit_one[j];
            }
        }

        for j in 0..d_i {
            for (u, sub) in ring.subrings().iter().enumerate() {
                let row = scratch.digit_poly.row_mut(u);
                for (r, d) in row.iter_mut().zip(scratch.digit_cols[j].iter()) {
                    *r = sub.modop.map_i64_to_element(*d);
                }
                crate::ntt::Ntt::forward(&sub.nttop, row);
            }
            for (u, sub) in ring.subrings().iter().enumerate() {
                sub.modop.elwise_fma_shoup_mut(
                    scratch.acc.row_mut(u),
                    ngsw.value[i][j].row(u),
                    ngsw.value_shoup[i][j].row(u),
                    scratch.digit_poly.row(u),
                );
            }
        }
    }
}

/// Evaluator for NGSW-driven homomorphic operations on NTRU ciphertexts.
///
/// Key material and precomputed tables are shared across `shallow_copy`
/// instances; scratch buffers are owned exclusively. Two shallow copies can
/// run concurrently, one instance cannot.
pub struct NgswEvaluator {
    params: Arc<RingParameters>,
    gks: Arc<GaloisKeySet>,
    auto_index: Arc<HashMap<u64, Vec<u32>>>,
    xpow2: Arc<Vec<Poly>>,
    ep: EpScratch,
    buff_auto: Poly,
    buff_ct: NtruCiphertext,
}

impl NgswEvaluator {
    pub fn new(params: Arc<RingParameters>, gks: Arc<GaloisKeySet>) -> Self {
        let ring = params.ring();
        let auto_index = gks
            .elements()
            .map(|el| (el, ring.automorphism_index(el)))
            .collect();
        let xpow2 = ring.gen_x_pow_2();
        let ep = EpScratch::new(&params);
        let buff_auto = ring.new_poly();
        let buff_ct = NtruCiphertext::new(&params, 1);
        NgswEvaluator {
            params,
            gks,
            auto_index: Arc::new(auto_index),
            xpow2: Arc::new(xpow2),
            ep,
            buff_auto,
            buff_ct,
        }
    }

    pub fn params(&self) -> &Arc<RingParameters> {
        &self.params
    }

    pub fn galois_keys(&self) -> &Arc<GaloisKeySet> {
        &self.gks
    }

    pub fn shallow_copy(&self) -> Self {
        NgswEvaluator {
            params: self.params.clone(),
            gks: self.gks.clone(),
            auto_index: self.auto_index.clone(),
            xpow2: self.xpow2.clone(),
            ep: EpScratch::new(&self.params),
            buff_auto: self.params.ring().new_poly(),
            buff_ct: NtruCiphertext::new(&self.params, 1),
        }
    }

    /// ct <- ct (x) ngsw. The input may be a trivial (plaintext) ciphertext;
    /// the product is then a fresh encryption of plaintext times message.
    pub fn external_product(&mut self, ct: &mut NtruCiphertext, ngsw: &NgswCiphertext) -> Result<()> {
        if !ct.is_ntt {
            return Err(Error::FormatMismatch {
                op: "external_product",
                expected: "NTT",
            });
        }
        ngsw.assert_shape(&self.params);
        let deg = ct.degree();
        external_product_core(
            self.params.ring(),
            self.params.gadget(),
            ngsw,
            &ct.value[deg],
            &mut self.ep,
        );
        std::mem::swap(&mut ct.value[deg], &mut self.ep.acc);
        Ok(())
    }

    /// ct <- phi_k(ct): slot permutation of the encrypted polynomial
    /// followed by an external product against the galois key for k.
    pub fn automorphism(&mut self, ct: &mut NtruCiphertext, gal_el: u64) -> Result<()> {
        if gal_el == 1 {
            return Ok(());
        }
        if !ct.is_ntt {
            return Err(Error::FormatMismatch {
                op: "automorphism",
                expected: "NTT",
            });
        }
        let gk = self.gks.get(gal_el)?;
        let index = self
            .auto_index
            .get(&gal_el)
            .expect("index tables cover every installed galois key");

        let deg = ct.degree();
        self.params
            .ring()
            .automorphism_ntt_into(&ct.value[deg], index, &mut self.buff_auto);
        external_product_core(
            self.params.ring(),
            self.params.gadget(),
            &gk.ct,
            &self.buff_auto,
            &mut self.ep,
        );
        std::mem::swap(&mut ct.value[deg], &mut self.ep.acc);
        Ok(())
    }

    /// Partial trace: adds phi_{5^{2^i}}(ct) for i in
    /// [log_slots, log N - 1), collapsing the slots above `log_slots`.
    pub fn trace(&mut self, ct: &mut NtruCiphertext, log_slots: usize) -> Result<()> {
        let ring_n = self.params.n();
        let log_n = self.params.log_n();
        let two_n = 2 * ring_n as u64;

        for i in log_slots..log_n.saturating_sub(1) {
            let gal = galois_element(1 << i, two_n);
            let mut tmp = ct.clone();
            self.automorphism(&mut tmp, gal)?;
            let deg = ct.degree();
            self.params.ring().add_assign(&mut ct.value[deg], &tmp.value[deg]);
        }

        if log_slots == 0 {
            let mut tmp = ct.clone();
            self.automorphism(&mut tmp, two_n - 1)?;
            let deg = ct.degree();
            self.params.ring().add_assign(&mut ct.value[deg], &tmp.value[deg]);
        }

        Ok(())
    }

    /// Merges a family of p rotated accumulators into one ciphertext whose
    /// plaintext aggregates all p test polynomials: bit-reversal ordered
    /// pairwise butterflies with an automorphism of 2^level + 1 per level,
    /// a trace erasing the aliasing, and X^{2^k} padding to fill the N
    /// slots.
    pub fn combine_test_polynomials(
        &mut self,
        cts: Vec<NtruCiphertext>,
        p: usize,
    ) -> Result<NtruCiphertext> {
        assert!(p.is_power_of_two() && p >= 2 && cts.len() == p);
        let ring = self.params.ring_arc();
        let log_n = self.params.log_n();
        let log_p = p.trailing_zeros() as usize;
        let inv_n = ring.inv_mod_chain(ring.n() as u64);

        let mut queue: VecDeque<NtruCiphertext> = VecDeque::with_capacity(p);
        for idx in bit_reverse_order(p) {
            let mut ct = cts[idx].clone();
            if !ct.is_ntt {
                return Err(Error::FormatMismatch {
                    op: "combine_test_polynomials",
                    expected: "NTT",
                });
            }
            // pre-scale by N^-1; the butterfly/trace cascade multiplies the
            // aggregate back up by N
            ring.intt(&mut ct.value[1]);
            ring.scalar_mul_rows_assign(&mut ct.value[1], &inv_n);
            ring.ntt(&mut ct.value[1]);
            queue.push_back(ct);
        }

        let mut level = 1usize;
        while queue.len() > 1 {
            let pairs = queue.len() / 2;
            let twist = self.xpow2[log_n - level].clone();
            for _ in 0..pairs {
                let mut even = queue.pop_front().expect("queue length is even");
                let mut odd = queue.pop_front().expect("queue length is even");

                // odd * X^{N / 2^level}
                ring.mul_assign(&mut odd.value[1], &twist);

                // ct1 = even + odd', even = even - odd'
                self.buff_ct.value[1].copy_from(&even.value[1]);
                ring.add_assign(&mut self.buff_ct.value[1], &odd.value[1]);
                ring.sub_assign(&mut even.value[1], &odd.value[1]);

                // interleave halves: phi_{2^level + 1}(even - odd') + ct1
                self.automorphism(&mut even, (1u64 << level) + 1)?;
                let sum = self.buff_ct.value[1].clone();
                ring.add_assign(&mut even.value[1], &sum);
                queue.push_back(even);
            }
            level += 1;
        }

        let mut fin = queue.pop_front().expect("queue holds the merged result");
        self.trace(&mut fin, log_p.saturating_sub(1))?;

        // spread the length-p sequence across the N slots
        for i in 1..log_n - log_p {
            let mut shifted = fin.value[1].clone();
            ring.mul_assign(&mut shifted, &self.xpow2[i]);
            ring.add_assign(&mut fin.value[1], &shifted);
        }

        Ok(fin)
    }
}
