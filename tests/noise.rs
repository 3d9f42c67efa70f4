//! Noise accounting for the rotation pipeline: decryption residuals after
//! blind rotation and after key switching stay well inside the decoding
//! margin at the test parameters.

use std::sync::Arc;

use moonboot::{
    all_galois_elements, encode, gen_blind_rotation_key, init_identity_test_poly, lwe_ksk_keygen,
    BlindRotationEvaluator, DefaultSecureRng, Distribution, GaussianErrorSampler, LweDecryptor,
    LweEncryptor, LweParameters, LweSecret, NgswEncryptor, NgswEvaluator, NgswKeyGenerator,
    NtruDecryptor, NtruKeyGenerator, RingParameters, RingParametersLiteral, Stats,
};

fn center(v: i64, q: u64) -> i64 {
    let r = v.rem_euclid(q as i64);
    if r > q as i64 / 2 {
        r - q as i64
    } else {
        r
    }
}

#[test]
fn rotation_and_key_switch_noise_stays_within_margin() {
    let params = Arc::new(
        RingParameters::new(RingParametersLiteral {
            log_n: 8,
            q: vec![786433],
            base2_log: 3,
            xe: Distribution::Ternary { hamming_weight: 8 },
            xs: Distribution::Ternary {
                hamming_weight: 128,
            },
        })
        .unwrap(),
    );
    let q_br = 786433u64;
    let n_lwe = 64usize;
    let p = 4u64;
    let lwe_params = LweParameters::new(n_lwe, params.n() as u64, p).unwrap();
    let ks_params = LweParameters::new(n_lwe, 1 << 13, p).unwrap();

    let seeded = |tag: u8| DefaultSecureRng::new_seeded([tag; 32]);

    let mut kgen = NtruKeyGenerator::new(params.clone(), seeded(60));
    let pair = kgen.gen_secret_pair_new().unwrap();
    let f = Arc::new(pair.f.clone());
    let f_inv = Arc::new(pair.f_inv.clone());

    let mut gk_gen = NgswKeyGenerator::new(params.clone(), f_inv.clone(), seeded(61)).unwrap();
    let gks = Arc::new(gk_gen.gen_galois_keys_new(&all_galois_elements(params.n()), &pair));

    let mut srng = seeded(62);
    let lwe_sk = Arc::new(LweSecret::random(n_lwe / 2, n_lwe, &mut srng));
    let mut ngsw_enc = NgswEncryptor::new(params.clone(), f_inv.clone(), seeded(63)).unwrap();
    let brk = gen_blind_rotation_key(&lwe_sk, &lwe_params, &mut ngsw_enc, &pair.f_inv);

    let mut ks_enc = LweEncryptor::new(ks_params, lwe_sk.clone(), seeded(64));
    let lksk = lwe_ksk_keygen(
        4,
        params.ring(),
        &pair.f.value,
        &mut ks_enc,
        &GaussianErrorSampler::new(2.0),
    );

    let mut eval =
        BlindRotationEvaluator::new(lwe_params, NgswEvaluator::new(params.clone(), gks)).unwrap();
    let test_poly = init_identity_test_poly(&lwe_params, params.ring());
    let ntru_dec = NtruDecryptor::new(params.clone(), f).unwrap();
    let ks_dec = LweDecryptor::new(ks_params, lwe_sk.clone());

    let mut enc = LweEncryptor::new(lwe_params, lwe_sk, seeded(65));
    let errs = GaussianErrorSampler::new(3.2);
    let mut erng = seeded(66);

    let delta_br = (q_br + p) / (2 * p);
    let delta_ks = ((ks_params.q() + p) / (2 * p)) as i64;
    let margin_br = (q_br / (4 * p)) as i64;
    let margin_ks = (ks_params.q() / (4 * p)) as i64;

    let mut br_stats = Stats::default();
    let mut ks_stats = Stats::default();

    for trial in 0..4 {
        for m in 0..p {
            let ct = enc.encrypt_new(encode(&lwe_params, m, errs.sample(&mut erng)));
            let acc = eval.blind_rotate(&ct, &test_poly, &brk).unwrap();

            let got_br = ntru_dec.decrypt_constant_new(&acc);
            let err_br = center(got_br - (delta_br * m) as i64, q_br);
            assert!(
                err_br.abs() < margin_br,
                "trial {trial} message {m}: rotation error {err_br}"
            );
            br_stats.add_more(&[err_br]);

            let ks = moonboot::lwe_key_switch(&acc, params.ring(), &lksk).unwrap();
            let err_ks = center(
                ks_dec.decrypt_new(&ks) as i64 - delta_ks * m as i64,
                ks_params.q(),
            );
            assert!(
                err_ks.abs() < margin_ks,
                "trial {trial} message {m}: key switch error {err_ks}"
            );
            ks_stats.add_more(&[err_ks]);
        }
    }

    // residuals behave like zero-mean noise far below the margins
    assert!(br_stats.mean().abs() < margin_br as f64 / 4.0);
    assert!(br_stats.std_dev() < margin_br as f64 / 4.0);
    assert!(ks_stats.mean().abs() < margin_ks as f64 / 2.0);
    assert!(ks_stats.std_dev() < margin_ks as f64 / 2.0);
}
