use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use moonboot::{
    all_galois_elements, encode, gen_blind_rotation_key, init_identity_test_poly,
    BlindRotationEvaluator, DefaultSecureRng, Distribution, LweEncryptor, LweParameters,
    LweSecret, NgswEncryptor, NgswEvaluator, NgswKeyGenerator, NtruEncryptor, NtruKeyGenerator,
    RingParameters, RingParametersLiteral,
};

fn params_n1024() -> Arc<RingParameters> {
    Arc::new(
        RingParameters::new(RingParametersLiteral {
            log_n: 10,
            q: vec![995329],
            base2_log: 3,
            xe: Distribution::Ternary { hamming_weight: 50 },
            xs: Distribution::Ternary {
                hamming_weight: 512,
            },
        })
        .unwrap(),
    )
}

fn bench_external_product(c: &mut Criterion) {
    let params = params_n1024();
    let mut kgen = NtruKeyGenerator::new(params.clone(), DefaultSecureRng::new_seeded([1; 32]));
    let pair = kgen.gen_secret_pair_new().unwrap();
    let f_inv = Arc::new(pair.f_inv.clone());

    let mut enc = NtruEncryptor::new(
        params.clone(),
        f_inv.clone(),
        DefaultSecureRng::new_seeded([2; 32]),
    )
    .unwrap();
    let mut ngsw_enc = NgswEncryptor::new(
        params.clone(),
        f_inv.clone(),
        DefaultSecureRng::new_seeded([3; 32]),
    )
    .unwrap();

    let ring = params.ring();
    let mut mono = ring.new_monomial(5);
    ring.ntt(&mut mono);
    let ngsw = ngsw_enc.encrypt_new(Some(&mono));
    let ct = enc.encrypt_zero_new();

    let gks = Arc::new(
        NgswKeyGenerator::new(params.clone(), f_inv, DefaultSecureRng::new_seeded([4; 32]))
            .unwrap()
            .gen_galois_keys_new(&[3], &pair),
    );
    let mut eval = NgswEvaluator::new(params.clone(), gks);

    c.bench_function("external_product_n1024", |b| {
        b.iter(|| {
            let mut acc = ct.clone();
            eval.external_product(black_box(&mut acc), black_box(&ngsw)).unwrap();
            acc
        })
    });
}

fn bench_blind_rotation(c: &mut Criterion) {
    let params = params_n1024();
    let n_lwe = 512usize;
    let lwe_params = LweParameters::new(n_lwe, params.n() as u64, 4).unwrap();

    let mut kgen = NtruKeyGenerator::new(params.clone(), DefaultSecureRng::new_seeded([5; 32]));
    let pair = kgen.gen_secret_pair_new().unwrap();
    let f_inv = Arc::new(pair.f_inv.clone());

    let mut gk_gen = NgswKeyGenerator::new(
        params.clone(),
        f_inv.clone(),
        DefaultSecureRng::new_seeded([6; 32]),
    )
    .unwrap();
    let gks = Arc::new(gk_gen.gen_galois_keys_new(&all_galois_elements(params.n()), &pair));

    let mut srng = DefaultSecureRng::new_seeded([7; 32]);
    let lwe_sk = Arc::new(LweSecret::random(n_lwe / 2, n_lwe, &mut srng));
    let mut ngsw_enc = NgswEncryptor::new(
        params.clone(),
        f_inv,
        DefaultSecureRng::new_seeded([8; 32]),
    )
    .unwrap();
    let brk = gen_blind_rotation_key(&lwe_sk, &lwe_params, &mut ngsw_enc, &pair.f_inv);

    let mut eval =
        BlindRotationEvaluator::new(lwe_params, NgswEvaluator::new(params.clone(), gks)).unwrap();
    let test_poly = init_identity_test_poly(&lwe_params, params.ring());

    let mut lwe_enc = LweEncryptor::new(lwe_params, lwe_sk, DefaultSecureRng::new_seeded([9; 32]));
    let ct = lwe_enc.encrypt_new(encode(&lwe_params, 2, 0));

    c.bench_function("blind_rotation_n1024", |b| {
        b.iter(|| eval.blind_rotate(black_box(&ct), black_box(&test_poly), &brk).unwrap())
    });
}

criterion_group!(benches, bench_external_product, bench_blind_rotation);
criterion_main!(benches);
