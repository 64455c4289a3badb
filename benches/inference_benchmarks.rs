criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(20)
        .measurement_time(std::time::Duration::from_secs(2));
    targets =
        sampling_bernoulli_forward,
        enumerating_two_coins,
        enumerating_weighted_die,
        filtering_two_coins_particles,
}

fn two_coins() -> ppl_infer::Entry {
    std::rc::Rc::new(move || {
        let b1 = ppl_infer::erps::bernoulli_erp();
        ppl_infer::sample_step(b1, vec![ppl_infer::Value::Real(0.5)], move |v1| {
            let b2 = ppl_infer::erps::bernoulli_erp();
            ppl_infer::sample_step(b2, vec![ppl_infer::Value::Real(0.5)], move |v2| {
                let log_weight = if v1 == v2 { 0.0 } else { f64::NEG_INFINITY };
                let v1 = v1.clone();
                ppl_infer::factor_step(log_weight, move |_| {
                    ppl_infer::exit_step(ppl_infer::Value::Tuple(vec![v1.clone(), v2.clone()]))
                })
            })
        })
    })
}

fn weighted_die() -> ppl_infer::Entry {
    std::rc::Rc::new(move || {
        let dist = ppl_infer::erps::random_integer_erp();
        ppl_infer::sample_step(dist, vec![ppl_infer::Value::Int(3)], |i| {
            let weight = i.as_int().unwrap() as f64;
            ppl_infer::factor_step(weight, move |_| ppl_infer::exit_step(i.clone()))
        })
    })
}

fn sampling_bernoulli_forward(c: &mut criterion::Criterion) {
    c.bench_function("forward sample a single Bernoulli draw", |b| {
        let dist: ppl_infer::ErpRef = ppl_infer::erps::bernoulli_erp();
        let entry: ppl_infer::Entry = std::rc::Rc::new(move || {
            ppl_infer::sample_step(dist.clone(), vec![ppl_infer::Value::Real(0.5)], ppl_infer::exit_step)
        });
        b.iter(|| ppl_infer::forward(entry.clone()))
    });
}

fn enumerating_two_coins(c: &mut criterion::Criterion) {
    c.bench_function("enumerate two conditioned coins", |b| {
        b.iter(|| ppl_infer::enumerate(two_coins(), ppl_infer::Discipline::LikelyFirst, 1000))
    });
}

fn enumerating_weighted_die(c: &mut criterion::Criterion) {
    c.bench_function("enumerate a factor-weighted RandomInteger", |b| {
        b.iter(|| ppl_infer::enumerate(weighted_die(), ppl_infer::Discipline::LikelyFirst, 1000))
    });
}

fn filtering_two_coins_particles(c: &mut criterion::Criterion) {
    c.bench_function("particle filter, N=1000, two conditioned coins", |b| {
        b.iter(|| ppl_infer::particle_filter(two_coins(), 1000))
    });
}
