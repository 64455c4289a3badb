use rand::rngs::SmallRng;
use rand::Rng;

/// `sum`/`logsumexp` are, per spec.md §1, "general-purpose math utilities ...
/// specified only by [their] interface" — external collaborators the core
/// doesn't own. This crate has nowhere else to get them from, so they live
/// here as the small local stand-ins the residual-resampling arithmetic
/// (`strategies::particle_filter`) and a couple of tests need.
pub fn sum(xs: &[f64]) -> f64 {
    xs.iter().sum()
}

pub fn logsumexp(xs: &[f64]) -> f64 {
    match xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max) {
        m if m == f64::NEG_INFINITY => f64::NEG_INFINITY,
        m => m + xs.iter().map(|x| (x - m).exp()).sum::<f64>().ln(),
    }
}

/// Host-visible `multinomialSample(θ)` from spec.md §6: draw an index
/// proportional to the (unnormalized, non-negative) weights in `theta`.
///
/// Falls back to the last index with strictly positive weight rather than
/// whatever index the cumulative sum happened to stop at — this is the fix
/// for the fallthrough bug spec.md §9 documents: a draw landing past the sum
/// of a `theta` with trailing zeros must never land on a zero-weight index.
pub fn multinomial_sample(theta: &[f64], rng: &mut SmallRng) -> usize {
    let total: f64 = sum(theta);
    debug_assert!(total > 0.0, "multinomial_sample requires positive total weight");
    let draw = rng.random::<f64>() * total;
    let mut acc = 0.0;
    for (i, &w) in theta.iter().enumerate() {
        acc += w;
        if draw < acc && w > 0.0 {
            return i;
        }
    }
    theta
        .iter()
        .enumerate()
        .rev()
        .find(|(_, &w)| w > 0.0)
        .map(|(i, _)| i)
        .expect("at least one index must carry positive weight")
}

/// Run `f` `n` times, collecting every result — the host utility spec.md's
/// end-to-end scenario 1 ("repeated 10000x") assumes exists.
pub fn repeat<T>(n: usize, mut f: impl FnMut() -> T) -> Vec<T> {
    (0..n).map(|_| f()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn logsumexp_matches_naive_sum_in_log_space() {
        let xs = [0.0_f64, 1.0, 2.0];
        let naive = xs.iter().map(|x| x.exp()).sum::<f64>().ln();
        assert!((logsumexp(&xs) - naive).abs() < 1e-12);
    }

    #[test]
    fn multinomial_sample_never_lands_on_a_zero_weight_trailing_index() {
        let mut rng = SmallRng::seed_from_u64(7);
        let theta = [1.0, 0.0, 0.0];
        for _ in 0..1000 {
            assert_eq!(multinomial_sample(&theta, &mut rng), 0);
        }
    }

    #[test]
    fn repeat_collects_n_results() {
        let mut counter = 0;
        let results = repeat(5, || {
            counter += 1;
            counter
        });
        assert_eq!(results, vec![1, 2, 3, 4, 5]);
    }
}
