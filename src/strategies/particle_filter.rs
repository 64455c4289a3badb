use crate::computation::{Continuation, Entry};
use crate::coroutine::{self, ActiveStrategy, Strategy, StrategyResult};
use crate::erp::ErpRef;
use crate::error::InferenceError;
use crate::marginal::{Marginal, MarginalBuilder};
use crate::rng::with_rng;
use crate::util::{logsumexp, multinomial_sample};
use crate::value::Value;

/// One in-flight copy of the user computation (spec.md §3 "Particle"):
/// `resumption` is `None` until this particle's first `factor`, meaning
/// "hasn't been started yet" — [`ParticleFilterStrategy::advance`] treats
/// that as a signal to invoke the shared entry point rather than resume a
/// stored continuation (spec.md §9's redesign note: the engine calls the
/// entry point once per particle, not once shared across all of them).
#[derive(Clone)]
struct Particle {
    log_weight: f64,
    value: Option<Value>,
    resumption: Option<Continuation>,
}

impl Particle {
    fn new() -> Self {
        Self { log_weight: 0.0, value: None, resumption: None }
    }
}

/// N interleaved copies of the user computation, synchronized at each
/// `factor` with residual resampling (spec.md §4.6). Relies on the ordering
/// invariant spec.md §5 states explicitly: "all particles reach the k-th
/// factor before any reaches the (k+1)-th" — so a particle is either
/// unstarted or holds a pending resumption whenever it is this strategy's
/// turn to advance it; it is never asked to resume after it has already
/// exited.
pub(crate) struct ParticleFilterStrategy {
    entry: Entry,
    particles: Vec<Particle>,
    active: usize,
    n: usize,
    result: Option<Marginal>,
}

impl ParticleFilterStrategy {
    pub fn new(entry: Entry, n: usize) -> Self {
        Self { entry, particles: (0..n).map(|_| Particle::new()).collect(), active: 0, n, result: None }
    }

    fn advance(&mut self) -> Result<StrategyResult, InferenceError> {
        match self.particles[self.active].resumption.take() {
            Some(k) => Ok(StrategyResult::Continue(k(Value::Unit))),
            None => Ok(StrategyResult::Continue((self.entry)())),
        }
    }

    /// Residual resampling (Liu 2001 §3.4.4; spec.md §4.6): deterministically
    /// retain `floor(exp(log N + w_j - W))` copies of each particle, then
    /// fill the remaining `K = N - Σretained` slots by multinomial sampling
    /// against the residual weights, and reset every surviving particle's
    /// log-weight to `W - log N` so the ensemble's total mass is preserved.
    ///
    /// `W == -inf` means every particle died at this factor (an
    /// over-conditioned program) — there is no ensemble left to resample, so
    /// this is the particle-filter's EmptyPosterior case (spec.md §7).
    fn resample(&mut self) -> Result<(), InferenceError> {
        let n = self.n;
        let log_weights: Vec<f64> = self.particles.iter().map(|p| p.log_weight).collect();
        let w = logsumexp(&log_weights);
        if w == f64::NEG_INFINITY {
            return Err(InferenceError::EmptyPosterior);
        }
        let expected: Vec<f64> = log_weights.iter().map(|&lw| ((n as f64).ln() + lw - w).exp()).collect();
        let retained: Vec<usize> = expected.iter().map(|&e| e.floor() as usize).collect();

        let mut resampled = Vec::with_capacity(n);
        for (j, &count) in retained.iter().enumerate() {
            for _ in 0..count {
                resampled.push(self.particles[j].clone());
            }
        }

        let k = n.saturating_sub(resampled.len());
        if k > 0 {
            let residual: Vec<f64> = expected.iter().zip(retained.iter()).map(|(&e, &r)| (e - r as f64).max(0.0)).collect();
            for _ in 0..k {
                let j = with_rng(|rng| multinomial_sample(&residual, rng));
                resampled.push(self.particles[j].clone());
            }
        }

        let uniform_log_weight = w - (n as f64).ln();
        for particle in &mut resampled {
            particle.log_weight = uniform_log_weight;
        }
        log::debug!("particle filter resampled {n} particle(s), log total weight {w:.4}");
        self.particles = resampled;
        Ok(())
    }
}

impl Strategy for ParticleFilterStrategy {
    fn sample(&mut self, dist: ErpRef, params: Vec<Value>, next: Continuation) -> Result<StrategyResult, InferenceError> {
        let v = with_rng(|rng| dist.sample(&params, rng))?;
        Ok(StrategyResult::Continue(next(v)))
    }

    fn factor(&mut self, log_weight: f64, next: Continuation) -> Result<StrategyResult, InferenceError> {
        let i = self.active;
        self.particles[i].log_weight += log_weight;
        self.particles[i].resumption = Some(next);
        if i == self.n - 1 {
            self.resample()?;
            self.active = 0;
        } else {
            self.active = i + 1;
        }
        self.advance()
    }

    fn exit(&mut self, value: Value) -> Result<StrategyResult, InferenceError> {
        let i = self.active;
        self.particles[i].value = Some(value);
        if i == self.n - 1 {
            let mut builder = MarginalBuilder::new();
            for particle in &self.particles {
                let v = particle.value.clone().expect("every particle must record a value by the time the last one exits");
                builder.add(v, 1.0);
            }
            self.result = Some(builder.build()?);
            log::info!("particle filter finished: {} particle(s) exited", self.n);
            Ok(StrategyResult::Done)
        } else {
            self.active = i + 1;
            self.advance()
        }
    }
}

/// `ParticleFilter(k, userFn, N)` from spec.md §6.
pub fn particle_filter(entry: Entry, n: usize) -> Result<Marginal, InferenceError> {
    if n == 0 {
        return Err(InferenceError::DegenerateParameters("particle_filter requires n > 0".into()));
    }
    log::info!("particle filter starting: n={n}");
    coroutine::push(ActiveStrategy::Particles(ParticleFilterStrategy::new(entry.clone(), n)));
    let outcome = coroutine::run_trampoline(&entry);
    let popped = coroutine::pop();
    outcome?;
    match popped {
        ActiveStrategy::Particles(strategy) => strategy.result.ok_or(InferenceError::EmptyPosterior),
        _ => unreachable!("coroutine stack corrupted: expected Particles strategy on top"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BernoulliErp;
    use crate::computation::{exit_step, factor_step, sample_step};
    use crate::strategies::enumerate::{enumerate, Discipline};
    use std::rc::Rc;
    use std::sync::Arc;

    fn two_coins_program() -> Entry {
        let bernoulli: ErpRef = Arc::new(BernoulliErp);
        Rc::new(move || {
            let b1 = bernoulli.clone();
            let b2 = bernoulli.clone();
            sample_step(b1, vec![Value::Real(0.5)], move |v1| {
                let b2 = b2.clone();
                sample_step(b2, vec![Value::Real(0.5)], move |v2| {
                    let log_weight = if v1 == v2 { 0.0 } else { f64::NEG_INFINITY };
                    let v1 = v1.clone();
                    factor_step(log_weight, move |_| exit_step(Value::Tuple(vec![v1.clone(), v2.clone()])))
                })
            })
        })
    }

    fn total_variation_distance(a: &Marginal, b: &Marginal) -> f64 {
        let mut keys: Vec<Value> = a.probabilities().iter().map(|(v, _)| v.clone()).collect();
        for (v, _) in b.probabilities() {
            if !keys.contains(v) {
                keys.push(v.clone());
            }
        }
        0.5 * keys.iter().map(|k| (a.probability_of(k) - b.probability_of(k)).abs()).sum::<f64>()
    }

    #[test]
    fn particle_filter_particle_count_is_n_after_every_resample() {
        crate::rng::seed(42);
        let marginal = particle_filter(two_coins_program(), 50).unwrap();
        assert!((marginal.probabilities().iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn particle_filter_converges_to_the_enumeration_marginal_as_n_grows() {
        crate::rng::seed(7);
        let exact = enumerate(two_coins_program(), Discipline::LikelyFirst, 1000).unwrap();
        let tv_10 = total_variation_distance(&exact, &particle_filter(two_coins_program(), 10).unwrap());
        let tv_1000 = total_variation_distance(&exact, &particle_filter(two_coins_program(), 1000).unwrap());
        assert!(tv_1000 <= tv_10 + 0.2, "tv_10={tv_10} tv_1000={tv_1000}");
        assert!(tv_1000 < 0.05, "tv_1000={tv_1000}");
    }

    #[test]
    fn zero_particles_is_degenerate() {
        let err = particle_filter(two_coins_program(), 0).unwrap_err();
        assert!(matches!(err, InferenceError::DegenerateParameters(_)));
    }

    /// Every particle factors in `NEG_INFINITY` at the same barrier (the
    /// over-conditioned case: no execution can satisfy the condition), so the
    /// total weight `W` is `-inf` and resampling has nothing left to draw
    /// from. This must surface as `EmptyPosterior`, not panic.
    #[test]
    fn all_particles_dying_at_a_factor_is_empty_posterior() {
        let program: Entry = Rc::new(|| factor_step(f64::NEG_INFINITY, |_| exit_step(Value::Unit)));
        let err = particle_filter(program, 8).unwrap_err();
        assert!(matches!(err, InferenceError::EmptyPosterior));
    }

    /// The panic this guards against would unwind past `coroutine::pop()`;
    /// confirm the slot is still restored and a fresh run works afterward.
    #[test]
    fn coroutine_slot_is_restored_after_empty_posterior() {
        let dying: Entry = Rc::new(|| factor_step(f64::NEG_INFINITY, |_| exit_step(Value::Unit)));
        particle_filter(dying, 8).unwrap_err();
        let marginal = particle_filter(two_coins_program(), 16).unwrap();
        assert!((marginal.probabilities().iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
