use crate::computation::{Continuation, Entry};
use crate::coroutine::{self, ActiveStrategy, Strategy, StrategyResult};
use crate::error::InferenceError;
use crate::marginal::Delta;
use crate::rng::with_rng;
use crate::value::Value;

/// Draws one sample, no bookkeeping beyond the final return value (spec.md
/// §4.4). "On entry: install self, invoke the user computation with `exit`
/// as its initial continuation" is satisfied by [`forward`] pushing this
/// strategy and handing the same `Entry` to [`coroutine::run_trampoline`].
pub(crate) struct ForwardStrategy {
    result: Option<Value>,
}

impl ForwardStrategy {
    pub fn new() -> Self {
        Self { result: None }
    }
}

impl Strategy for ForwardStrategy {
    fn sample(&mut self, dist: crate::erp::ErpRef, params: Vec<Value>, next: Continuation) -> Result<StrategyResult, InferenceError> {
        let v = with_rng(|rng| dist.sample(&params, rng))?;
        Ok(StrategyResult::Continue(next(v)))
    }

    fn factor(&mut self, _log_weight: f64, _next: Continuation) -> Result<StrategyResult, InferenceError> {
        Err(InferenceError::FactorOutsideInference)
    }

    fn exit(&mut self, value: Value) -> Result<StrategyResult, InferenceError> {
        self.result = Some(value);
        Ok(StrategyResult::Done)
    }
}

/// `Forward(k, userFn)` from spec.md §6: run the program once under prior
/// sampling and hand back the delta ERP at its return value. Collapses the
/// outer continuation `k` into an ordinary return, per SPEC_FULL.md §3.
pub fn forward(entry: Entry) -> Result<Delta, InferenceError> {
    log::info!("forward sampling starting");
    coroutine::push(ActiveStrategy::Forward(ForwardStrategy::new()));
    let outcome = coroutine::run_trampoline(&entry);
    let popped = coroutine::pop();
    outcome?;
    let result = match popped {
        ActiveStrategy::Forward(strategy) => strategy
            .result
            .map(Delta::new)
            .ok_or(InferenceError::EmptyPosterior),
        _ => unreachable!("coroutine stack corrupted: expected Forward strategy on top"),
    };
    if result.is_ok() {
        log::info!("forward sampling finished");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BernoulliErp;
    use crate::computation::sample_step;
    use crate::erp::Erp;
    use std::sync::Arc;

    #[test]
    fn forward_factor_is_rejected() {
        let entry: Entry = std::rc::Rc::new(|| crate::computation::factor_step(0.0, |_| crate::computation::exit_step(Value::Unit)));
        let err = forward(entry).unwrap_err();
        assert!(matches!(err, InferenceError::FactorOutsideInference));
    }

    #[test]
    fn forward_produces_a_delta_at_the_drawn_value() {
        let dist: crate::erp::ErpRef = Arc::new(BernoulliErp);
        let entry: Entry = std::rc::Rc::new(move || sample_step(dist.clone(), vec![Value::Real(1.0)], crate::computation::exit_step));
        let delta = forward(entry).unwrap();
        assert_eq!(delta.value(), &Value::Bool(true));
        assert_eq!(delta.score(&[], &Value::Bool(true)).unwrap(), 0.0);
        assert_eq!(delta.score(&[], &Value::Bool(false)).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn coroutine_slot_is_restored_after_forward() {
        let dist: crate::erp::ErpRef = Arc::new(BernoulliErp);
        let entry: Entry = std::rc::Rc::new(move || sample_step(dist.clone(), vec![Value::Real(1.0)], crate::computation::exit_step));
        forward(entry).unwrap();
        let err = forward(std::rc::Rc::new(|| crate::computation::factor_step(0.0, |_| crate::computation::exit_step(Value::Unit))))
            .unwrap_err();
        // Forward itself rejects factor, independent of restoration, but a
        // bare top-level factor dispatch must also raise post-restoration.
        assert!(matches!(err, InferenceError::FactorOutsideInference));
    }

    /// spec.md §8 end-to-end scenario 1: `Forward(cc, fn)` where `fn(k) =
    /// k(Bernoulli.sample([0.7]))` repeated 10000x yields an empirical mean
    /// in [0.685, 0.715].
    #[test]
    fn repeated_forward_sampling_matches_bernoulli_mean() {
        crate::rng::seed(12345);
        let dist: crate::erp::ErpRef = Arc::new(BernoulliErp);
        let draws = crate::util::repeat(10_000, || {
            let dist = dist.clone();
            let entry: Entry = std::rc::Rc::new(move || sample_step(dist.clone(), vec![Value::Real(0.7)], crate::computation::exit_step));
            forward(entry).unwrap().value().as_bool().unwrap()
        });
        let mean = draws.iter().filter(|&&b| b).count() as f64 / draws.len() as f64;
        assert!((0.685..=0.715).contains(&mean), "empirical mean {mean} outside tolerance");
    }
}
