use std::cell::RefCell;
use std::rc::Rc;

use crate::computation::{Continuation, Entry, ScoreFn, Step};
use crate::erp::ErpRef;
use crate::error::InferenceError;
use crate::rng::with_rng;
use crate::strategies::enumerate::EnumerationStrategy;
use crate::strategies::forward::ForwardStrategy;
use crate::strategies::particle_filter::ParticleFilterStrategy;
use crate::value::Value;

/// What a strategy hands back to the trampoline after interpreting one
/// `Step`: either "here is the next step to process" or "this run is
/// finished" (spec.md §4's per-strategy `exit` behavior).
pub(crate) enum StrategyResult {
    Continue(Step),
    Done,
}

/// The operations every inference strategy must answer (spec.md §4.2): how
/// it responds to a random draw, a factor, and program termination. This is
/// the Rust shape of the coroutine dispatch contract — `sample`/`factor`/
/// `exit` are "forwarded to `current.sample`/`current.factor`/`current.exit`"
/// exactly as spec.md describes, just without a global mutable singleton of
/// trait objects (see [`ActiveStrategy`] for why).
pub(crate) trait Strategy {
    fn sample(&mut self, dist: ErpRef, params: Vec<Value>, next: Continuation) -> Result<StrategyResult, InferenceError>;
    fn factor(&mut self, log_weight: f64, next: Continuation) -> Result<StrategyResult, InferenceError>;
    fn exit(&mut self, value: Value) -> Result<StrategyResult, InferenceError>;

    /// spec.md §4.2 `sampleWithFactor`: draw from `dist` and weight by
    /// `score_fn(v)` in one primitive. The default fallback decomposes into
    /// a plain draw followed by a `factor` call, which is semantically
    /// correct for every strategy that doesn't need to *order* branches by
    /// score before it sees them (forward, the particle filter, default).
    /// [`EnumerationStrategy`] overrides this because it does.
    fn sample_with_factor(
        &mut self,
        dist: ErpRef,
        params: Vec<Value>,
        score_fn: ScoreFn,
        next: Continuation,
    ) -> Result<StrategyResult, InferenceError> {
        let v = with_rng(|rng| dist.sample(&params, rng))?;
        let log_weight = (score_fn)(&v);
        let resumed: Continuation = Rc::new(move |_| (next)(v.clone()));
        self.factor(log_weight, resumed)
    }
}

/// The strategy installed when no inference call is in progress (spec.md
/// §3 "Coroutine slot": "Initialized to a default that passes sample through
/// and raises on factor").
#[derive(Debug, Default)]
struct DefaultStrategy;

impl Strategy for DefaultStrategy {
    fn sample(&mut self, dist: ErpRef, params: Vec<Value>, next: Continuation) -> Result<StrategyResult, InferenceError> {
        let v = with_rng(|rng| dist.sample(&params, rng))?;
        Ok(StrategyResult::Continue(next(v)))
    }
    fn factor(&mut self, _log_weight: f64, _next: Continuation) -> Result<StrategyResult, InferenceError> {
        Err(InferenceError::FactorOutsideInference)
    }
    fn exit(&mut self, _value: Value) -> Result<StrategyResult, InferenceError> {
        Ok(StrategyResult::Done)
    }
}

/// The closed set of strategies this engine supports (spec.md §2's three
/// strategies, plus the no-op default). A plain enum rather than
/// `Box<dyn Strategy>` in the coroutine stack: spec.md never asks for
/// user-extensible strategies, the set is fixed and small, and an enum lets
/// every top-level entry point (`forward`, `enumerate`, `particle_filter`)
/// recover its own concrete strategy's result after popping without
/// resorting to `Any`/downcasting.
pub(crate) enum ActiveStrategy {
    Default(DefaultStrategy),
    Forward(ForwardStrategy),
    Enumerate(EnumerationStrategy),
    Particles(ParticleFilterStrategy),
}

impl Strategy for ActiveStrategy {
    fn sample(&mut self, dist: ErpRef, params: Vec<Value>, next: Continuation) -> Result<StrategyResult, InferenceError> {
        match self {
            ActiveStrategy::Default(s) => s.sample(dist, params, next),
            ActiveStrategy::Forward(s) => s.sample(dist, params, next),
            ActiveStrategy::Enumerate(s) => s.sample(dist, params, next),
            ActiveStrategy::Particles(s) => s.sample(dist, params, next),
        }
    }
    fn factor(&mut self, log_weight: f64, next: Continuation) -> Result<StrategyResult, InferenceError> {
        match self {
            ActiveStrategy::Default(s) => s.factor(log_weight, next),
            ActiveStrategy::Forward(s) => s.factor(log_weight, next),
            ActiveStrategy::Enumerate(s) => s.factor(log_weight, next),
            ActiveStrategy::Particles(s) => s.factor(log_weight, next),
        }
    }
    fn exit(&mut self, value: Value) -> Result<StrategyResult, InferenceError> {
        match self {
            ActiveStrategy::Default(s) => s.exit(value),
            ActiveStrategy::Forward(s) => s.exit(value),
            ActiveStrategy::Enumerate(s) => s.exit(value),
            ActiveStrategy::Particles(s) => s.exit(value),
        }
    }
    fn sample_with_factor(
        &mut self,
        dist: ErpRef,
        params: Vec<Value>,
        score_fn: ScoreFn,
        next: Continuation,
    ) -> Result<StrategyResult, InferenceError> {
        match self {
            ActiveStrategy::Default(s) => s.sample_with_factor(dist, params, score_fn, next),
            ActiveStrategy::Forward(s) => s.sample_with_factor(dist, params, score_fn, next),
            ActiveStrategy::Enumerate(s) => s.sample_with_factor(dist, params, score_fn, next),
            ActiveStrategy::Particles(s) => s.sample_with_factor(dist, params, score_fn, next),
        }
    }
}

thread_local! {
    /// The process-wide (here: thread-local, since the engine is strictly
    /// single-threaded cooperative per spec.md §5) coroutine slot. Modeled
    /// as an explicit stack per spec.md §9's design note, not a raw global:
    /// every inference entry pushes, every exit pops, LIFO, and a strategy's
    /// saved-predecessor field is simply "whatever sits below it in this
    /// `Vec`" (spec.md §3's invariant).
    static STACK: RefCell<Vec<ActiveStrategy>> = RefCell::new(vec![ActiveStrategy::Default(DefaultStrategy)]);
}

/// Push a strategy onto the coroutine stack. Paired with [`pop`]; callers
/// must pop on every exit path, including errors (spec.md §7: "the coroutine
/// slot must be restored to its predecessor before the error is surfaced").
pub(crate) fn push(strategy: ActiveStrategy) {
    STACK.with(|stack| stack.borrow_mut().push(strategy));
}

pub(crate) fn pop() -> ActiveStrategy {
    STACK.with(|stack| stack.borrow_mut().pop().expect("coroutine stack must never be empty"))
}

fn dispatch_sample(dist: ErpRef, params: Vec<Value>, next: Continuation) -> Result<StrategyResult, InferenceError> {
    STACK.with(|stack| stack.borrow_mut().last_mut().expect("coroutine stack must never be empty").sample(dist, params, next))
}

fn dispatch_factor(log_weight: f64, next: Continuation) -> Result<StrategyResult, InferenceError> {
    STACK.with(|stack| stack.borrow_mut().last_mut().expect("coroutine stack must never be empty").factor(log_weight, next))
}

fn dispatch_exit(value: Value) -> Result<StrategyResult, InferenceError> {
    STACK.with(|stack| stack.borrow_mut().last_mut().expect("coroutine stack must never be empty").exit(value))
}

fn dispatch_sample_with_factor(
    dist: ErpRef,
    params: Vec<Value>,
    score_fn: ScoreFn,
    next: Continuation,
) -> Result<StrategyResult, InferenceError> {
    STACK.with(|stack| {
        stack
            .borrow_mut()
            .last_mut()
            .expect("coroutine stack must never be empty")
            .sample_with_factor(dist, params, score_fn, next)
    })
}

/// Run a user computation to completion under whatever strategy is
/// currently installed, trampolining every resumption through a flat loop
/// (spec.md §5): the depth of native call frames accumulated across
/// resumptions is bounded by this one `loop`, regardless of how many times
/// the program suspends.
pub(crate) fn run_trampoline(entry: &Entry) -> Result<(), InferenceError> {
    let mut step = entry();
    loop {
        let result = match step {
            Step::Sample { dist, params, next } => dispatch_sample(dist, params, next)?,
            Step::Factor { log_weight, next } => dispatch_factor(log_weight, next)?,
            Step::SampleWithFactor { dist, params, score_fn, next } => dispatch_sample_with_factor(dist, params, score_fn, next)?,
            Step::Exit(value) => dispatch_exit(value)?,
        };
        match result {
            StrategyResult::Continue(next_step) => step = next_step,
            StrategyResult::Done => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BernoulliErp;
    use crate::computation::sample_step;
    use crate::strategies::forward::ForwardStrategy;
    use std::sync::Arc;

    #[test]
    fn coroutine_slot_restores_after_forward_run() {
        push(ActiveStrategy::Forward(ForwardStrategy::new()));
        let dist: ErpRef = Arc::new(BernoulliErp);
        let entry: Entry = Rc::new(move || sample_step(dist.clone(), vec![Value::Real(0.5)], Step::Exit));
        let outcome = run_trampoline(&entry);
        let popped = pop();
        assert!(outcome.is_ok());
        assert!(matches!(popped, ActiveStrategy::Forward(_)));

        // top-level factor, with the default strategy restored, must raise.
        let err = dispatch_factor(0.0, Rc::new(|_| Step::Exit(Value::Unit))).unwrap_err();
        assert!(matches!(err, InferenceError::FactorOutsideInference));
    }

    #[test]
    fn coroutine_slot_restores_even_on_enumeration_error() {
        use crate::builtins::GaussianErp;
        use crate::strategies::enumerate::{Discipline, EnumerationStrategy};
        push(ActiveStrategy::Enumerate(EnumerationStrategy::new(Discipline::LikelyFirst, 1000)));
        // Gaussian has no finite support: sampling from it under
        // enumeration must fail, and the stack must still be restored.
        let dist: ErpRef = Arc::new(GaussianErp);
        let entry: Entry = Rc::new(move || sample_step(dist.clone(), vec![Value::Real(0.0), Value::Real(1.0)], Step::Exit));
        let outcome = run_trampoline(&entry);
        let popped = pop();
        assert!(outcome.is_err());
        assert!(matches!(popped, ActiveStrategy::Enumerate(_)));

        let err = dispatch_factor(0.0, Rc::new(|_| Step::Exit(Value::Unit))).unwrap_err();
        assert!(matches!(err, InferenceError::FactorOutsideInference));
    }
}
