use std::rc::Rc;

use crate::erp::ErpRef;
use crate::value::Value;

/// A first-class resumption (spec.md §3 "Continuation"): consumes one
/// `Value`, produces the next [`Step`]. Re-entrant by construction — an
/// `Rc<dyn Fn>` can be invoked any number of times with different values,
/// which is exactly what enumeration's branching and the particle filter's
/// resampling require ("the same continuation may be invoked multiple
/// times").
///
/// This realizes option "(b)" from spec.md §9's design note: a tagged-variant
/// step value rather than a stackful coroutine or a hand-rolled state
/// machine, because re-entry and resampling reduce to a plain `Rc::clone`.
pub type Continuation = Rc<dyn Fn(Value) -> Step>;

/// A zero-argument thunk that produces the very first `Step` of a user
/// computation. The particle filter calls this once per particle (spec.md
/// §9's redesign note 3): invoking it more than once must be safe, i.e. a
/// computation must not carry mutable state across entries.
pub type Entry = Rc<dyn Fn() -> Step>;

pub type ScoreFn = Rc<dyn Fn(&Value) -> f64>;

/// The reified suspension point of a user computation (spec.md §3
/// "Computation"): the engine never sees raw user code, only the next thing
/// it asked to do.
#[derive(Clone)]
pub enum Step {
    Sample {
        dist: ErpRef,
        params: Vec<Value>,
        next: Continuation,
    },
    Factor {
        log_weight: f64,
        next: Continuation,
    },
    /// spec.md §4.2's `sampleWithFactor`: draw and weight atomically. Kept
    /// as its own `Step` variant (not decomposed into `Sample` then
    /// `Factor` at construction time) precisely so the currently installed
    /// strategy sees both the distribution and the score function together
    /// before deciding anything — which is what lets `EnumerationStrategy`
    /// override the combined operation instead of only the default
    /// decomposition (see `coroutine::Strategy::sample_with_factor`).
    SampleWithFactor {
        dist: ErpRef,
        params: Vec<Value>,
        score_fn: ScoreFn,
        next: Continuation,
    },
    Exit(Value),
}

/// Build the `Step` a user program emits to request a draw from `dist`.
pub fn sample_step(dist: ErpRef, params: Vec<Value>, next: impl Fn(Value) -> Step + 'static) -> Step {
    Step::Sample { dist, params, next: Rc::new(next) }
}

/// Build the `Step` a user program emits to add `log_weight` to its score.
pub fn factor_step(log_weight: f64, next: impl Fn(Value) -> Step + 'static) -> Step {
    Step::Factor { log_weight, next: Rc::new(next) }
}

/// Build the `Step` a user program emits to draw from `dist` and weight the
/// result by `score_fn` in one primitive (spec.md §4.2 `sampleWithFactor`).
pub fn sample_with_factor_step(
    dist: ErpRef,
    params: Vec<Value>,
    score_fn: impl Fn(&Value) -> f64 + 'static,
    next: impl Fn(Value) -> Step + 'static,
) -> Step {
    Step::SampleWithFactor { dist, params, score_fn: Rc::new(score_fn), next: Rc::new(next) }
}

/// Build the terminal `Step` a user program emits to return `value`.
pub fn exit_step(value: Value) -> Step {
    Step::Exit(value)
}
