use std::collections::{BinaryHeap, VecDeque};

use ordered_float::OrderedFloat;

use crate::computation::{Continuation, Entry, ScoreFn};
use crate::coroutine::{self, ActiveStrategy, Strategy, StrategyResult};
use crate::erp::ErpRef;
use crate::error::InferenceError;
use crate::marginal::{Marginal, MarginalBuilder};
use crate::value::Value;

/// The three frontier disciplines spec.md §4.5 names. `LikelyFirst` is the
/// default ("best-first").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "native", derive(clap::ValueEnum))]
pub enum Discipline {
    LikelyFirst,
    DepthFirst,
    BreadthFirst,
}

impl Default for Discipline {
    fn default() -> Self {
        Discipline::LikelyFirst
    }
}

/// A suspended enumeration branch awaiting resumption (spec.md §3
/// "Enumeration state"): the continuation to resume, the value to resume it
/// with, and the cumulative log-score accrued up to (and including) this
/// branch.
struct FrontierState {
    score: f64,
    value: Value,
    next: Continuation,
}

/// Orders frontier states for the best-first discipline: highest cumulative
/// score first, ties broken in favor of the earlier-pushed branch so that
/// runs are reproducible independent of `HashMap`/heap internals.
struct HeapEntry {
    state: FrontierState,
    seq: u64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.state.score == other.state.score && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        OrderedFloat(self.state.score).cmp(&OrderedFloat(other.state.score)).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The frontier queue abstraction spec.md §4.5 asks for (`enqueue`,
/// `dequeue`, `size`), implemented by the data structure each discipline
/// actually needs: a max-heap for best-first, a `Vec` used as a LIFO stack
/// for depth-first, a `VecDeque` for breadth-first FIFO order.
enum Frontier {
    Priority(BinaryHeap<HeapEntry>),
    Stack(Vec<FrontierState>),
    Queue(VecDeque<FrontierState>),
}

impl Frontier {
    fn new(discipline: Discipline) -> Self {
        match discipline {
            Discipline::LikelyFirst => Frontier::Priority(BinaryHeap::new()),
            Discipline::DepthFirst => Frontier::Stack(Vec::new()),
            Discipline::BreadthFirst => Frontier::Queue(VecDeque::new()),
        }
    }

    fn push(&mut self, state: FrontierState, seq: u64) {
        match self {
            Frontier::Priority(heap) => heap.push(HeapEntry { state, seq }),
            Frontier::Stack(stack) => stack.push(state),
            Frontier::Queue(queue) => queue.push_back(state),
        }
    }

    fn pop(&mut self) -> Option<FrontierState> {
        match self {
            Frontier::Priority(heap) => heap.pop().map(|entry| entry.state),
            Frontier::Stack(stack) => stack.pop(),
            Frontier::Queue(queue) => queue.pop_front(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Frontier::Priority(heap) => heap.is_empty(),
            Frontier::Stack(stack) => stack.is_empty(),
            Frontier::Queue(queue) => queue.is_empty(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Frontier::Priority(heap) => heap.len(),
            Frontier::Stack(stack) => stack.len(),
            Frontier::Queue(queue) => queue.len(),
        }
    }
}

/// Exhaustive (or `max_executions`-truncated) best-first/depth-first/
/// breadth-first exploration of every discrete branch (spec.md §4.5).
pub(crate) struct EnumerationStrategy {
    max_executions: usize,
    frontier: Frontier,
    score: f64,
    accumulator: MarginalBuilder,
    completed: usize,
    next_seq: u64,
    result: Option<Marginal>,
}

impl EnumerationStrategy {
    pub fn new(discipline: Discipline, max_executions: usize) -> Self {
        Self {
            frontier: Frontier::new(discipline),
            max_executions,
            score: 0.0,
            accumulator: MarginalBuilder::new(),
            completed: 0,
            next_seq: 0,
            result: None,
        }
    }

    /// Shared push-then-dequeue body for both `sample` and
    /// `sample_with_factor`: the only difference between the two is whether
    /// an extra per-branch score is folded in before ordering (spec.md
    /// §4.5's `extraScoreFn`, defaulting to the zero function for plain
    /// `sample`).
    fn branch(&mut self, dist: ErpRef, params: Vec<Value>, next: Continuation, extra: impl Fn(&Value) -> f64) -> Result<StrategyResult, InferenceError> {
        let support = dist.support(&params)?.ok_or(InferenceError::EnumerationUnsupported)?;
        for v in support {
            let branch_score = self.score + dist.score(&params, &v)? + extra(&v);
            let seq = self.next_seq;
            self.next_seq += 1;
            self.frontier.push(FrontierState { score: branch_score, value: v, next: next.clone() }, seq);
        }
        self.advance()
    }

    fn advance(&mut self) -> Result<StrategyResult, InferenceError> {
        // Usually non-empty immediately after a `branch` push, but a custom
        // ERP's `support` may legally enumerate zero values (spec.md §4.1
        // never requires a non-empty support) — that collapses to the same
        // "no path scored anything" situation as an empty posterior.
        let state = self.frontier.pop().ok_or(InferenceError::EmptyPosterior)?;
        self.score = state.score;
        Ok(StrategyResult::Continue((state.next)(state.value)))
    }
}

impl Strategy for EnumerationStrategy {
    fn sample(&mut self, dist: ErpRef, params: Vec<Value>, next: Continuation) -> Result<StrategyResult, InferenceError> {
        self.branch(dist, params, next, |_| 0.0)
    }

    fn factor(&mut self, log_weight: f64, next: Continuation) -> Result<StrategyResult, InferenceError> {
        self.score += log_weight;
        Ok(StrategyResult::Continue(next(Value::Unit)))
    }

    fn exit(&mut self, value: Value) -> Result<StrategyResult, InferenceError> {
        self.accumulator.add(value, self.score.exp());
        self.completed += 1;
        if !self.frontier.is_empty() && self.completed < self.max_executions {
            self.advance()
        } else {
            if !self.frontier.is_empty() {
                log::warn!(
                    "enumeration truncated at max_executions={} with {} branch(es) left unexplored",
                    self.max_executions,
                    self.frontier.len(),
                );
            }
            let accumulator = std::mem::replace(&mut self.accumulator, MarginalBuilder::new());
            self.result = Some(accumulator.build()?);
            log::info!("enumeration finished: {} execution(s) completed", self.completed);
            Ok(StrategyResult::Done)
        }
    }

    /// Overrides the trait default: the naive draw-then-factor decomposition
    /// would commit to one branch by drawing before the extra score is known
    /// for every branch, which is correct for the final marginal but wrong
    /// for best-first *ordering* once `max_executions` truncates the run
    /// (spec.md §9, the `Enumerate.sampleWithFactor` open question). Folding
    /// `extraScoreFn` into every branch's score before pushing keeps
    /// ordering faithful to the combined score.
    fn sample_with_factor(&mut self, dist: ErpRef, params: Vec<Value>, score_fn: ScoreFn, next: Continuation) -> Result<StrategyResult, InferenceError> {
        self.branch(dist, params, next, |v| (score_fn)(v))
    }
}

/// `Enumerate`/`EnumerateLikelyFirst`/`EnumerateDepthFirst`/
/// `EnumerateBreadthFirst` from spec.md §6, collapsed to a single entry
/// point parameterized by [`Discipline`] (`Enumerate` and
/// `EnumerateLikelyFirst` are the same discipline, per spec.md's alias).
pub fn enumerate(entry: Entry, discipline: Discipline, max_executions: usize) -> Result<Marginal, InferenceError> {
    log::info!("enumeration starting: discipline={discipline:?}, max_executions={max_executions}");
    coroutine::push(ActiveStrategy::Enumerate(EnumerationStrategy::new(discipline, max_executions)));
    let outcome = coroutine::run_trampoline(&entry);
    let popped = coroutine::pop();
    outcome?;
    match popped {
        ActiveStrategy::Enumerate(strategy) => strategy.result.ok_or(InferenceError::EmptyPosterior),
        _ => unreachable!("coroutine stack corrupted: expected Enumerate strategy on top"),
    }
}

pub fn enumerate_likely_first(entry: Entry, max_executions: usize) -> Result<Marginal, InferenceError> {
    enumerate(entry, Discipline::LikelyFirst, max_executions)
}

pub fn enumerate_depth_first(entry: Entry, max_executions: usize) -> Result<Marginal, InferenceError> {
    enumerate(entry, Discipline::DepthFirst, max_executions)
}

pub fn enumerate_breadth_first(entry: Entry, max_executions: usize) -> Result<Marginal, InferenceError> {
    enumerate(entry, Discipline::BreadthFirst, max_executions)
}
