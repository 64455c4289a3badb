use rand::rngs::SmallRng;
use rand::Rng;

use crate::erp::Erp;
use crate::error::InferenceError;
use crate::value::Value;

/// Accumulates weighted return values over the course of one inference run
/// (spec.md §3 "Marginal accumulator"). Kept as an ordered `Vec` rather than
/// a hash map deliberately: spec.md §4.3 specifies both `sample` and `score`
/// as *linear scans in iteration order*, and the order keys are first seen
/// in must match the order complete paths finish in (spec.md §4.5) — a
/// property a hash map can't promise, and would be actively wrong to add as
/// an optimization here.
#[derive(Debug, Default)]
pub struct MarginalBuilder {
    entries: Vec<(Value, f64)>,
}

impl MarginalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to the bin for `value`, creating it if this is the first
    /// time `value` has completed (spec.md §4.5 "exit": "add exp(S) to the
    /// accumulator bin for key, creating it if absent, remembering r as
    /// representative").
    pub fn add(&mut self, value: Value, weight: f64) {
        if let Some((_, w)) = self.entries.iter_mut().find(|(v, _)| *v == value) {
            *w += weight;
        } else {
            self.entries.push((value, weight));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalize and wrap as a discrete ERP (spec.md §4.3): the sole
    /// publisher of marginal ERPs across all three strategies.
    pub fn build(self) -> Result<Marginal, InferenceError> {
        let z: f64 = self.entries.iter().map(|(_, w)| *w).sum();
        if !(z > 0.0) {
            return Err(InferenceError::EmptyPosterior);
        }
        let entries = self.entries.into_iter().map(|(v, w)| (v, w / z)).collect();
        Ok(Marginal { entries })
    }
}

/// A normalized discrete distribution over observed return values (spec.md
/// §3): `support` and `score` use deep structural comparison (`Value`'s
/// bitwise-exact `PartialEq`), `sample` draws by linear inverse-CDF scan.
#[derive(Debug, Clone)]
pub struct Marginal {
    entries: Vec<(Value, f64)>,
}

impl Marginal {
    pub fn probabilities(&self) -> &[(Value, f64)] {
        &self.entries
    }

    pub fn probability_of(&self, value: &Value) -> f64 {
        self.entries.iter().find(|(v, _)| v == value).map(|(_, p)| *p).unwrap_or(0.0)
    }
}

impl Erp for Marginal {
    fn sample(&self, _params: &[Value], rng: &mut SmallRng) -> Result<Value, InferenceError> {
        let draw: f64 = rng.random();
        let mut acc = 0.0;
        for (v, p) in &self.entries {
            acc += p;
            if draw < acc {
                return Ok(v.clone());
            }
        }
        Ok(self.entries.last().expect("marginal has at least one entry").0.clone())
    }

    fn score(&self, _params: &[Value], value: &Value) -> Result<f64, InferenceError> {
        Ok(self.probability_of(value).ln())
    }

    fn support(&self, _params: &[Value]) -> Result<Option<Vec<Value>>, InferenceError> {
        Ok(Some(self.entries.iter().map(|(v, _)| v.clone()).collect()))
    }
}

/// The point-mass ERP Forward sampling delivers (spec.md §4.4): scores 0 at
/// `r`, `-inf` elsewhere, and has no `support` — a single draw is not a
/// finite enumeration of the program's possible returns.
#[derive(Debug, Clone)]
pub struct Delta {
    value: Value,
}

impl Delta {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Erp for Delta {
    fn sample(&self, _params: &[Value], _rng: &mut SmallRng) -> Result<Value, InferenceError> {
        Ok(self.value.clone())
    }
    fn score(&self, _params: &[Value], value: &Value) -> Result<f64, InferenceError> {
        Ok(if *value == self.value { 0.0 } else { f64::NEG_INFINITY })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::with_rng;

    #[test]
    fn empty_accumulator_is_an_empty_posterior() {
        let builder = MarginalBuilder::new();
        assert!(matches!(builder.build(), Err(InferenceError::EmptyPosterior)));
    }

    #[test]
    fn all_zero_weight_entries_are_an_empty_posterior() {
        let mut builder = MarginalBuilder::new();
        builder.add(Value::Bool(true), 0.0);
        builder.add(Value::Bool(false), 0.0);
        assert!(matches!(builder.build(), Err(InferenceError::EmptyPosterior)));
    }

    #[test]
    fn build_normalizes_and_preserves_insertion_order() {
        let mut builder = MarginalBuilder::new();
        builder.add(Value::Int(0), 1.0);
        builder.add(Value::Int(1), 3.0);
        let marginal = builder.build().unwrap();
        let probs = marginal.probabilities();
        assert_eq!(probs[0].0, Value::Int(0));
        assert!((probs[0].1 - 0.25).abs() < 1e-12);
        assert!((probs[1].1 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn delta_scores_zero_only_at_its_value() {
        let delta = Delta::new(Value::Bool(true));
        assert_eq!(delta.score(&[], &Value::Bool(true)).unwrap(), 0.0);
        assert_eq!(delta.score(&[], &Value::Bool(false)).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn marginal_sample_respects_weights() {
        let mut builder = MarginalBuilder::new();
        builder.add(Value::Bool(true), 1.0);
        let marginal = builder.build().unwrap();
        let v = with_rng(|rng| marginal.sample(&[], rng)).unwrap();
        assert_eq!(v, Value::Bool(true));
    }
}
