use rand::rngs::SmallRng;
use std::fmt;
use std::sync::Arc;

use crate::error::InferenceError;
use crate::value::Value;

/// Elementary Random Primitive: the uniform interface every distribution in
/// this engine is accessed through (spec.md §3/§4.1). This generalizes the
/// teacher's `transport::density::Density` trait (`density(&self, x)` +
/// `support(&self)`) to a parameterized family of distributions rather than
/// a single fixed one, and splits `density` into `sample`/`score` since a
/// `Density` alone can't draw.
///
/// `support` returns `Ok(None)` for continuous distributions; enumeration
/// against such a distribution fails with [`InferenceError::EnumerationUnsupported`].
pub trait Erp: fmt::Debug + Send + Sync {
    fn sample(&self, params: &[Value], rng: &mut SmallRng) -> Result<Value, InferenceError>;
    fn score(&self, params: &[Value], value: &Value) -> Result<f64, InferenceError>;
    fn support(&self, params: &[Value]) -> Result<Option<Vec<Value>>, InferenceError> {
        let _ = params;
        Ok(None)
    }
}

pub type ErpRef = Arc<dyn Erp>;

type SampleFn = dyn Fn(&[Value], &mut SmallRng) -> Result<Value, InferenceError> + Send + Sync;
type ScoreFn = dyn Fn(&[Value], &Value) -> Result<f64, InferenceError> + Send + Sync;
type SupportFn = dyn Fn(&[Value]) -> Result<Option<Vec<Value>>, InferenceError> + Send + Sync;

/// The host-visible `ERP` constructor from spec.md §6: builds a custom
/// distribution out of plain closures, the same shape as the teacher's
/// `Density` being implemented ad hoc for one-off distributions (e.g. its
/// marginal-derived strategies).
pub struct CustomErp {
    sample: Box<SampleFn>,
    score: Box<ScoreFn>,
    support: Box<SupportFn>,
}

impl fmt::Debug for CustomErp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomErp").finish_non_exhaustive()
    }
}

impl CustomErp {
    pub fn new(
        sample: impl Fn(&[Value], &mut SmallRng) -> Result<Value, InferenceError> + Send + Sync + 'static,
        score: impl Fn(&[Value], &Value) -> Result<f64, InferenceError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            sample: Box::new(sample),
            score: Box::new(score),
            support: Box::new(|_| Ok(None)),
        }
    }

    pub fn with_support(
        mut self,
        support: impl Fn(&[Value]) -> Result<Option<Vec<Value>>, InferenceError> + Send + Sync + 'static,
    ) -> Self {
        self.support = Box::new(support);
        self
    }
}

impl Erp for CustomErp {
    fn sample(&self, params: &[Value], rng: &mut SmallRng) -> Result<Value, InferenceError> {
        (self.sample)(params, rng)
    }
    fn score(&self, params: &[Value], value: &Value) -> Result<f64, InferenceError> {
        (self.score)(params, value)
    }
    fn support(&self, params: &[Value]) -> Result<Option<Vec<Value>>, InferenceError> {
        (self.support)(params)
    }
}
