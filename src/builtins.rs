use rand::rngs::SmallRng;
use rand::Rng;

use crate::erp::Erp;
use crate::error::InferenceError;
use crate::util::multinomial_sample;
use crate::value::Value;

fn degenerate(msg: impl Into<String>) -> InferenceError {
    InferenceError::DegenerateParameters(msg.into())
}

/// Continuous on `[a, b]`; no finite support (spec.md §4.1).
#[derive(Debug, Default)]
pub struct UniformErp;

impl UniformErp {
    fn bounds(params: &[Value]) -> Result<(f64, f64), InferenceError> {
        let a = params.first().and_then(Value::as_real).ok_or_else(|| degenerate("Uniform(a, b) requires two real parameters"))?;
        let b = params.get(1).and_then(Value::as_real).ok_or_else(|| degenerate("Uniform(a, b) requires two real parameters"))?;
        if !(a < b) {
            return Err(degenerate(format!("Uniform(a, b) requires a < b, got a={a} b={b}")));
        }
        Ok((a, b))
    }
}

impl Erp for UniformErp {
    fn sample(&self, params: &[Value], rng: &mut SmallRng) -> Result<Value, InferenceError> {
        let (a, b) = Self::bounds(params)?;
        Ok(Value::Real(rng.random_range(a..b)))
    }
    fn score(&self, params: &[Value], value: &Value) -> Result<f64, InferenceError> {
        let (a, b) = Self::bounds(params)?;
        let x = match value.as_real() {
            Some(x) => x,
            None => return Ok(f64::NEG_INFINITY),
        };
        if x < a || x > b {
            Ok(f64::NEG_INFINITY)
        } else {
            Ok(-(b - a).ln())
        }
    }
}

/// `support = {true, false}` in that order (spec.md §4.1).
#[derive(Debug, Default)]
pub struct BernoulliErp;

impl BernoulliErp {
    fn prob(params: &[Value]) -> Result<f64, InferenceError> {
        let p = params.first().and_then(Value::as_real).ok_or_else(|| degenerate("Bernoulli(p) requires one real parameter"))?;
        if !(0.0..=1.0).contains(&p) {
            return Err(degenerate(format!("Bernoulli(p) requires p in [0, 1], got p={p}")));
        }
        Ok(p)
    }
}

impl Erp for BernoulliErp {
    fn sample(&self, params: &[Value], rng: &mut SmallRng) -> Result<Value, InferenceError> {
        let p = Self::prob(params)?;
        Ok(Value::Bool(rng.random::<f64>() < p))
    }
    fn score(&self, params: &[Value], value: &Value) -> Result<f64, InferenceError> {
        let p = Self::prob(params)?;
        match value.as_bool() {
            Some(true) => Ok(p.ln()),
            Some(false) => Ok((1.0 - p).ln()),
            None => Ok(f64::NEG_INFINITY),
        }
    }
    fn support(&self, params: &[Value]) -> Result<Option<Vec<Value>>, InferenceError> {
        Self::prob(params)?;
        Ok(Some(vec![Value::Bool(true), Value::Bool(false)]))
    }
}

/// Integer in `[0, n)`, `support = 0..n-1` ascending (spec.md §4.1).
#[derive(Debug, Default)]
pub struct RandomIntegerErp;

impl RandomIntegerErp {
    fn bound(params: &[Value]) -> Result<i64, InferenceError> {
        let n = params.first().and_then(Value::as_int).ok_or_else(|| degenerate("RandomInteger(n) requires one integer parameter"))?;
        if n <= 0 {
            return Err(degenerate(format!("RandomInteger(n) requires n > 0, got n={n}")));
        }
        Ok(n)
    }
}

impl Erp for RandomIntegerErp {
    fn sample(&self, params: &[Value], rng: &mut SmallRng) -> Result<Value, InferenceError> {
        let n = Self::bound(params)?;
        Ok(Value::Int(rng.random_range(0..n)))
    }
    fn score(&self, params: &[Value], value: &Value) -> Result<f64, InferenceError> {
        let n = Self::bound(params)?;
        match value.as_int() {
            Some(v) if (0..n).contains(&v) => Ok(-(n as f64).ln()),
            _ => Ok(f64::NEG_INFINITY),
        }
    }
    fn support(&self, params: &[Value]) -> Result<Option<Vec<Value>>, InferenceError> {
        let n = Self::bound(params)?;
        Ok(Some((0..n).map(Value::Int).collect()))
    }
}

/// Continuous; sampled via the Marsaglia polar (ratio-of-uniforms) rejection
/// method, acceptable per spec.md §4.1 ("polar/ratio-of-uniforms acceptance
/// sampler acceptable").
#[derive(Debug, Default)]
pub struct GaussianErp;

impl GaussianErp {
    fn params(params: &[Value]) -> Result<(f64, f64), InferenceError> {
        let mu = params.first().and_then(Value::as_real).ok_or_else(|| degenerate("Gaussian(mu, sigma) requires two real parameters"))?;
        let sigma = params.get(1).and_then(Value::as_real).ok_or_else(|| degenerate("Gaussian(mu, sigma) requires two real parameters"))?;
        if !(sigma > 0.0) {
            return Err(degenerate(format!("Gaussian(mu, sigma) requires sigma > 0, got sigma={sigma}")));
        }
        Ok((mu, sigma))
    }
}

impl Erp for GaussianErp {
    fn sample(&self, params: &[Value], rng: &mut SmallRng) -> Result<Value, InferenceError> {
        let (mu, sigma) = Self::params(params)?;
        loop {
            let u = 2.0 * rng.random::<f64>() - 1.0;
            let v = 2.0 * rng.random::<f64>() - 1.0;
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                let factor = (-2.0 * s.ln() / s).sqrt();
                return Ok(Value::Real(mu + sigma * u * factor));
            }
        }
    }
    fn score(&self, params: &[Value], value: &Value) -> Result<f64, InferenceError> {
        let (mu, sigma) = Self::params(params)?;
        let x = match value.as_real() {
            Some(x) => x,
            None => return Ok(f64::NEG_INFINITY),
        };
        let z = (x - mu) / sigma;
        Ok(-0.5 * z * z - sigma.ln() - 0.5 * (2.0 * std::f64::consts::PI).ln())
    }
}

/// Over indices `0..|theta|-1` proportional to `theta` (unnormalized,
/// non-negative). Sampled by inverse-CDF against a uniform draw in `[0,
/// sum(theta))` (spec.md §4.1); see [`multinomial_sample`] for the exact
/// fallthrough behavior on trailing/leading zeros.
#[derive(Debug, Default)]
pub struct DiscreteErp;

impl DiscreteErp {
    fn weights(params: &[Value]) -> Result<Vec<f64>, InferenceError> {
        let theta = params.first().and_then(Value::as_tuple).ok_or_else(|| degenerate("Discrete(theta) requires one tuple parameter"))?;
        let weights: Vec<f64> = theta
            .iter()
            .map(|v| v.as_real().ok_or_else(|| degenerate("Discrete(theta) requires real-valued weights")))
            .collect::<Result<_, _>>()?;
        if weights.iter().any(|&w| w < 0.0) {
            return Err(degenerate("Discrete(theta) requires non-negative weights"));
        }
        if weights.iter().all(|&w| w == 0.0) {
            return Err(degenerate("Discrete(theta) requires at least one positive weight"));
        }
        Ok(weights)
    }
}

impl Erp for DiscreteErp {
    fn sample(&self, params: &[Value], rng: &mut SmallRng) -> Result<Value, InferenceError> {
        let weights = Self::weights(params)?;
        Ok(Value::Int(multinomial_sample(&weights, rng) as i64))
    }
    fn score(&self, params: &[Value], value: &Value) -> Result<f64, InferenceError> {
        let weights = Self::weights(params)?;
        let total: f64 = weights.iter().sum();
        match value.as_int() {
            Some(v) if v >= 0 && (v as usize) < weights.len() => {
                let w = weights[v as usize];
                if w <= 0.0 {
                    Ok(f64::NEG_INFINITY)
                } else {
                    Ok((w / total).ln())
                }
            }
            _ => Ok(f64::NEG_INFINITY),
        }
    }
    fn support(&self, params: &[Value]) -> Result<Option<Vec<Value>>, InferenceError> {
        let weights = Self::weights(params)?;
        Ok(Some(
            weights
                .iter()
                .enumerate()
                .filter(|(_, &w)| w > 0.0)
                .map(|(i, _)| Value::Int(i as i64))
                .collect(),
        ))
    }
}
