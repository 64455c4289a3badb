/// The four error kinds spec.md §7 calls for. Every fallible operation in
/// this crate propagates one of these; none of them is recoverable mid-run —
/// an error aborts the inference run immediately and no partial marginal is
/// ever returned (spec.md §7 "Propagation").
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("factor invoked while no inference strategy that supports conditioning is installed")]
    FactorOutsideInference,

    #[error("enumeration requires a distribution with finite support, but none was provided")]
    EnumerationUnsupported,

    #[error("empty posterior: every execution path scored zero probability")]
    EmptyPosterior,

    #[error("degenerate distribution parameters: {0}")]
    DegenerateParameters(String),
}
