pub mod builtins;
pub mod cache;
pub mod computation;
pub mod coroutine;
pub mod erp;
pub mod error;
pub mod marginal;
pub mod primitive;
pub mod rng;
pub mod strategies;
pub mod util;
pub mod value;

pub use computation::{exit_step, factor_step, sample_step, sample_with_factor_step};
pub use computation::{Continuation, Entry, ScoreFn, Step};
pub use erp::{CustomErp, Erp, ErpRef};
pub use error::InferenceError;
pub use marginal::{Delta, Marginal, MarginalBuilder};
pub use value::Value;

pub use builtins::{BernoulliErp, DiscreteErp, GaussianErp, RandomIntegerErp, UniformErp};
pub use cache::{cache, Cache};
pub use primitive::call_primitive;
pub use util::{logsumexp, multinomial_sample, repeat, sum};

pub use strategies::enumerate::{enumerate, enumerate_breadth_first, enumerate_depth_first, enumerate_likely_first, Discipline};
pub use strategies::forward::forward;
pub use strategies::particle_filter::particle_filter;

/// Shared handles for the built-in distributions (spec.md §6: `uniformERP`,
/// `bernoulliERP`, `randomIntegerERP`, `gaussianERP`, `discreteERP`). Each
/// built-in is stateless, so one lazily-built [`ErpRef`] per kind is all any
/// caller ever needs — a cheap `Arc` clone on every use rather than a fresh
/// allocation, the same sharing the teacher gives its `transport::density`
/// singletons.
pub mod erps {
    use crate::erp::ErpRef;
    use std::sync::Arc;
    use std::sync::OnceLock;

    macro_rules! singleton {
        ($name:ident, $ty:ty) => {
            pub fn $name() -> ErpRef {
                static CELL: OnceLock<ErpRef> = OnceLock::new();
                CELL.get_or_init(|| Arc::new(<$ty>::default())).clone()
            }
        };
    }

    singleton!(uniform_erp, crate::builtins::UniformErp);
    singleton!(bernoulli_erp, crate::builtins::BernoulliErp);
    singleton!(random_integer_erp, crate::builtins::RandomIntegerErp);
    singleton!(gaussian_erp, crate::builtins::GaussianErp);
    singleton!(discrete_erp, crate::builtins::DiscreteErp);
}

/// `display(k, x)` from spec.md §6: the host-side debug-print bridge.
/// Collapses the continuation into a plain function call, same as every
/// other entry point in this crate (see SPEC_FULL.md §3) — printing has no
/// suspension point to dispatch through.
pub fn display(x: &Value) {
    println!("{x}");
}

/// Initialize the engine's logger. Mirrors the teacher's `init()` in spirit
/// (a `simplelog::CombinedLogger` over a terminal sink) but lives behind the
/// `native` feature and is only ever called from a binary, never from the
/// library itself — a library must not install a global logger as a side
/// effect of being linked.
#[cfg(feature = "native")]
pub fn init_logging(level: log::LevelFilter) {
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let term = simplelog::TermLogger::new(level, config, simplelog::TerminalMode::Mixed, simplelog::ColorChoice::Auto);
    simplelog::CombinedLogger::init(vec![term]).expect("initialize logger");
}
