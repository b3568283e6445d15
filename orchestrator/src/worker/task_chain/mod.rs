pub mod chain;
pub mod overrides;
pub mod runner;

pub use chain::{StepSpec, TaskChain, TaskChainBuilder, TaskStep};
pub use overrides::{OverrideKey, Overrides};
pub use runner::{ChainRun, ChainRunner, StepOutcome, StepPolicy, CHAIN_RUN_KEY};
