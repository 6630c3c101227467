mod gate;
mod machine;

pub use gate::{OperationGate, OperationPermit};
pub use machine::{resume_interrupted, resume_target, run_operation};
