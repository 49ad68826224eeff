pub mod engine;
pub mod states;

pub use engine::{
    definition, resubmission_target, ApprovalStage, FlowTransitionError, LifecycleEngine,
    StageDefinition, ValidationStage,
};
pub use states::{ActionKind, Stage, TransitionOutcome};
