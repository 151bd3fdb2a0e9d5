//! Shadow caster error types

use thiserror::Error;

use crate::phase::{FrameHook, FramePhase};

/// Shadow caster errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShadowError {
    #[error("No target assigned to shadow caster")]
    MissingTarget,

    #[error("Isolation layer pool exhausted ({capacity} channels in use)")]
    LayerPoolExhausted { capacity: usize },

    #[error("Frame hook {hook:?} called out of order during phase {phase:?}")]
    PhaseOrder { hook: FrameHook, phase: FramePhase },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for shadow caster operations
pub type ShadowResult<T> = Result<T, ShadowError>;
