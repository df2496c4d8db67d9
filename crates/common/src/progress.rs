//! Progress callback contract (§6, §4.12).
//!
//! A plain callback trait object rather than a channel — the contract is
//! `progress(stage, pct, message)`, a sink the caller doesn't need to poll.

/// Which stage of a run a [`Progress`] event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Initializing,
    Terrain,
    Layers,
    Finalizing,
    Complete,
    Error,
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProgressStage::Initializing => "initializing",
            ProgressStage::Terrain => "terrain",
            ProgressStage::Layers => "layers",
            ProgressStage::Finalizing => "finalizing",
            ProgressStage::Complete => "complete",
            ProgressStage::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// One progress event. `pct` is clamped to `[0,100]` by
/// [`Progress::new`]; overall percentage reported to the external sink is
/// non-decreasing per §5, a property enforced by the orchestrator rather
/// than this type.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub stage: ProgressStage,
    pub pct: u8,
    pub message: String,
}

impl Progress {
    pub fn new(stage: ProgressStage, pct: u8, message: impl Into<String>) -> Self {
        Progress { stage, pct: pct.min(100), message: message.into() }
    }
}

/// A progress sink, supplied by the embedding application.
pub type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;
