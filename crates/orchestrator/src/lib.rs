//! # tile3d-orchestrator — context pool, generation orchestrator, engine
//!
//! Wires the pure-compute `tile3d-kernel` and the I/O `tile3d-geo` crates
//! together into the stateful, cancellable, debounced `generate()` call
//! the rest of the system drives (§4.9–§4.10). Grounded on
//! `eustress-forge`'s `routing`/`lib.rs` shutdown idiom, generalized from
//! routing game sessions to dispatching geometry work across a fixed
//! pool of compute contexts.
//!
//! ## Modules
//! - `pool` — the Context Pool (§4.9)
//! - `orchestrator` — the Generation Orchestrator (§4.10)
//! - `engine` — the `Engine` façade combining both (§3/§9)

pub mod engine;
pub mod orchestrator;
pub mod pool;

pub use engine::Engine;
pub use orchestrator::{GenerationOrchestrator, GenerationOutput, LayerOutput, RunInputs, TileSources};
pub use pool::{ContextHandle, ContextPool, SharedResource};
