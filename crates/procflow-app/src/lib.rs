//! Application layer: worker protocol, interaction state and the headless
//! controller that drives the graph pipeline.

pub mod controller;
pub mod engine;
pub mod error;
pub mod interaction;
pub mod protocol;
pub mod settings;
pub mod workers;

pub use controller::AppController;
pub use engine::{EngineCommand, EngineError, MiningEngine, ProcessEngine};
pub use error::{AppError, PROCESSING_FAILED};
pub use interaction::{Effect, Intent, InteractionState, Mode, Tooltip};
pub use protocol::{RequestKind, WorkerRequest, WorkerResponse, handle_request};
pub use settings::{AppSettings, DEFAULT_PAGE_SIZE};
pub use workers::WorkerSlot;
