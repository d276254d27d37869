//! Agent side of the studio: transcript store, generation backend seam, tool
//! execution and the turn orchestrator.

pub mod backend;
pub mod chat;
pub mod executor;
pub mod http;
pub mod orchestrator;
pub mod tools;

pub use backend::{ChunkStream, GenerationBackend, MissingGenerationBackend};
pub use chat::{ChatState, ChatStore, Message, Role, Step};
pub use executor::{ActionExecutor, ExecutorConfig, ToolError, ToolOutcome};
pub use http::{BackendError, HttpGenerationBackend};
pub use orchestrator::{TurnOrchestrator, TurnOutcome};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
