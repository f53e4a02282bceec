//! txo-core: runtime del Transaction Orchestrator.
//!
//! Compone el compilador de flujos de `txo-domain` con un runtime asíncrono
//! de instrucciones: traversal, reintentos, compensación en reversa,
//! forwarding de respuestas y reanudación externa de steps asíncronos.

pub mod errors;
pub mod events;
pub mod handler;
pub mod node_state;
pub mod orchestrator;
pub mod payload;
pub mod transaction;

pub use errors::OrchestratorError;
pub use events::{Event, EventBus, Listener};
pub use handler::{Handler, HandlerType};
pub use node_state::{NodeRecord, NodeState};
pub use orchestrator::Orchestrator;
pub use payload::{Metadata, Payload};
pub use transaction::{Transaction, TransactionStatus};

pub use txo_domain::{FlowDefinition, FlowNode, InvalidFlow, Next, StepFlags, DEFAULT_RETRIES};
