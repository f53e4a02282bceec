//! txorch: fachada del workspace.
//!
//! Re-exporta los tipos públicos de `txo-domain` y `txo-core` para que un
//! consumidor externo pueda depender de un único crate (`txorch`) en vez de
//! enumerar cada miembro del workspace.

pub use txo_adapters::{CallRecord, LoggingHandler, Scripted, ScriptedHandler};
pub use txo_core::{
    Event, EventBus, Handler, HandlerType, Listener, Metadata, NodeRecord, NodeState, Orchestrator, OrchestratorError, Payload, Transaction,
    TransactionStatus,
};
pub use txo_domain::{FlowDefinition, FlowNode, InvalidFlow, Next, StepFlags, DEFAULT_RETRIES};
pub use txo_persistence::{append_event, EventLog, InMemoryEventLog, PersistenceError, StoredEvent};
