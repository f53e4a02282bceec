//! txo-domain: tipos neutrales del flujo de un Transaction Orchestrator.
//!
//! Expone la definición de flujo de entrada (`FlowDefinition`, anidada por
//! `next`) y el compilador (`compile`) que la traduce en un `Dag` plano e
//! inmutable, apto para ser recorrido concurrentemente por el runtime en
//! `txo-core`.

pub mod dag;
pub mod definition;
pub mod error;
pub mod flags;

pub use dag::{compile, Dag, DagNode, NodeId};
pub use definition::{FlowDefinition, FlowNode, Next};
pub use error::InvalidFlow;
pub use flags::{StepFlags, DEFAULT_RETRIES};
