//! Estado por-nodo dentro de una transacción.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Estado de ejecución de un nodo dentro de una transacción concreta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Idle,
    Invoking,
    InvokedOk,
    InvokeFailed,
    Compensating,
    Compensated,
    PermanentFailureSkipped,
}

/// Registro completo de un nodo: estado, intentos consumidos, última
/// respuesta capturada y razón de fallo (si corresponde).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub state: NodeState,
    /// Intentos de INVOKE consumidos (1-based mientras se ejecuta).
    pub attempts: u32,
    /// Intentos de COMPENSATE consumidos; el contador se reinicia respecto a
    /// `attempts` (ver §6 de la especificación).
    pub compensate_attempts: u32,
    pub last_response: Option<Value>,
    pub failure_reason: Option<String>,
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self { state: NodeState::Idle,
               attempts: 0,
               compensate_attempts: 0,
               last_response: None,
               failure_reason: None }
    }
}
