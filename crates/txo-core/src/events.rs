//! Eventos observables de una transacción y su registro de listeners.
//!
//! Este módulo es un observer pattern síncrono, no un log append-only para
//! replay: cada evento se entrega en el momento en que ocurre y no se
//! almacena aquí. Sirve para logging, métricas o proyecciones externas, nunca
//! como fuente de verdad del estado (que vive en `Transaction`). Un caller
//! que necesite un log durable lo obtiene adjuntando un listener que escriba
//! a su propia capa de persistencia.

use serde::Serialize;
use serde_json::Value;

/// Payload de un evento emitido durante la vida de una transacción.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum Event {
    /// `begin_transaction` fue invocado.
    Begin { idempotency_key: String, flow_name: String },
    /// `resume` fue invocado (incluye la primera llamada tras `begin`).
    Resume { idempotency_key: String },
    /// La transacción alcanzó un estado terminal (`Done`, `Reverted` o `Failed`).
    Finish { idempotency_key: String, status: crate::transaction::TransactionStatus },
    StepBegin { idempotency_key: String, action: String, attempt: u32 },
    StepSuccess { idempotency_key: String, action: String, response: Value },
    StepFailure { idempotency_key: String, action: String, reason: String },
    /// La transacción comienza a deshacer nodos ya invocados.
    CompensateBegin { idempotency_key: String, triggered_by: String },
    /// Todos los nodos invocados fueron compensados con éxito.
    Reverted { idempotency_key: String },
    /// Un nodo agotó sus reintentos de compensación; la transacción queda en
    /// `Failed` en vez de `Reverted`.
    Failed { idempotency_key: String, action: String },
}

/// Listener síncrono. Recibe el evento por referencia; no puede mutar la
/// transacción (eso evita reentradas sobre el estado del orquestador).
pub type Listener = Box<dyn Fn(&Event) + Send + Sync>;

/// Registro de listeners de un `Orchestrator`. Los listeners se invocan en el
/// orden en que fueron registrados, sin garantía de aislamiento entre ellos:
/// un listener que entra en pánico interrumpe la entrega a los siguientes.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: Event) {
        for listener in &self.listeners {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.listeners.len()).finish()
    }
}
