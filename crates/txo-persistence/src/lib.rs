//! txo-persistence
//!
//! El orquestador (`txo-core`) no persiste nada por sí mismo: emite `Event`s
//! síncronos y dispara efectos a través de un `Handler` provisto por el
//! caller. Este crate es la pieza que un caller conecta a ese `EventBus` para
//! obtener un log durable, apto para forense/auditoría y para reconstruir
//! manualmente "qué pasó" tras un crash — nunca para rehidratar
//! automáticamente una `Transaction` en curso, ya que su estado (`node_states`,
//! `key_index`, colas de compensación) vive únicamente en memoria de proceso.
//!
//! Dos backends con el mismo trait `EventLog`:
//! - `InMemoryEventLog`: para tests y demos, sin dependencias externas.
//! - `PgEventLog`: append-only sobre Postgres (Diesel), con reintento de
//!   errores transitorios, igual que el backend de referencia de este
//!   ecosistema.

pub mod config;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::init_dotenv;
pub use error::PersistenceError;
pub use memory::InMemoryEventLog;
pub use pg::{build_dev_pool_from_env, ConnectionProvider, PgEventLog, PgPool, PoolProvider};

use serde_json::Value;

/// Una fila ya persistida del log de eventos, tal como se lee de vuelta.
///
/// `payload` conserva el JSON completo producido por `serde_json::to_value`
/// sobre el `txo_core::Event` original; este crate no impone una
/// deserialización tipada de vuelta a `Event` porque el log es un artefacto de
/// auditoría, no la fuente de verdad del estado de la transacción.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoredEvent {
    pub seq: i64,
    pub idempotency_key: String,
    pub ts: chrono::DateTime<chrono::Utc>,
    pub event_type: String,
    pub payload: Value,
}

/// Contrato de un log de eventos append-only, indexado por
/// `idempotency_key` de transacción.
///
/// Implementado por ambos backends (`InMemoryEventLog`, `PgEventLog`); un
/// caller típico suscribe un listener a `Orchestrator::on` que llama a
/// `append` por cada `Event` recibido.
pub trait EventLog: Send + Sync {
    /// Añade un evento ya serializado al log de `idempotency_key`. Nunca
    /// sobrescribe ni reordena filas existentes.
    fn append(&self, idempotency_key: &str, event_type: &str, payload: Value) -> Result<StoredEvent, PersistenceError>;

    /// Devuelve todos los eventos de `idempotency_key`, en el orden en que
    /// fueron anexados (`seq` ascendente).
    fn list(&self, idempotency_key: &str) -> Result<Vec<StoredEvent>, PersistenceError>;
}

/// Serializa un `txo_core::Event` y lo anexa a `log` bajo su propia
/// `idempotency_key`. Pensado para conectarse directamente a
/// `Orchestrator::on`:
///
/// ```ignore
/// let log = Arc::new(InMemoryEventLog::new());
/// let log2 = log.clone();
/// orchestrator.on(Box::new(move |ev| { let _ = append_event(log2.as_ref(), ev); }));
/// ```
pub fn append_event(log: &dyn EventLog, event: &txo_core::Event) -> Result<StoredEvent, PersistenceError> {
    let idempotency_key = event_idempotency_key(event);
    let event_type = event_type_for(event);
    let payload = serde_json::to_value(event).map_err(|e| PersistenceError::Unknown(format!("serialize event: {e}")))?;
    log.append(idempotency_key, event_type, payload)
}

fn event_idempotency_key(event: &txo_core::Event) -> &str {
    use txo_core::Event::*;
    match event {
        Begin { idempotency_key, .. }
        | Resume { idempotency_key }
        | Finish { idempotency_key, .. }
        | StepBegin { idempotency_key, .. }
        | StepSuccess { idempotency_key, .. }
        | StepFailure { idempotency_key, .. }
        | CompensateBegin { idempotency_key, .. }
        | Reverted { idempotency_key }
        | Failed { idempotency_key, .. } => idempotency_key,
    }
}

fn event_type_for(event: &txo_core::Event) -> &'static str {
    use txo_core::Event::*;
    match event {
        Begin { .. } => "begin",
        Resume { .. } => "resume",
        Finish { .. } => "finish",
        StepBegin { .. } => "step_begin",
        StepSuccess { .. } => "step_success",
        StepFailure { .. } => "step_failure",
        CompensateBegin { .. } => "compensate_begin",
        Reverted { .. } => "reverted",
        Failed { .. } => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_event_derives_type_and_key_from_the_event_itself() {
        let log = InMemoryEventLog::new();
        let event = txo_core::Event::StepSuccess { idempotency_key: "tx-1".into(),
                                                     action: "firstMethod".into(),
                                                     response: serde_json::json!({"ok": true}) };
        let stored = append_event(&log, &event).unwrap();
        assert_eq!(stored.idempotency_key, "tx-1");
        assert_eq!(stored.event_type, "step_success");

        let rows = log.list("tx-1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payload["action"], "firstMethod");
    }
}
