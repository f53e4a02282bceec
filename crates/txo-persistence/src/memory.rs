//! Backend in-memory de `EventLog`: sin dependencias externas, pensado para
//! tests y demos. Paridad de orden/semántica 1:1 con `PgEventLog` (mismo
//! `seq` monotónico global, mismo orden de lectura por `idempotency_key`).

use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;

use crate::{EventLog, PersistenceError, StoredEvent};

#[derive(Default)]
pub struct InMemoryEventLog {
    rows: Mutex<Vec<StoredEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&self, idempotency_key: &str, event_type: &str, payload: Value) -> Result<StoredEvent, PersistenceError> {
        let mut rows = self.rows.lock().unwrap();
        let seq = rows.len() as i64 + 1;
        let row = StoredEvent { seq,
                                 idempotency_key: idempotency_key.to_string(),
                                 ts: Utc::now(),
                                 event_type: event_type.to_string(),
                                 payload };
        rows.push(row.clone());
        Ok(row)
    }

    fn list(&self, idempotency_key: &str) -> Result<Vec<StoredEvent>, PersistenceError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|r| r.idempotency_key == idempotency_key).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lists_only_rows_for_the_requested_key_in_append_order() {
        let log = InMemoryEventLog::new();
        log.append("tx-1", "begin", json!({})).unwrap();
        log.append("tx-2", "begin", json!({})).unwrap();
        log.append("tx-1", "finish", json!({"status": "Done"})).unwrap();

        let rows = log.list("tx-1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event_type, "begin");
        assert_eq!(rows[1].event_type, "finish");
        assert!(rows[0].seq < rows[1].seq);
    }
}
