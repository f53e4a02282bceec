//! Esquema Diesel (generado manualmente). Reemplazable con `diesel
//! print-schema`.
//!
//! Tabla única: `event_log`, un log append-only de eventos de transacción
//! indexado por `idempotency_key` en vez de un `flow_id` numérico, ya que la
//! idempotency key es el identificador natural de una `Transaction`.

diesel::table! {
    event_log (seq) {
        seq -> BigInt,
        idempotency_key -> Text,
        ts -> Timestamptz,
        event_type -> Text,
        payload -> Jsonb,
    }
}
