//! Implementación Postgres (Diesel) de `EventLog`.
//!
//! Objetivo: un log append-only, con orden total por `seq` (BIGSERIAL), sin
//! updates ni deletes — paridad 1:1 con `InMemoryEventLog`. Incluye manejo
//! básico de errores transitorios: reintento con backoff en `append` y
//! `list`.

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use serde_json::Value;

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::event_log;
use crate::{EventLog, StoredEvent};

use log::warn;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Trait interno para obtener una conexión (para testear fácilmente sin
/// acoplar a r2d2 en tests unitarios).
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = event_log)]
struct NewEventRow<'a> {
    idempotency_key: &'a str,
    event_type: &'a str,
    payload: &'a Value,
}

#[derive(Queryable, Debug)]
struct EventRow {
    seq: i64,
    idempotency_key: String,
    ts: chrono::DateTime<chrono::Utc>,
    event_type: String,
    payload: Value,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        StoredEvent { seq: row.seq, idempotency_key: row.idempotency_key, ts: row.ts, event_type: row.event_type, payload: row.payload }
    }
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff exponencial muy pequeño (hasta 3 intentos).
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Log de eventos Postgres append-only.
pub struct PgEventLog<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgEventLog<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> EventLog for PgEventLog<P> {
    fn append(&self, idempotency_key: &str, event_type: &str, payload: Value) -> Result<StoredEvent, PersistenceError> {
        let row: EventRow = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(event_log::table).values(NewEventRow { idempotency_key, event_type, payload: &payload })
                                                  .get_result(&mut conn)
                                                  .map_err(PersistenceError::from)
        })?;
        Ok(row.into())
    }

    fn list(&self, idempotency_key: &str) -> Result<Vec<StoredEvent>, PersistenceError> {
        let rows: Vec<EventRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            event_log::table.filter(event_log::idempotency_key.eq(idempotency_key))
                             .order(event_log::seq.asc())
                             .load(&mut conn)
                             .map_err(PersistenceError::from)
        })?;
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }
}

/// Construye un pool Postgres r2d2 a partir de URL y corre migraciones
/// pendientes al primer checkout.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee configuración (DATABASE_URL,
/// tamaños) y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env();
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
