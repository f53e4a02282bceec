//! Handler decorador que registra cada dispatch vía el facade `log`, en el
//! mismo estilo que el resto del stack ambiente (ver `txo-cli`).

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use txo_core::{Handler, HandlerType, Payload};

/// Envuelve un `Handler` real y registra entrada/salida de cada llamada a
/// nivel `debug` (éxito) o `warn` (fallo), incluyendo la sub-key de
/// idempotencia para poder correlacionar con un log externo de persistencia.
pub struct LoggingHandler<H> {
    inner: Arc<H>,
}

impl<H> LoggingHandler<H> {
    pub fn new(inner: Arc<H>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H> Handler for LoggingHandler<H> where H: Handler
{
    async fn call(&self, action: &str, handler_type: HandlerType, payload: Payload) -> Result<Value, String> {
        let sub_key = payload.metadata.idempotency_key.clone();
        debug!("dispatch {sub_key} attempt={}", payload.metadata.attempt);
        match self.inner.call(action, handler_type, payload).await {
            Ok(value) => {
                debug!("dispatch {sub_key} succeeded");
                Ok(value)
            }
            Err(reason) => {
                warn!("dispatch {sub_key} failed: {reason}");
                Err(reason)
            }
        }
    }
}
