//! Contrato del handler: el colaborador externo que ejecuta el efecto real
//! de cada step.

use async_trait::async_trait;
use serde_json::Value;

use crate::payload::Payload;

/// Distingue una invocación directa de una compensación. Se serializa en
/// minúsculas como `metadata.action_type` (ver `Payload`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerType {
    Invoke,
    Compensate,
}

impl HandlerType {
    pub fn as_str_lower(self) -> &'static str {
        match self {
            HandlerType::Invoke => "invoke",
            HandlerType::Compensate => "compensate",
        }
    }
}

impl std::fmt::Display for HandlerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str_lower())
    }
}

/// Handler asíncrono provisto por el usuario. Un `Err` (o panic propagado
/// como error) representa un fallo del step; cualquier `Ok` es capturado como
/// la respuesta (`lastResponse`) del nodo.
///
/// El orquestador no impone ninguna semántica sobre `data`/`Value`: el
/// handler decide cómo interpretar el payload según `action`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, action: &str, handler_type: HandlerType, payload: Payload) -> Result<Value, String>;
}

#[async_trait]
impl<F, Fut> Handler for F
    where F: Fn(String, HandlerType, Payload) -> Fut + Send + Sync,
          Fut: std::future::Future<Output = Result<Value, String>> + Send
{
    async fn call(&self, action: &str, handler_type: HandlerType, payload: Payload) -> Result<Value, String> {
        (self)(action.to_string(), handler_type, payload).await
    }
}
