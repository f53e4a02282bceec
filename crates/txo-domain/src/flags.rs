//! Flags que controlan el comportamiento de un step dentro del orquestador.

use serde::{Deserialize, Serialize};

/// Número de reintentos por defecto para un step que no fija `max_retries`
/// explícitamente. Tanto el compilador como el runtime comparten esta misma
/// constante para que `StepFlags::default()` y `Orchestrator::DEFAULT_RETRIES`
/// nunca diverjan.
pub const DEFAULT_RETRIES: u32 = 3;

/// Flags declarados por cada nodo de la definición de flujo. Controlan
/// reintentos, tolerancia a fallos permanentes, propagación de respuesta,
/// adelanto de hijos (`no_wait`) y resolución externa (`async_step`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFlags {
    /// Número máximo de reintentos tras el primer fallo. `0` significa que el
    /// step se invoca una única vez y falla permanentemente en el primer
    /// error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Si es `true`, agotar los reintentos del INVOKE marca el nodo como
    /// `PermanentFailureSkipped` en lugar de disparar la compensación de la
    /// transacción.
    #[serde(default)]
    pub continue_on_permanent_failure: bool,
    /// Si es `true`, la última respuesta del nodo se inyecta como `_response`
    /// en el `data` de su hijo directo.
    #[serde(default)]
    pub forward_response: bool,
    /// Si es `true`, los hijos de este nodo quedan listos para ejecutarse tan
    /// pronto como el nodo entra en `Invoking`, sin esperar su resolución.
    #[serde(default)]
    pub no_wait: bool,
    /// Si es `true`, el resultado de la invocación del handler se ignora para
    /// efectos de transición de estado; la resolución llega externamente vía
    /// `register_step_success` / `register_step_failure`.
    #[serde(default)]
    pub async_step: bool,
}

fn default_max_retries() -> u32 {
    DEFAULT_RETRIES
}

impl Default for StepFlags {
    fn default() -> Self {
        Self { max_retries: DEFAULT_RETRIES,
               continue_on_permanent_failure: false,
               forward_response: false,
               no_wait: false,
               async_step: false }
    }
}
