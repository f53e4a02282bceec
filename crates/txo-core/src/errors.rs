//! Errores del runtime del orquestador.
//!
//! Sólo los errores de programación (flujo inválido, llamada de resume
//! inválida) se propagan como `Err`. El agotamiento de reintentos y la
//! compensación se reflejan en `Transaction::status`, nunca como errores de
//! `resume`.

use thiserror::Error;
pub use txo_domain::InvalidFlow;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// El flujo compilado es inválido (acciones duplicadas, sin raíz).
    #[error(transparent)]
    InvalidFlow(#[from] InvalidFlow),

    /// `register_step_failure` fue invocado sobre un step cuyo estado es
    /// `Idle`. El mensaje literal coincide con el de la especificación para
    /// que los callers puedan matchear el texto.
    #[error("Cannot set step failure when status is idle")]
    InvalidResumeState,

    /// `register_step_success` / `register_step_failure` recibieron una
    /// sub-key que no corresponde a ningún nodo de esta transacción.
    #[error("unknown idempotency sub-key: {0}")]
    UnknownSubKey(String),
}
