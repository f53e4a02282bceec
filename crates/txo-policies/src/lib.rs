//! txo-policies – políticas de reintento para el runtime del orquestador.
//!
//! Provee el contrato `RetryPolicy` y una implementación por defecto
//! (`ImmediateRetryPolicy`) que reintenta inmediatamente, sin backoff, hasta
//! `max_retries` veces por step — el comportamiento descrito por la
//! especificación del orquestador. El contrato queda separado del runtime en
//! `txo-core` para permitir políticas alternativas (backoff exponencial,
//! jitter, límites por tipo de acción) sin tocar el algoritmo de traversal.

use serde::{Deserialize, Serialize};

/// Intento de invocación o compensación que ya falló; describe el contexto
/// que una política de reintento necesita para decidir.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryAttempt {
    /// Número de intento que acaba de fallar (1-based).
    pub attempt: u32,
    /// `max_retries` declarado por el step.
    pub max_retries: u32,
}

/// Contrato de una política de reintento determinista.
pub trait RetryPolicy: Send + Sync {
    fn id(&self) -> &'static str;

    /// Decide si corresponde un nuevo intento tras `attempt.attempt` fallos.
    fn should_retry(&self, attempt: RetryAttempt) -> bool;
}

/// Política por defecto: reintenta inmediatamente (sin espera) mientras
/// `attempt <= max_retries`. Un step con `max_retries: 0` nunca reintenta.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateRetryPolicy;

impl RetryPolicy for ImmediateRetryPolicy {
    fn id(&self) -> &'static str {
        "immediate"
    }

    fn should_retry(&self, attempt: RetryAttempt) -> bool {
        attempt.attempt <= attempt.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_until_max_retries_exhausted() {
        let p = ImmediateRetryPolicy;
        assert!(p.should_retry(RetryAttempt { attempt: 1, max_retries: 3 }));
        assert!(p.should_retry(RetryAttempt { attempt: 3, max_retries: 3 }));
        assert!(!p.should_retry(RetryAttempt { attempt: 4, max_retries: 3 }));
    }

    #[test]
    fn zero_max_retries_never_retries() {
        let p = ImmediateRetryPolicy;
        assert!(!p.should_retry(RetryAttempt { attempt: 1, max_retries: 0 }));
    }
}
