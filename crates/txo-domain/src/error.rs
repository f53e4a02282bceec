//! Errores de compilación del flujo.

use thiserror::Error;

/// Error lanzado de forma síncrona por el compilador de flujos cuando la
/// definición de entrada es inválida. Nunca se produce en tiempo de
/// ejecución: una vez compilado, el `Dag` es correcto por construcción.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidFlow {
    #[error("flow definition has no root step")]
    MissingRoot,
    #[error("duplicate action identifier: {0}")]
    DuplicateAction(String),
}
