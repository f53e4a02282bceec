//! txo-adapters: colaboradores de ejemplo para el `Handler` del orquestador.
//!
//! Este crate no participa del runtime — `txo-core` sólo conoce el trait
//! `Handler`. Provee un handler guionado para tests/demos (`ScriptedHandler`)
//! y un decorador de logging (`LoggingHandler`) que ilustra cómo componer un
//! handler real con observabilidad sin tocar el orquestador.

pub mod logging;
pub mod scripted;

pub use logging::LoggingHandler;
pub use scripted::{CallRecord, Scripted, ScriptedHandler};
