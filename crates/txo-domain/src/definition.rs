//! Definición de flujo (entrada del compilador).
//!
//! Un `FlowDefinition` es un árbol anidado enlazado por `next`: cada nodo
//! declara su `action` y un `next` que es o bien ausente (hoja), un único
//! hijo, o una secuencia de hijos que se ejecutan en paralelo (fan-out).
//!
//! Siguiendo la convención de la fuente original: no existe un nodo raíz
//! visible para el usuario. `FlowDefinition::next` nombra directamente el o
//! los steps iniciales del flujo.

use crate::flags::StepFlags;

/// Encadenamiento desde un nodo hacia sus hijos.
#[derive(Debug, Clone, PartialEq)]
pub enum Next {
    /// Nodo hoja: no tiene hijos.
    None,
    /// Un único hijo que se ejecuta tras la finalización (o inicio, si
    /// `no_wait`) del nodo actual.
    Single(Box<FlowNode>),
    /// Varios hijos hermanos que se ejecutan en paralelo.
    Parallel(Vec<FlowNode>),
}

/// Un nodo de la definición de flujo.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    /// Identificador de acción pasado al handler. Único dentro del flujo.
    pub action: String,
    /// Encadenamiento hacia los hijos.
    pub next: Next,
    /// Flags de comportamiento del step.
    pub flags: StepFlags,
}

impl FlowNode {
    /// Construye un nodo hoja con flags por defecto.
    pub fn leaf(action: impl Into<String>) -> Self {
        Self { action: action.into(),
               next: Next::None,
               flags: StepFlags::default() }
    }

    /// Construye un nodo con un único hijo.
    pub fn then(action: impl Into<String>, child: FlowNode) -> Self {
        Self { action: action.into(),
               next: Next::Single(Box::new(child)),
               flags: StepFlags::default() }
    }

    /// Construye un nodo con varios hijos en paralelo.
    pub fn fan_out(action: impl Into<String>, children: Vec<FlowNode>) -> Self {
        Self { action: action.into(),
               next: Next::Parallel(children),
               flags: StepFlags::default() }
    }

    /// Builder: fija los flags del nodo.
    pub fn with_flags(mut self, flags: StepFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Definición completa de un flujo: la lista de steps iniciales.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDefinition {
    pub next: Next,
}

impl FlowDefinition {
    /// Flujo lineal: cada acción encadena con la siguiente, todas con flags
    /// por defecto. Útil para construir rápidamente escenarios de prueba.
    pub fn linear(actions: &[&str]) -> Self {
        let mut next = Next::None;
        for action in actions.iter().rev() {
            next = Next::Single(Box::new(FlowNode { action: (*action).to_string(),
                                                     next,
                                                     flags: StepFlags::default() }));
        }
        Self { next }
    }

    pub fn single(root: FlowNode) -> Self {
        Self { next: Next::Single(Box::new(root)) }
    }

    pub fn parallel(roots: Vec<FlowNode>) -> Self {
        Self { next: Next::Parallel(roots) }
    }
}
