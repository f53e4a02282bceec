//! Estado de una ejecución concreta de un flujo.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use txo_domain::{Dag, NodeId};

use crate::handler::{Handler, HandlerType};
use crate::node_state::NodeRecord;
use crate::orchestrator::Orchestrator;

/// Estado global de la transacción. Ver §3 de la especificación para las
/// transiciones válidas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransactionStatus {
    NotStarted,
    Invoking,
    WaitingToCompensate,
    Compensating,
    Done,
    Reverted,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Done | TransactionStatus::Reverted | TransactionStatus::Failed)
    }
}

/// Una ejecución de un flujo compilado. Creada por
/// `Orchestrator::begin_transaction`; vive durante toda la duración de la
/// corrida, incluso a través de múltiples llamadas a `resume`.
///
/// No existe estado compartido entre transacciones distintas: cada una posee
/// su propio `HashMap` de estados de nodo y su propio `key_index`.
pub struct Transaction {
    pub idempotency_key: String,
    pub flow_name: String,
    pub initial_payload: Value,
    pub status: TransactionStatus,
    pub is_partially_completed: bool,

    pub(crate) dag: Arc<Dag>,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) node_states: HashMap<NodeId, NodeRecord>,
    /// sub-key de idempotencia -> (nodo, tipo de handler que la generó).
    pub(crate) key_index: HashMap<String, (NodeId, HandlerType)>,
    /// Orden en que los nodos alcanzaron `InvokedOk`; la compensación recorre
    /// este vector en reversa.
    pub(crate) invocation_order: Vec<NodeId>,
    /// Cola de trabajo de la compensación en curso. Se llena una vez a partir
    /// de `invocation_order` al iniciar la compensación y se consume con
    /// `pop()`; permite suspender la compensación cuando un nodo asíncrono la
    /// bloquea a la espera de una resolución externa.
    pub(crate) compensation_queue: Vec<NodeId>,
    /// Acción que disparó la compensación mientras ésta queda diferida por un
    /// nodo asíncrono todavía `Invoking` (estado `WaitingToCompensate`).
    pub(crate) pending_compensation_trigger: Option<String>,
}

impl Transaction {
    pub(crate) fn new(dag: Arc<Dag>, idempotency_key: String, flow_name: String, handler: Arc<dyn Handler>, initial_payload: Value) -> Self {
        let node_states = (0..dag.len()).map(|i| (i, NodeRecord::default())).collect();

        // Las sub-keys son deterministas a partir de (idempotencyKey, action,
        // handlerType): se precalculan para todo el DAG en vez de esperar al
        // primer dispatch, de modo que `registerStepFailure`/`Success` puedan
        // resolver un nodo incluso antes de que haya sido invocado (p.ej. para
        // rechazar una señal sobre un step todavía `Idle`).
        let mut key_index = HashMap::with_capacity(dag.len() * 2);
        for node in dag.nodes_in_definition_order() {
            key_index.insert(Orchestrator::get_key_name(&idempotency_key, &node.action, HandlerType::Invoke),
                              (node.index, HandlerType::Invoke));
            key_index.insert(Orchestrator::get_key_name(&idempotency_key, &node.action, HandlerType::Compensate),
                              (node.index, HandlerType::Compensate));
        }

        Self { idempotency_key,
               flow_name,
               initial_payload,
               status: TransactionStatus::NotStarted,
               is_partially_completed: false,
               dag,
               handler,
               node_states,
               key_index,
               invocation_order: Vec::new(),
               compensation_queue: Vec::new(),
               pending_compensation_trigger: None }
    }

    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    pub fn node_record(&self, node: NodeId) -> &NodeRecord {
        &self.node_states[&node]
    }

    /// Estado de un step identificado por su `action`. Devuelve `None` si el
    /// action no pertenece a esta transacción.
    pub fn state_of(&self, action: &str) -> Option<crate::node_state::NodeState> {
        let node = self.dag.node_index_for_action(action)?;
        Some(self.node_states[&node].state)
    }
}
