//! Runtime del orquestador: recorrido del DAG, reintentos, compensación y
//! emisión de eventos.
//!
//! El `Orchestrator` sólo posee el flujo compilado y el registro de
//! listeners; todo el estado mutable de una corrida vive en su `Transaction`
//! (ver §9 de la especificación: "global state: none"). Varias transacciones
//! pueden conducirse concurrentemente sobre el mismo `Orchestrator` sin
//! compartir estado entre sí.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use serde_json::Value;

use txo_domain::{FlowDefinition, NodeId};
use txo_policies::{ImmediateRetryPolicy, RetryAttempt, RetryPolicy};

const RETRY_POLICY: ImmediateRetryPolicy = ImmediateRetryPolicy;

use crate::errors::OrchestratorError;
use crate::events::{Event, EventBus, Listener};
use crate::handler::{Handler, HandlerType};
use crate::node_state::NodeState;
use crate::payload::{build_data, build_payload};
use crate::transaction::{Transaction, TransactionStatus};

pub struct Orchestrator {
    flow_name: String,
    dag: Arc<txo_domain::Dag>,
    events: Mutex<EventBus>,
}

impl Orchestrator {
    /// Reintentos por defecto para un step sin `maxRetries` explícito.
    pub const DEFAULT_RETRIES: u32 = txo_domain::DEFAULT_RETRIES;

    /// Compila `definition` y construye un orquestador listo para abrir
    /// transacciones. El `Dag` resultante es inmutable y se comparte (vía
    /// `Arc`) entre todas las transacciones que abra este orquestador.
    pub fn new(flow_name: impl Into<String>, definition: &FlowDefinition) -> Result<Self, OrchestratorError> {
        let dag = txo_domain::compile(definition)?;
        Ok(Self { flow_name: flow_name.into(), dag: Arc::new(dag), events: Mutex::new(EventBus::new()) })
    }

    /// Registra un listener síncrono. Se invoca para toda transacción abierta
    /// por este orquestador, no sólo para la que esté corriendo.
    pub fn on(&self, listener: Listener) {
        if let Ok(mut bus) = self.events.lock() {
            bus.subscribe(listener);
        }
    }

    /// Abre una transacción nueva, ligada al DAG compilado. No ejecuta nada;
    /// `resume` es quien conduce el primer paso.
    pub fn begin_transaction(&self, idempotency_key: impl Into<String>, handler: Arc<dyn Handler>, initial_payload: Option<Value>) -> Transaction {
        let idempotency_key = idempotency_key.into();
        let tx = Transaction::new(self.dag.clone(),
                                   idempotency_key.clone(),
                                   self.flow_name.clone(),
                                   handler,
                                   initial_payload.unwrap_or(Value::Null));
        self.emit(Event::Begin { idempotency_key, flow_name: self.flow_name.clone() });
        tx
    }

    /// Conduce la ejecución hasta que la transacción se vuelve terminal,
    /// queda bloqueada en un step asíncrono, o se agota el trabajo
    /// actualmente disponible. Un segundo `resume` sobre una transacción
    /// terminal es un no-op.
    pub async fn resume(&self, tx: &mut Transaction) -> Result<(), OrchestratorError> {
        if tx.status.is_terminal() {
            return Ok(());
        }
        if tx.status == TransactionStatus::NotStarted {
            tx.status = TransactionStatus::Invoking;
        }
        self.emit(Event::Resume { idempotency_key: tx.idempotency_key.clone() });
        self.drive_forward(tx).await;
        Ok(())
    }

    /// Señal de finalización externa para un step `async`. Marca el nodo
    /// `InvokedOk` (o `Compensated`, si la sub-key era de compensación) y
    /// continúa el recorrido.
    pub async fn register_step_success(&self, tx: &mut Transaction, sub_key: &str, response: Option<Value>) -> Result<(), OrchestratorError> {
        let (node, handler_type) = *tx.key_index.get(sub_key).ok_or_else(|| OrchestratorError::UnknownSubKey(sub_key.to_string()))?;
        let action = tx.dag.node(node).action.clone();

        match handler_type {
            HandlerType::Invoke => {
                {
                    let record = tx.node_states.get_mut(&node).unwrap();
                    record.state = NodeState::InvokedOk;
                    record.last_response = response.clone();
                }
                tx.invocation_order.push(node);
                self.emit(Event::StepSuccess { idempotency_key: tx.idempotency_key.clone(),
                                               action,
                                               response: response.unwrap_or(Value::Null) });

                if tx.status == TransactionStatus::WaitingToCompensate {
                    if !self.has_outstanding_invoking(tx) {
                        let trigger = tx.pending_compensation_trigger.take().unwrap_or_default();
                        self.start_compensation(tx, trigger).await;
                    }
                } else {
                    self.drive_forward(tx).await;
                }
            }
            HandlerType::Compensate => {
                {
                    let record = tx.node_states.get_mut(&node).unwrap();
                    record.state = NodeState::Compensated;
                    record.last_response = response.clone();
                }
                self.emit(Event::StepSuccess { idempotency_key: tx.idempotency_key.clone(),
                                               action,
                                               response: response.unwrap_or(Value::Null) });
                self.drive_compensation(tx).await;
            }
        }
        Ok(())
    }

    /// Señal de fallo externa para un step `async`. Falla si el nodo sigue
    /// `Idle` (nunca fue invocado). A diferencia de un fallo sincrónico, esta
    /// señal es siempre terminal: no hay reintento interno posible para un
    /// step cuya resolución depende de un colaborador externo.
    pub async fn register_step_failure(&self, tx: &mut Transaction, sub_key: &str, failure_reason: Option<String>) -> Result<(), OrchestratorError> {
        let (node, handler_type) = *tx.key_index.get(sub_key).ok_or_else(|| OrchestratorError::UnknownSubKey(sub_key.to_string()))?;

        if tx.node_states[&node].state == NodeState::Idle {
            return Err(OrchestratorError::InvalidResumeState);
        }

        let dag_node = tx.dag.node(node).clone();
        let reason = failure_reason.unwrap_or_else(|| "external failure signal".to_string());

        match handler_type {
            HandlerType::Invoke => {
                {
                    let record = tx.node_states.get_mut(&node).unwrap();
                    record.state = NodeState::InvokeFailed;
                    record.failure_reason = Some(reason.clone());
                }
                self.emit(Event::StepFailure { idempotency_key: tx.idempotency_key.clone(),
                                               action: dag_node.action.clone(),
                                               reason });

                // Un step async ya disparó su efecto real al ser invocado;
                // un reporte externo de fallo no deshace eso, así que se
                // compensa igual aunque nunca haya llegado a InvokedOk.
                if dag_node.flags.async_step {
                    tx.invocation_order.push(node);
                }

                if tx.status == TransactionStatus::WaitingToCompensate {
                    if !self.has_outstanding_invoking(tx) {
                        let trigger = tx.pending_compensation_trigger.take().unwrap_or_else(|| dag_node.action.clone());
                        self.start_compensation(tx, trigger).await;
                    }
                } else if !self.has_outstanding_invoking(tx) {
                    self.start_compensation(tx, dag_node.action.clone()).await;
                } else {
                    tx.status = TransactionStatus::WaitingToCompensate;
                    tx.pending_compensation_trigger = Some(dag_node.action.clone());
                }
            }
            HandlerType::Compensate => {
                {
                    let record = tx.node_states.get_mut(&node).unwrap();
                    record.failure_reason = Some(reason.clone());
                }
                self.emit(Event::StepFailure { idempotency_key: tx.idempotency_key.clone(),
                                               action: dag_node.action.clone(),
                                               reason });
                tx.status = TransactionStatus::Failed;
                self.emit(Event::Failed { idempotency_key: tx.idempotency_key.clone(), action: dag_node.action });
                self.emit_finish(tx);
            }
        }
        Ok(())
    }

    /// Sub-key determinista de idempotencia: `<idempotencyKey>:<action>:<handlerType>`.
    pub fn get_key_name(idempotency_key: &str, action: &str, handler_type: HandlerType) -> String {
        format!("{idempotency_key}:{action}:{}", handler_type.as_str_lower())
    }

    fn emit(&self, event: Event) {
        if let Ok(bus) = self.events.lock() {
            bus.emit(event);
        }
    }

    fn emit_finish(&self, tx: &Transaction) {
        self.emit(Event::Finish { idempotency_key: tx.idempotency_key.clone(), status: tx.status });
    }

    fn has_outstanding_invoking(&self, tx: &Transaction) -> bool {
        tx.node_states.values().any(|record| record.state == NodeState::Invoking)
    }

    /// El `data` de un nodo es siempre el `initialPayload` original, más
    /// `_response` si su padre directo tiene `forwardResponse: true`. Nunca
    /// se acumula a través de generaciones (§4.2.3).
    fn build_node_data(&self, tx: &Transaction, node: NodeId) -> Value {
        let dag_node = tx.dag.node(node);
        match dag_node.parent {
            None => tx.initial_payload.clone(),
            Some(parent) => {
                let parent_node = tx.dag.node(parent);
                if parent_node.flags.forward_response {
                    build_data(&tx.initial_payload, tx.node_states[&parent].last_response.as_ref())
                } else {
                    tx.initial_payload.clone()
                }
            }
        }
    }

    /// Calcula el lote de nodos despachables en este pase. Expande de forma
    /// transitiva las cadenas `noWait`: un hijo cuyo padre está a punto de
    /// entrar en `Invoking` en este mismo lote también queda listo, en el
    /// mismo pase, tal como exige §4.2.1 punto 4.
    fn ready_batch(&self, tx: &Transaction) -> Vec<NodeId> {
        let mut batch: Vec<NodeId> = Vec::new();
        let mut batch_set: HashSet<NodeId> = HashSet::new();

        loop {
            let mut added = false;
            for dag_node in tx.dag.nodes_in_definition_order() {
                let node = dag_node.index;
                if batch_set.contains(&node) {
                    continue;
                }
                if tx.node_states[&node].state != NodeState::Idle {
                    continue;
                }
                let parent_ready = match dag_node.parent {
                    None => true,
                    Some(parent) => {
                        let parent_state = tx.node_states[&parent].state;
                        let parent_flags = tx.dag.node(parent).flags;
                        parent_state == NodeState::InvokedOk
                        || parent_state == NodeState::PermanentFailureSkipped
                        || (parent_flags.no_wait && (parent_state == NodeState::Invoking || batch_set.contains(&parent)))
                    }
                };
                if parent_ready {
                    batch.push(node);
                    batch_set.insert(node);
                    added = true;
                }
            }
            if !added {
                break;
            }
        }

        batch
    }

    /// Despacha un lote completo de nodos concurrentemente (join_all) y
    /// aplica sus resultados. Devuelve la acción del primer nodo que agotó
    /// reintentos sin `continueOnPermanentFailure`, si alguno lo hizo.
    async fn dispatch_batch(&self, tx: &mut Transaction, batch: &[NodeId]) -> Option<String> {
        let mut tasks = Vec::with_capacity(batch.len());

        for &node in batch {
            let dag_node = tx.dag.node(node).clone();
            let data = self.build_node_data(tx, node);
            tx.node_states.get_mut(&node).unwrap().state = NodeState::Invoking;
            self.emit(Event::StepBegin { idempotency_key: tx.idempotency_key.clone(),
                                         action: dag_node.action.clone(),
                                         attempt: 1 });

            let handler = tx.handler.clone();
            let flow_name = tx.flow_name.clone();
            let idempotency_key = tx.idempotency_key.clone();
            let is_async = dag_node.flags.async_step;
            let max_retries = dag_node.flags.max_retries;
            let action = dag_node.action.clone();

            tasks.push(async move {
                if is_async {
                    let payload = build_payload(&flow_name, &idempotency_key, &action, HandlerType::Invoke, 1, data.clone());
                    let _ = handler.call(&action, HandlerType::Invoke, payload).await;
                    (node, 1u32, None)
                } else {
                    let mut attempt = 1u32;
                    loop {
                        let payload = build_payload(&flow_name, &idempotency_key, &action, HandlerType::Invoke, attempt, data.clone());
                        match handler.call(&action, HandlerType::Invoke, payload).await {
                            Ok(value) => break (node, attempt, Some(Ok(value))),
                            Err(reason) => {
                                if RETRY_POLICY.should_retry(RetryAttempt { attempt, max_retries }) {
                                    attempt += 1;
                                } else {
                                    break (node, attempt, Some(Err(reason)));
                                }
                            }
                        }
                    }
                }
            });
        }

        let results = join_all(tasks).await;
        let mut trigger: Option<String> = None;

        for (node, attempts_used, outcome) in results {
            let dag_node = tx.dag.node(node).clone();
            let record = tx.node_states.get_mut(&node).unwrap();
            record.attempts = attempts_used;

            match outcome {
                None => {
                    // async: permanece Invoking hasta una señal externa.
                }
                Some(Ok(value)) => {
                    record.state = NodeState::InvokedOk;
                    record.last_response = Some(value.clone());
                    tx.invocation_order.push(node);
                    self.emit(Event::StepSuccess { idempotency_key: tx.idempotency_key.clone(),
                                                   action: dag_node.action.clone(),
                                                   response: value });
                }
                Some(Err(reason)) => {
                    if dag_node.flags.continue_on_permanent_failure {
                        record.state = NodeState::PermanentFailureSkipped;
                        record.failure_reason = Some(reason.clone());
                        tx.is_partially_completed = true;
                        self.emit(Event::StepFailure { idempotency_key: tx.idempotency_key.clone(),
                                                       action: dag_node.action.clone(),
                                                       reason });
                    } else {
                        record.state = NodeState::InvokeFailed;
                        record.failure_reason = Some(reason.clone());
                        self.emit(Event::StepFailure { idempotency_key: tx.idempotency_key.clone(),
                                                       action: dag_node.action.clone(),
                                                       reason });
                        if trigger.is_none() {
                            trigger = Some(dag_node.action.clone());
                        }
                    }
                }
            }
        }

        trigger
    }

    /// El bucle de pases de §4.2.1. Cada iteración despacha un lote completo
    /// y espera su asentamiento antes de reconsiderar el conjunto listo. Si
    /// un lote dispara compensación, no se vuelve a calcular un lote
    /// siguiente aunque algún hermano recién completado hubiese abierto
    /// nuevos nodos listos (S5).
    async fn drive_forward(&self, tx: &mut Transaction) {
        if tx.status.is_terminal() {
            return;
        }
        if matches!(tx.status, TransactionStatus::Compensating | TransactionStatus::WaitingToCompensate) {
            return;
        }

        loop {
            let batch = self.ready_batch(tx);
            if batch.is_empty() {
                if self.has_outstanding_invoking(tx) {
                    return;
                }
                tx.status = TransactionStatus::Done;
                self.emit_finish(tx);
                return;
            }

            if let Some(trigger) = self.dispatch_batch(tx, &batch).await {
                if self.has_outstanding_invoking(tx) {
                    tx.status = TransactionStatus::WaitingToCompensate;
                    tx.pending_compensation_trigger = Some(trigger);
                } else {
                    self.start_compensation(tx, trigger).await;
                }
                return;
            }
        }
    }

    async fn start_compensation(&self, tx: &mut Transaction, triggered_by: String) {
        if tx.invocation_order.is_empty() {
            tx.status = TransactionStatus::Failed;
            self.emit(Event::Failed { idempotency_key: tx.idempotency_key.clone(), action: triggered_by });
            self.emit_finish(tx);
            return;
        }

        tx.status = TransactionStatus::Compensating;
        self.emit(Event::CompensateBegin { idempotency_key: tx.idempotency_key.clone(), triggered_by });
        tx.compensation_queue = std::mem::take(&mut tx.invocation_order);
        self.drive_compensation(tx).await;
    }

    /// Recorre `compensation_queue` en reversa (pop desde el final, que es el
    /// orden de invocación original). Se detiene y deja la transacción en
    /// `Compensating` si un nodo `async` bloquea a la espera de una
    /// resolución externa sobre su sub-key de compensación.
    async fn drive_compensation(&self, tx: &mut Transaction) {
        loop {
            let Some(node) = tx.compensation_queue.pop() else {
                tx.status = TransactionStatus::Reverted;
                self.emit(Event::Reverted { idempotency_key: tx.idempotency_key.clone() });
                self.emit_finish(tx);
                return;
            };

            let dag_node = tx.dag.node(node).clone();
            {
                let record = tx.node_states.get_mut(&node).unwrap();
                record.state = NodeState::Compensating;
                record.compensate_attempts = 0;
            }
            let data = self.build_node_data(tx, node);
            self.emit(Event::StepBegin { idempotency_key: tx.idempotency_key.clone(),
                                         action: dag_node.action.clone(),
                                         attempt: 1 });

            if dag_node.flags.async_step {
                let handler = tx.handler.clone();
                let payload =
                    build_payload(&tx.flow_name, &tx.idempotency_key, &dag_node.action, HandlerType::Compensate, 1, data);
                let _ = handler.call(&dag_node.action, HandlerType::Compensate, payload).await;
                return;
            }

            let handler = tx.handler.clone();
            let flow_name = tx.flow_name.clone();
            let idempotency_key = tx.idempotency_key.clone();
            let max_retries = dag_node.flags.max_retries;
            let action = dag_node.action.clone();
            let mut attempt = 1u32;
            let outcome = loop {
                let payload = build_payload(&flow_name, &idempotency_key, &action, HandlerType::Compensate, attempt, data.clone());
                match handler.call(&action, HandlerType::Compensate, payload).await {
                    Ok(value) => break Ok(value),
                    Err(reason) => {
                        if RETRY_POLICY.should_retry(RetryAttempt { attempt, max_retries }) {
                            attempt += 1;
                        } else {
                            break Err(reason);
                        }
                    }
                }
            };

            let record = tx.node_states.get_mut(&node).unwrap();
            record.compensate_attempts = attempt;
            match outcome {
                Ok(value) => {
                    record.state = NodeState::Compensated;
                    record.last_response = Some(value.clone());
                    self.emit(Event::StepSuccess { idempotency_key: tx.idempotency_key.clone(), action, response: value });
                }
                Err(reason) => {
                    record.failure_reason = Some(reason.clone());
                    self.emit(Event::StepFailure { idempotency_key: tx.idempotency_key.clone(), action: action.clone(), reason });
                    tx.status = TransactionStatus::Failed;
                    self.emit(Event::Failed { idempotency_key: tx.idempotency_key.clone(), action });
                    self.emit_finish(tx);
                    return;
                }
            }
        }
    }
}
