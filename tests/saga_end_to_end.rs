//! Saga de extremo a extremo ejercitada a través de la fachada pública
//! `txorch`, para confirmar que los re-exports cubren lo que un consumidor
//! externo necesita sin depender de los crates del workspace por separado.

use std::sync::Arc;

use serde_json::json;
use txorch::{
    append_event, Event, EventLog, FlowDefinition, Handler, HandlerType, InMemoryEventLog, Orchestrator, Payload, TransactionStatus,
};

struct AlwaysOk;

#[async_trait::async_trait]
impl Handler for AlwaysOk {
    async fn call(&self, action: &str, _handler_type: HandlerType, _payload: Payload) -> Result<serde_json::Value, String> {
        Ok(json!({ "action": action }))
    }
}

#[tokio::test]
async fn happy_path_persists_one_finish_event() {
    let def = FlowDefinition::linear(&["reserveFlight", "chargeCard"]);
    let orchestrator = Orchestrator::new("book-trip", &def).unwrap();

    let log = Arc::new(InMemoryEventLog::new());
    let log_for_listener = log.clone();
    orchestrator.on(Box::new(move |event: &Event| {
                    append_event(log_for_listener.as_ref(), event).unwrap();
                }));

    let mut tx = orchestrator.begin_transaction("trip-1", Arc::new(AlwaysOk), Some(json!({ "passenger": "A" })));
    orchestrator.resume(&mut tx).await.unwrap();

    assert_eq!(tx.status, TransactionStatus::Done);

    let rows = log.list("trip-1").unwrap();
    let finishes: Vec<_> = rows.iter().filter(|r| r.event_type == "finish").collect();
    assert_eq!(finishes.len(), 1);
}
