//! txo-cli: demo de línea de comandos del Transaction Orchestrator.
//!
//! Arma un flujo de ejemplo de dos steps en serie ("reserveFlight" ->
//! "chargeCard"), lo ejecuta con un `Handler` de cierre simple, persiste cada
//! `Event` emitido en un `InMemoryEventLog` y muestra el log final.

use std::sync::Arc;

use serde_json::json;
use txo_core::{Event, Handler, HandlerType, Orchestrator, Payload};
use txo_domain::FlowDefinition;
use txo_persistence::{append_event, EventLog, InMemoryEventLog};

struct PrintingHandler;

#[async_trait::async_trait]
impl Handler for PrintingHandler {
    async fn call(&self, action: &str, handler_type: HandlerType, payload: Payload) -> Result<serde_json::Value, String> {
        log::info!("dispatch action={action} type={handler_type} data={}", payload.data);
        match action {
            "chargeCard" => Err("card declined".to_string()),
            _ => Ok(json!({ "action": action, "ok": true })),
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let def = FlowDefinition::linear(&["reserveFlight", "chargeCard"]);
    let orchestrator = Orchestrator::new("book-trip", &def).expect("valid flow");

    let log: Arc<InMemoryEventLog> = Arc::new(InMemoryEventLog::new());
    let log_for_listener = log.clone();
    orchestrator.on(Box::new(move |event: &Event| {
                    if let Err(e) = append_event(log_for_listener.as_ref(), event) {
                        log::warn!("failed to persist event: {e}");
                    }
                }));

    let handler = Arc::new(PrintingHandler);
    let mut tx = orchestrator.begin_transaction("trip-42", handler, Some(json!({ "passenger": "A. Rivas" })));

    orchestrator.resume(&mut tx).await.expect("resume should not error");

    println!("transaction status: {:?}", tx.status);
    for row in log.list("trip-42").expect("list events") {
        println!("  [{}] {} {}", row.seq, row.event_type, row.payload);
    }
}
