//! txorch-demo: ejecuta dos sagas de ejemplo contra el motor del
//! Transaction Orchestrator para ilustrar el camino feliz y la
//! compensación en reversa.

use std::sync::Arc;

use serde_json::json;
use txorch::{
    append_event, Event, EventLog, FlowDefinition, FlowNode, Handler, HandlerType, InMemoryEventLog, Orchestrator, Payload, StepFlags,
    TransactionStatus,
};

struct DemoHandler;

#[async_trait::async_trait]
impl Handler for DemoHandler {
    async fn call(&self, action: &str, handler_type: HandlerType, payload: Payload) -> Result<serde_json::Value, String> {
        log::info!("{handler_type} {action} attempt={} data={}", payload.metadata.attempt, payload.data);
        match action {
            "chargeCard" => Err("card declined".to_string()),
            _ => Ok(json!({ "action": action })),
        }
    }
}

async fn run_happy_path(log: Arc<InMemoryEventLog>) {
    let def = FlowDefinition::parallel(vec![FlowNode::leaf("reserveFlight"), FlowNode::leaf("reserveHotel")]);
    let orchestrator = Orchestrator::new("book-trip-ok", &def).expect("valid flow");
    subscribe(&orchestrator, log.clone());

    let handler = Arc::new(DemoHandler);
    let mut tx = orchestrator.begin_transaction("trip-ok-1", handler, Some(json!({ "passenger": "A. Rivas" })));
    orchestrator.resume(&mut tx).await.expect("resume should not error");

    println!("happy path -> {:?}", tx.status);
    assert_eq!(tx.status, TransactionStatus::Done);
}

async fn run_compensated_path(log: Arc<InMemoryEventLog>) {
    let flags = StepFlags { max_retries: 1, ..Default::default() };
    let def = FlowDefinition::single(FlowNode::then("reserveFlight", FlowNode::leaf("chargeCard").with_flags(flags)));
    let orchestrator = Orchestrator::new("book-trip-fail", &def).expect("valid flow");
    subscribe(&orchestrator, log.clone());

    let handler = Arc::new(DemoHandler);
    let mut tx = orchestrator.begin_transaction("trip-fail-1", handler, Some(json!({ "passenger": "B. Soto" })));
    orchestrator.resume(&mut tx).await.expect("resume should not error");

    println!("compensated path -> {:?}", tx.status);
    assert_eq!(tx.status, TransactionStatus::Reverted);
}

fn subscribe(orchestrator: &Orchestrator, log: Arc<InMemoryEventLog>) {
    orchestrator.on(Box::new(move |event: &Event| {
                    if let Err(e) = append_event(log.as_ref(), event) {
                        log::warn!("failed to persist event: {e}");
                    }
                }));
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let log = Arc::new(InMemoryEventLog::new());
    run_happy_path(log.clone()).await;
    run_compensated_path(log.clone()).await;

    for key in ["trip-ok-1", "trip-fail-1"] {
        println!("-- events for {key} --");
        for row in log.list(key).expect("list events") {
            println!("  [{}] {} {}", row.seq, row.event_type, row.payload);
        }
    }
}
