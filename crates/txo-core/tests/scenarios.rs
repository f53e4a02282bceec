//! Escenarios de extremo a extremo del runtime del orquestador, uno por cada
//! combinación de reintentos / fan-out paralelo / compensación / forwarding /
//! steps asíncronos.

use std::sync::Arc;

use serde_json::json;

use txo_adapters::{Scripted, ScriptedHandler};
use txo_core::{Orchestrator, TransactionStatus};
use txo_domain::{FlowDefinition, FlowNode, StepFlags};

#[tokio::test]
async fn s1_linear_success() {
    let def = FlowDefinition::linear(&["firstMethod", "secondMethod"]);
    let orch = Orchestrator::new("s1", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    let mut tx = orch.begin_transaction("tx-1", handler.clone(), Some(json!({"x": 1})));

    orch.resume(&mut tx).await.unwrap();

    assert_eq!(tx.status, TransactionStatus::Done);
    assert_eq!(handler.invoked_actions(), vec!["firstMethod", "secondMethod"]);

    let calls = handler.calls();
    assert_eq!(calls[0].attempt, 1);
    assert_eq!(calls[0].action_type, "invoke");
    assert_eq!(calls[0].sub_key, Orchestrator::get_key_name("tx-1", "firstMethod", txo_core::HandlerType::Invoke));
}

#[tokio::test]
async fn s2_parallel_level_order() {
    let def = FlowDefinition::parallel(vec![FlowNode::leaf("one"),
                                             FlowNode::then("two", FlowNode::then("four", FlowNode::leaf("six"))),
                                             FlowNode::then("three", FlowNode::leaf("five")),]);
    let orch = Orchestrator::new("s2", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    let mut tx = orch.begin_transaction("tx-2", handler.clone(), None);

    orch.resume(&mut tx).await.unwrap();

    assert_eq!(tx.status, TransactionStatus::Done);
    assert_eq!(handler.invoked_actions(), vec!["one", "two", "three", "four", "five", "six"]);
}

#[tokio::test]
async fn s3_failure_halts_forward_progress() {
    let def = FlowDefinition::parallel(vec![FlowNode::leaf("one"),
                                             FlowNode::then("two", FlowNode::then("four", FlowNode::leaf("six"))),
                                             FlowNode::then("three", FlowNode::leaf("five"))
                                                 .with_flags(StepFlags { max_retries: 0, ..Default::default() }),]);
    let orch = Orchestrator::new("s3", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    handler.on_invoke("three", vec![Scripted::Err("boom".to_string())]);
    let mut tx = orch.begin_transaction("tx-3", handler.clone(), None);

    orch.resume(&mut tx).await.unwrap();

    assert_eq!(handler.invoked_actions(), vec!["one", "two", "three"]);
    assert!(!handler.invoked_actions().contains(&"five".to_string()));
    assert_eq!(tx.status, TransactionStatus::Reverted);
}

#[tokio::test]
async fn s4_response_forwarding() {
    let flags = StepFlags { forward_response: true, ..Default::default() };
    let def =
        FlowDefinition::single(FlowNode::then("step1", FlowNode::then("step2", FlowNode::leaf("step3")).with_flags(flags)).with_flags(flags));
    let orch = Orchestrator::new("s4", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    handler.on_invoke("step1", vec![Scripted::Ok(json!({"abc": 1234}))]);
    handler.on_invoke("step2", vec![Scripted::Ok(json!({"def": "567"}))]);
    let mut tx = orch.begin_transaction("tx-4", handler.clone(), Some(json!({"prop": 123})));

    orch.resume(&mut tx).await.unwrap();

    assert_eq!(tx.status, TransactionStatus::Done);
    let calls = handler.calls();
    let step2 = calls.iter().find(|c| c.action == "step2" && c.handler_type == txo_core::HandlerType::Invoke).unwrap();
    assert_eq!(step2.data, json!({"prop": 123, "_response": {"abc": 1234}}));
    let step3 = calls.iter().find(|c| c.action == "step3" && c.handler_type == txo_core::HandlerType::Invoke).unwrap();
    assert_eq!(step3.data, json!({"prop": 123, "_response": {"def": "567"}}));
}

#[tokio::test]
async fn s5_no_wait_downstream_progress() {
    let no_wait = StepFlags { no_wait: true, ..Default::default() };
    let throws = StepFlags { max_retries: 0, ..Default::default() };
    let def = FlowDefinition::parallel(vec![FlowNode::then("one", FlowNode::leaf("five")),
                                             FlowNode::then("two", FlowNode::leaf("four")).with_flags(no_wait),
                                             FlowNode::leaf("three").with_flags(throws),]);
    let orch = Orchestrator::new("s5", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    handler.on_invoke("three", vec![Scripted::Err("boom".to_string())]);
    let mut tx = orch.begin_transaction("tx-5", handler.clone(), None);

    orch.resume(&mut tx).await.unwrap();

    assert_eq!(handler.invoked_actions(), vec!["one", "two", "three", "four"]);
    assert_eq!(tx.status, TransactionStatus::Reverted);
}

#[tokio::test]
async fn s6_retries_then_compensation() {
    let def = FlowDefinition::linear(&["firstMethod", "secondMethod"]);
    let orch = Orchestrator::new("s6", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    handler.on_invoke("secondMethod", vec![Scripted::Err("boom".to_string())]);
    let mut tx = orch.begin_transaction("tx-6", handler.clone(), None);

    orch.resume(&mut tx).await.unwrap();

    let second_calls: Vec<_> =
        handler.calls().into_iter().filter(|c| c.action == "secondMethod" && c.handler_type == txo_core::HandlerType::Invoke).collect();
    assert_eq!(second_calls.len(), 1 + txo_core::DEFAULT_RETRIES as usize);
    assert_eq!(second_calls.first().unwrap().attempt, 1);
    assert_eq!(second_calls.last().unwrap().attempt, 4);

    assert_eq!(handler.compensated_actions(), vec!["firstMethod"]);
    assert_eq!(tx.status, TransactionStatus::Reverted);
}

#[tokio::test]
async fn s7_permanent_failure_on_root() {
    let def = FlowDefinition::single(FlowNode::leaf("firstMethod"));
    let orch = Orchestrator::new("s7", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    handler.on_invoke("firstMethod", vec![Scripted::Err("boom".to_string())]);
    let mut tx = orch.begin_transaction("tx-7", handler.clone(), None);

    orch.resume(&mut tx).await.unwrap();

    assert_eq!(handler.invoked_actions().len(), 1 + txo_core::DEFAULT_RETRIES as usize);
    assert!(handler.compensated_actions().is_empty());
    assert_eq!(tx.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn s8_continue_on_permanent_failure() {
    let flags = StepFlags { max_retries: 1, continue_on_permanent_failure: true, ..Default::default() };
    let def = FlowDefinition::single(FlowNode::then("firstMethod", FlowNode::leaf("secondMethod").with_flags(flags)));
    let orch = Orchestrator::new("s8", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    handler.on_invoke("secondMethod", vec![Scripted::Err("boom".to_string())]);
    let mut tx = orch.begin_transaction("tx-8", handler.clone(), None);

    orch.resume(&mut tx).await.unwrap();

    assert_eq!(handler.invoked_actions(), vec!["firstMethod", "secondMethod", "secondMethod"]);
    assert_eq!(tx.status, TransactionStatus::Done);
    assert!(tx.is_partially_completed);
}

#[tokio::test]
async fn s9_async_invoke_suspends() {
    let flags = StepFlags { async_step: true, ..Default::default() };
    let def = FlowDefinition::single(FlowNode::then("firstMethod", FlowNode::leaf("secondMethod")).with_flags(flags));
    let orch = Orchestrator::new("s9", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    let mut tx = orch.begin_transaction("tx-9", handler.clone(), None);

    orch.resume(&mut tx).await.unwrap();

    assert_eq!(handler.invoked_actions(), vec!["firstMethod"]);
    assert_eq!(tx.status, TransactionStatus::Invoking);

    let sub_key = Orchestrator::get_key_name("tx-9", "firstMethod", txo_core::HandlerType::Invoke);
    orch.register_step_success(&mut tx, &sub_key, None).await.unwrap();

    assert_eq!(tx.status, TransactionStatus::Done);
    assert_eq!(handler.invoked_actions(), vec!["firstMethod", "secondMethod"]);
}

#[tokio::test]
async fn s10_async_failure_drives_compensation() {
    let flags = StepFlags { async_step: true, ..Default::default() };
    let def = FlowDefinition::single(FlowNode::then("firstMethod", FlowNode::leaf("secondMethod")).with_flags(flags));
    let orch = Orchestrator::new("s10", &def).unwrap();
    let handler = Arc::new(ScriptedHandler::new());
    let mut tx = orch.begin_transaction("tx-10", handler.clone(), None);

    let invoke_key = Orchestrator::get_key_name("tx-10", "firstMethod", txo_core::HandlerType::Invoke);

    let err = orch.register_step_failure(&mut tx, &invoke_key, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Cannot set step failure when status is idle");

    orch.resume(&mut tx).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Invoking);

    orch.register_step_failure(&mut tx, &invoke_key, Some("timed out".to_string())).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Compensating);
    assert_eq!(handler.compensated_actions(), vec!["firstMethod"]);

    let compensate_key = Orchestrator::get_key_name("tx-10", "firstMethod", txo_core::HandlerType::Compensate);
    orch.register_step_success(&mut tx, &compensate_key, None).await.unwrap();

    assert_eq!(tx.status, TransactionStatus::Reverted);
}
