//! Handler de guion: un `Handler` de prueba/demostración que devuelve
//! resultados preprogramados por acción y registra cada dispatch recibido.
//!
//! Pensado para ejercitar el runtime de `txo-core` sin colaboradores
//! externos reales: cada test arma el guion de antemano (qué responde o
//! lanza cada acción, y en qué intento) y luego inspecciona `calls()`.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use txo_core::{Handler, HandlerType, Payload};

/// Un dispatch recibido, tal como llegó al handler.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub action: String,
    pub handler_type: HandlerType,
    pub attempt: u32,
    pub data: Value,
    pub sub_key: String,
    pub action_type: String,
}

/// Resultado guionado para un `(action, handlerType)` en un intento dado.
#[derive(Debug, Clone)]
pub enum Scripted {
    Ok(Value),
    Err(String),
}

/// Handler guionado: mantiene, por `(action, handlerType)`, una secuencia de
/// resultados consumida en orden a medida que llegan los intentos. Si la
/// secuencia se agota, el último resultado se repite indefinidamente — útil
/// para modelar "siempre falla" sin enumerar cuatro entradas idénticas.
pub struct ScriptedHandler {
    script: Mutex<std::collections::HashMap<(String, &'static str), Vec<Scripted>>>,
    calls: Mutex<Vec<CallRecord>>,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self { script: Mutex::new(std::collections::HashMap::new()), calls: Mutex::new(Vec::new()) }
    }

    /// Arma el guion de una acción para `HandlerType::Invoke`.
    pub fn on_invoke(&self, action: impl Into<String>, outcomes: Vec<Scripted>) -> &Self {
        self.script.lock().unwrap().insert((action.into(), "invoke"), outcomes);
        self
    }

    /// Arma el guion de una acción para `HandlerType::Compensate`.
    pub fn on_compensate(&self, action: impl Into<String>, outcomes: Vec<Scripted>) -> &Self {
        self.script.lock().unwrap().insert((action.into(), "compensate"), outcomes);
        self
    }

    /// Historial de dispatches recibidos, en el orden en que llegaron.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    /// Acciones despachadas con `HandlerType::Invoke`, en orden, incluyendo
    /// repeticiones por reintento. No incluye dispatches de compensación.
    pub fn invoked_actions(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.handler_type == HandlerType::Invoke)
            .map(|c| c.action.clone())
            .collect()
    }

    /// Acciones despachadas con `HandlerType::Compensate`, en orden.
    pub fn compensated_actions(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.handler_type == HandlerType::Compensate)
            .map(|c| c.action.clone())
            .collect()
    }
}

impl Default for ScriptedHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for ScriptedHandler {
    async fn call(&self, action: &str, handler_type: HandlerType, payload: Payload) -> Result<Value, String> {
        self.calls.lock().unwrap().push(CallRecord { action: action.to_string(),
                                                      handler_type,
                                                      attempt: payload.metadata.attempt,
                                                      data: payload.data.clone(),
                                                      sub_key: payload.metadata.idempotency_key.clone(),
                                                      action_type: payload.metadata.action_type.clone() });

        let key = (action.to_string(), handler_type.as_str_lower());
        let outcome = {
            let script = self.script.lock().unwrap();
            match script.get(&key) {
                Some(outcomes) if !outcomes.is_empty() => {
                    let idx = (payload.metadata.attempt as usize - 1).min(outcomes.len() - 1);
                    outcomes[idx].clone()
                }
                _ => Scripted::Ok(Value::Null),
            }
        };

        match outcome {
            Scripted::Ok(value) => Ok(value),
            Scripted::Err(reason) => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txo_core::Metadata;

    fn payload(attempt: u32) -> Payload {
        Payload { metadata: Metadata { producer: "p".into(),
                                       reply_to_topic: "trans:p".into(),
                                       idempotency_key: "k:a:invoke".into(),
                                       action: "a".into(),
                                       action_type: "invoke".into(),
                                       attempt,
                                       timestamp: 0 },
                  data: Value::Null }
    }

    #[tokio::test]
    async fn repeats_last_scripted_outcome_past_the_end_of_the_sequence() {
        let handler = ScriptedHandler::new();
        handler.on_invoke("a", vec![Scripted::Err("first".into()), Scripted::Err("second".into())]);

        assert_eq!(handler.call("a", HandlerType::Invoke, payload(1)).await, Err("first".to_string()));
        assert_eq!(handler.call("a", HandlerType::Invoke, payload(2)).await, Err("second".to_string()));
        assert_eq!(handler.call("a", HandlerType::Invoke, payload(3)).await, Err("second".to_string()));
        assert_eq!(handler.invoked_actions(), vec!["a", "a", "a"]);
    }

    #[tokio::test]
    async fn unscripted_action_defaults_to_ok_null() {
        let handler = ScriptedHandler::new();
        assert_eq!(handler.call("b", HandlerType::Invoke, payload(1)).await, Ok(Value::Null));
    }
}
