//! Construcción del payload entregado a cada invocación del handler.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handler::HandlerType;

/// Metadatos deterministas que acompañan cada dispatch. `idempotency_key`
/// aquí es la sub-key derivada (ver `Orchestrator::get_key_name`), no la
/// idempotency key cruda de la transacción.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub producer: String,
    pub reply_to_topic: String,
    pub idempotency_key: String,
    pub action: String,
    pub action_type: String,
    pub attempt: u32,
    pub timestamp: i64,
}

/// Payload completo entregado al handler en cada dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub metadata: Metadata,
    pub data: Value,
}

/// Construye el payload de un dispatch. `data` ya debe venir fusionado con
/// `_response` si corresponde (ver `orchestrator::build_data`).
pub fn build_payload(flow_name: &str,
                     idempotency_key: &str,
                     action: &str,
                     handler_type: HandlerType,
                     attempt: u32,
                     data: Value)
                     -> Payload {
    let sub_key = crate::orchestrator::Orchestrator::get_key_name(idempotency_key, action, handler_type);
    Payload { metadata: Metadata { producer: flow_name.to_string(),
                                   reply_to_topic: format!("trans:{flow_name}"),
                                   idempotency_key: sub_key,
                                   action: action.to_string(),
                                   action_type: handler_type.as_str_lower().to_string(),
                                   attempt,
                                   timestamp: Utc::now().timestamp_millis() },
             data }
}

/// Fusiona `_response` en `initial_payload` cuando el padre tiene
/// `forward_response: true`. El mecanismo es superficial: sólo el hijo
/// directo recibe `_response`; el resto de `initial_payload` se conserva tal
/// cual.
pub fn build_data(initial_payload: &Value, parent_response: Option<&Value>) -> Value {
    let Some(resp) = parent_response else {
        return initial_payload.clone();
    };

    let mut merged = initial_payload.clone();
    if let Value::Object(map) = &mut merged {
        map.insert("_response".to_string(), resp.clone());
        merged
    } else {
        serde_json::json!({ "value": initial_payload.clone(), "_response": resp.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merges_response_into_object_payload() {
        let initial = json!({ "prop": 123 });
        let merged = build_data(&initial, Some(&json!({"abc": 1234})));
        assert_eq!(merged, json!({ "prop": 123, "_response": {"abc": 1234} }));
    }

    #[test]
    fn no_parent_response_passes_initial_through() {
        let initial = json!({ "prop": 123 });
        assert_eq!(build_data(&initial, None), initial);
    }
}
