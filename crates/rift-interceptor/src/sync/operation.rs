//! Operations sent to the remote mock process.

use crate::handler::TimesBudget;
use crate::request::HttpMethod;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One change applied on the remote side, scoped to an interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    pub interceptor_id: Uuid,
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl SyncOperation {
    pub fn new(interceptor_id: Uuid, kind: OperationKind) -> Self {
        Self {
            interceptor_id,
            kind,
        }
    }

    /// Short description used in logs and errors.
    pub fn describe(&self) -> String {
        match &self.kind {
            OperationKind::Attach { base_url } => format!("attach {base_url}"),
            OperationKind::Detach => "detach".to_string(),
            OperationKind::Reset => "reset".to_string(),
            OperationKind::RegisterEndpoint { method, path, .. } => {
                format!("register {method} {path}")
            }
            OperationKind::DeclareHandler {
                handler_id,
                declaration,
            } => format!("declare {declaration} on handler {handler_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OperationKind {
    /// Start intercepting requests under `base_url`
    Attach { base_url: String },
    /// Stop intercepting and forget every handler
    Detach,
    /// Forget every handler, staying attached
    Reset,
    /// A new handler was created for an endpoint
    RegisterEndpoint {
        handler_id: Uuid,
        method: HttpMethod,
        path: String,
    },
    /// A declaration call on an existing handler
    DeclareHandler {
        handler_id: Uuid,
        declaration: Declaration,
    },
}

/// The declaration call a `DeclareHandler` operation carries.
///
/// Computed restrictions and responses cannot cross the process boundary;
/// they are described instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Declaration {
    Restrict { restriction: String },
    Respond { status: Option<u16> },
    Times { budget: TimesBudget },
    Bypass,
    Clear,
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declaration::Restrict { .. } => f.write_str("restriction"),
            Declaration::Respond { status: Some(status) } => write!(f, "response {status}"),
            Declaration::Respond { status: None } => f.write_str("computed response"),
            Declaration::Times { budget } => write!(f, "times ({budget})"),
            Declaration::Bypass => f.write_str("bypass"),
            Declaration::Clear => f.write_str("clear"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn test_register_endpoint_wire_format() {
        let interceptor_id = Uuid::new_v4();
        let handler_id = Uuid::new_v4();
        let operation = SyncOperation::new(
            interceptor_id,
            OperationKind::RegisterEndpoint {
                handler_id,
                method: HttpMethod::Post,
                path: "/users/:id".to_string(),
            },
        );

        assert_json_eq!(
            serde_json::to_value(&operation).unwrap(),
            json!({
                "interceptorId": interceptor_id.to_string(),
                "type": "registerEndpoint",
                "handlerId": handler_id.to_string(),
                "method": "POST",
                "path": "/users/:id",
            })
        );
    }

    #[test]
    fn test_declaration_wire_format() {
        let interceptor_id = Uuid::new_v4();
        let handler_id = Uuid::new_v4();
        let operation = SyncOperation::new(
            interceptor_id,
            OperationKind::DeclareHandler {
                handler_id,
                declaration: Declaration::Times {
                    budget: TimesBudget::exact(2),
                },
            },
        );

        let value = serde_json::to_value(&operation).unwrap();
        assert_json_eq!(
            value["declaration"],
            json!({"kind": "times", "budget": {"type": "exact", "count": 2}})
        );

        let decoded: SyncOperation = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, operation);
    }

    #[test]
    fn test_describe() {
        let operation = SyncOperation::new(
            Uuid::nil(),
            OperationKind::Attach {
                base_url: "http://localhost:3000".to_string(),
            },
        );
        assert_eq!(operation.describe(), "attach http://localhost:3000");
        assert_eq!(
            Declaration::Respond { status: Some(201) }.to_string(),
            "response 201"
        );
    }
}
