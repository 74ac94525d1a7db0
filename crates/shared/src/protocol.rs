use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::EmployeeInput,
    error::{ApiError, ErrorCode},
};

/// Envelope wrapping every JSON response of the team management API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Converts a failed envelope into the error shown to the operator.
    pub fn into_error(self, code: ErrorCode) -> ApiError {
        let err = ApiError::new(code, self.message.unwrap_or_default());
        match self.error {
            Some(detail) => err.with_detail(detail),
            None => err,
        }
    }
}

/// Successful server reply: the payload plus the server's own message, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T> {
    pub data: T,
    pub message: Option<String>,
}

impl<T> Reply<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRequest {
    pub name: String,
}

/// Body for `POST /employees` and `PATCH /employees/{id}`. The server rejects
/// unknown keys on PATCH, so the id never travels in the body.
pub type EmployeeRequest = EmployeeInput;

/// Bean-validation failures arrive as a flat `{ field: message }` map.
pub fn field_errors_detail(raw: &BTreeMap<String, String>) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    Some(
        raw.iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Team;

    #[test]
    fn decodes_success_envelope() {
        let raw = r#"{"success":true,"message":"Team Dev added.","data":{"id":3,"name":"Dev"}}"#;
        let envelope: ApiResponse<Team> = serde_json::from_str(raw).expect("envelope");
        assert!(envelope.success);
        assert_eq!(envelope.data.map(|team| team.name).as_deref(), Some("Dev"));
    }

    #[test]
    fn absent_fields_decode_as_none_for_any_payload() {
        let envelope: ApiResponse<Team> =
            serde_json::from_str(r#"{"success":true}"#).expect("envelope");
        assert!(envelope.success);
        assert!(envelope.data.is_none());
        assert!(envelope.message.is_none());

        let empty: ApiResponse<Vec<Team>> = serde_json::from_str("{}").expect("envelope");
        assert!(!empty.success);
        assert!(empty.error.is_none());
    }

    #[test]
    fn failed_envelope_keeps_detail() {
        let raw = r#"{"success":false,"message":"Unexpected error.","error":"constraint violated"}"#;
        let envelope: ApiResponse<Team> = serde_json::from_str(raw).expect("envelope");
        let err = envelope.into_error(ErrorCode::Server);
        assert_eq!(err.message, "Unexpected error.");
        assert_eq!(err.detail.as_deref(), Some("constraint violated"));
    }

    #[test]
    fn joins_field_errors_in_stable_order() {
        let mut raw = BTreeMap::new();
        raw.insert("lastName".to_string(), "Last name is required".to_string());
        raw.insert("email".to_string(), "Invalid email address format".to_string());
        assert_eq!(
            field_errors_detail(&raw).as_deref(),
            Some("email: Invalid email address format; lastName: Last name is required")
        );
        assert_eq!(field_errors_detail(&BTreeMap::new()), None);
    }
}
