use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RequiredField,
    Validation,
    NotFound,
    Forbidden,
    Unauthorized,
    ServiceNotConfigured,
    InvalidFeatureConfig,
    InvalidArgument,
    Duplicate,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiredField => "required_field",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Unauthorized => "unauthorized",
            Self::ServiceNotConfigured => "service_not_configured",
            Self::InvalidFeatureConfig => "invalid_feature_config",
            Self::InvalidArgument => "invalid_argument",
            Self::Duplicate => "duplicate",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature that is enabled while some of its dependencies are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureIssue {
    pub feature: String,
    pub missing: Vec<String>,
}

/// Domain error shared by every subsystem.
///
/// Carries a kind, a human readable message, free-form metadata and an
/// optional stable text code that clients can switch on.
#[derive(Debug, Clone, ThisError)]
#[error("{message}")]
pub struct AdminError {
    pub kind: ErrorKind,
    pub message: String,
    pub metadata: Map<String, Value>,
    pub code: Option<String>,
}

pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            metadata: Map::new(),
            code: None,
        }
    }

    pub fn required_field(field: &str) -> Self {
        Self::new(ErrorKind::RequiredField, format!("{field} is required"))
            .with_metadata("field", json!(field))
            .with_code("REQUIRED_FIELD")
    }

    /// Aggregate of field-scoped validation failures, exposed as `metadata.fields`.
    pub fn validation(fields: BTreeMap<String, String>) -> Self {
        let message = match fields.len() {
            1 => "validation failed for 1 field".to_string(),
            n => format!("validation failed for {n} fields"),
        };
        let fields: Map<String, Value> = fields
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Self::new(ErrorKind::Validation, message)
            .with_metadata("fields", Value::Object(fields))
            .with_code("VALIDATION_FAILED")
    }

    pub fn field(field: &str, message: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.to_string());
        Self::validation(fields)
    }

    pub fn not_found(what: &str, key: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{what} '{key}' not found"))
            .with_metadata("resource", json!(what))
            .with_metadata("key", json!(key))
            .with_code("NOT_FOUND")
    }

    pub fn forbidden(permission: &str) -> Self {
        Self::new(ErrorKind::Forbidden, format!("permission '{permission}' denied"))
            .with_metadata("permission", json!(permission))
            .with_code("FORBIDDEN")
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message).with_code("UNAUTHORIZED")
    }

    pub fn service_not_configured(service: &str) -> Self {
        Self::new(
            ErrorKind::ServiceNotConfigured,
            format!("{service} is not configured"),
        )
        .with_metadata("service", json!(service))
        .with_code("SERVICE_NOT_CONFIGURED")
    }

    pub fn invalid_feature_config(issues: Vec<FeatureIssue>) -> Self {
        let summary = issues
            .iter()
            .map(|issue| format!("{} requires {}", issue.feature, issue.missing.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        let value = serde_json::to_value(&issues).unwrap_or(Value::Array(Vec::new()));
        Self::new(
            ErrorKind::InvalidFeatureConfig,
            format!("invalid feature configuration: {summary}"),
        )
        .with_metadata("issues", value)
        .with_code("INVALID_FEATURE_CONFIG")
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message).with_code("INVALID_ARGUMENT")
    }

    pub fn duplicate(what: &str, key: &str) -> Self {
        Self::new(ErrorKind::Duplicate, format!("{what} '{key}' already registered"))
            .with_metadata("resource", json!(what))
            .with_metadata("key", json!(key))
            .with_code("DUPLICATE")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message).with_code("CONFLICT")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Field messages of a validation error, empty for any other kind.
    pub fn fields(&self) -> BTreeMap<String, String> {
        self.metadata
            .get("fields")
            .and_then(Value::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn issues(&self) -> Vec<FeatureIssue> {
        self.metadata
            .get("issues")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Structured payload handed to HTTP adapters.
    pub fn to_payload(&self) -> Value {
        json!({
            "error": self.message,
            "kind": self.kind,
            "code": self.code,
            "metadata": self.metadata,
        })
    }
}

impl From<anyhow::Error> for AdminError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(domain) = err.downcast_ref::<AdminError>() {
            return domain.clone();
        }
        let message = format!("{err:#}");
        let lowered = message.to_lowercase();
        if lowered.contains("not found") || lowered.contains("no such") {
            return Self::new(ErrorKind::NotFound, message).with_code("NOT_FOUND");
        }
        Self::internal(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_exposes_fields() {
        let err = AdminError::field("feature.enabled", "expected boolean");
        assert!(err.is(ErrorKind::Validation));
        assert_eq!(
            err.fields().get("feature.enabled").map(String::as_str),
            Some("expected boolean")
        );
        assert_eq!(err.code.as_deref(), Some("VALIDATION_FAILED"));
    }

    #[test]
    fn test_feature_issues_round_trip_through_metadata() {
        let err = AdminError::invalid_feature_config(vec![FeatureIssue {
            feature: "bulk".to_string(),
            missing: vec!["commands".to_string(), "jobs".to_string()],
        }]);
        assert_eq!(err.kind, ErrorKind::InvalidFeatureConfig);
        assert_eq!(err.issues()[0].missing, vec!["commands", "jobs"]);
        assert!(err.message.contains("bulk requires commands, jobs"));
    }

    #[test]
    fn test_backend_missing_link_maps_to_not_found() {
        let err: AdminError = anyhow::anyhow!("menu item admin_main.x not found").into();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let err: AdminError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_domain_error_survives_anyhow_wrapping() {
        let original = AdminError::duplicate("panel", "users");
        let wrapped = anyhow::Error::new(original);
        let back: AdminError = wrapped.into();
        assert_eq!(back.kind, ErrorKind::Duplicate);
    }
}
