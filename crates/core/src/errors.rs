use thiserror::Error;

use crate::ports::AdapterError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid perspective `{0}` (expected team|pic|pid|mid|product|zid)")]
    InvalidPerspective(String),
    #[error("invalid tier filter `{0}` (expected A|B|C|NEW|LOST)")]
    InvalidTierFilter(String),
    #[error("invalid period: {0}")]
    InvalidPeriod(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("invalid drill-down: {0}")]
    InvalidDrillDown(String),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("comparison was cancelled before ranking")]
    Cancelled,
}

impl EngineError {
    /// Input-validation failures are raised before any adapter call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPerspective(_)
                | Self::InvalidTierFilter(_)
                | Self::InvalidPeriod(_)
                | Self::InvalidFilter(_)
                | Self::InvalidDrillDown(_)
        )
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl EngineError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<EngineError> for InterfaceError {
    fn from(value: EngineError) -> Self {
        let message = value.to_string();
        match value {
            EngineError::InvalidPerspective(_)
            | EngineError::InvalidTierFilter(_)
            | EngineError::InvalidPeriod(_)
            | EngineError::InvalidFilter(_)
            | EngineError::InvalidDrillDown(_) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            EngineError::Adapter(_) | EngineError::Cancelled => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{EngineError, InterfaceError};
    use crate::ports::{AdapterError, Collaborator};

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface =
            EngineError::InvalidPerspective("country".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ref message,
            } if correlation_id == "req-1" && message.contains("country")
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn adapter_failure_maps_to_service_unavailable() {
        let interface = EngineError::from(AdapterError::new(
            Collaborator::Aggregation,
            "warehouse query timed out",
        ))
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn only_input_errors_count_as_validation() {
        assert!(EngineError::InvalidTierFilter("Z".to_owned()).is_validation());
        assert!(!EngineError::Cancelled.is_validation());
    }
}
