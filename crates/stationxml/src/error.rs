//! Error types for StationXML reading.

use thiserror::Error;

/// Errors that can occur while reading a StationXML document.
#[derive(Debug, Error)]
pub enum StationXmlError {
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Unexpected root element '{0}', expected FDSNStationXML")]
    UnexpectedRoot(String),

    #[error("Document ended inside <{0}>")]
    Unterminated(String),

    #[error("{context}: missing {field}")]
    Missing { context: String, field: String },

    #[error("{context}: invalid {field} '{value}': {reason}")]
    InvalidValue {
        context: String,
        field: String,
        value: String,
        reason: String,
    },
}

impl StationXmlError {
    pub fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Missing {
            context: context.into(),
            field: field.into(),
        }
    }

    pub fn invalid(
        context: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidValue {
            context: context.into(),
            field: field.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for StationXML operations.
pub type StationXmlResult<T> = Result<T, StationXmlError>;
