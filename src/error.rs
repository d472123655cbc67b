//! Crate-wide error type and its HTTP / UPnP SOAP / process-exit surfaces.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// The error kinds a request or background task can produce.
///
/// Kinds, not concrete causes: callers match on these to decide how to
/// surface a failure, not to recover a specific I/O errno.
#[derive(Debug, thiserror::Error)]
pub enum EemsError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unsupported media type")]
    UnsupportedMedia,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("range not satisfiable")]
    RangeNotSatisfiable,

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("store corrupt: {0}")]
    Corrupt(String),

    #[error("i/o error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, EemsError>;

/// A UPnP error code carried in a SOAP `<s:Fault>` detail.
#[derive(Debug, Clone, Copy)]
pub struct UpnpFault {
    pub code: u32,
    pub description: &'static str,
}

impl EemsError {
    /// Invalid action / unknown SOAPACTION.
    pub const INVALID_ACTION: UpnpFault = UpnpFault { code: 401, description: "Invalid Action" };
    /// Invalid argument count/shape.
    pub const INVALID_ARGS: UpnpFault = UpnpFault { code: 402, description: "Invalid Args" };
    /// Argument value invalid (bad BrowseFlag).
    pub const ARG_VALUE_INVALID: UpnpFault = UpnpFault { code: 600, description: "Argument Value Invalid" };
    /// Argument value out of range (bad StartingIndex).
    pub const ARG_OUT_OF_RANGE: UpnpFault = UpnpFault { code: 601, description: "Argument Value Out of Range" };
    /// No such object.
    pub const NO_SUCH_OBJECT: UpnpFault = UpnpFault { code: 701, description: "No Such Object" };

    /// Maps this error onto the UPnP ContentDirectory fault code table.
    pub fn upnp_fault(&self) -> UpnpFault {
        match self {
            EemsError::NotFound(_) => Self::NO_SUCH_OBJECT,
            EemsError::BadArgument(_) => Self::ARG_VALUE_INVALID,
            EemsError::Malformed(_) => Self::INVALID_ARGS,
            _ => Self::ARG_VALUE_INVALID,
        }
    }

    /// Renders this error as a complete SOAP fault envelope body.
    pub fn to_soap_fault(&self) -> String {
        let fault = self.upnp_fault();
        format!(
            r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
<s:Body>
<s:Fault>
<faultcode>s:Client</faultcode>
<faultstring>UPnPError</faultstring>
<detail>
<UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
<errorCode>{}</errorCode>
<errorDescription>{}</errorDescription>
</UPnPError>
</detail>
</s:Fault>
</s:Body>
</s:Envelope>"#,
            fault.code, fault.description
        )
    }
}

impl IntoResponse for EemsError {
    fn into_response(self) -> Response {
        let status = match &self {
            EemsError::Malformed(_) => StatusCode::BAD_REQUEST,
            EemsError::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            EemsError::NotFound(_) => StatusCode::NOT_FOUND,
            EemsError::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            EemsError::BadArgument(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EemsError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EemsError::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EemsError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR)
            && matches!(self, EemsError::BadArgument(_) | EemsError::NotFound(_) | EemsError::Corrupt(_))
        {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

impl From<redb::DatabaseError> for EemsError {
    fn from(e: redb::DatabaseError) -> Self {
        EemsError::Fatal(e.to_string())
    }
}

impl From<redb::TransactionError> for EemsError {
    fn from(e: redb::TransactionError) -> Self {
        EemsError::IOError(std::io::Error::other(e.to_string()))
    }
}

impl From<redb::TableError> for EemsError {
    fn from(e: redb::TableError) -> Self {
        EemsError::IOError(std::io::Error::other(e.to_string()))
    }
}

impl From<redb::StorageError> for EemsError {
    fn from(e: redb::StorageError) -> Self {
        EemsError::IOError(std::io::Error::other(e.to_string()))
    }
}

impl From<redb::CommitError> for EemsError {
    fn from(e: redb::CommitError) -> Self {
        EemsError::IOError(std::io::Error::other(e.to_string()))
    }
}

impl From<bincode::error::EncodeError> for EemsError {
    fn from(e: bincode::error::EncodeError) -> Self {
        EemsError::Corrupt(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for EemsError {
    fn from(e: bincode::error::DecodeError) -> Self {
        EemsError::Corrupt(e.to_string())
    }
}
