//! The `{success, data|error}` envelope every store procedure returns.

use serde::{Deserialize, Serialize};

use crate::error::{RejectionCode, Result, StoreError};
use crate::store::Procedure;

/// Raw procedure response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl<T> StoreEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn rejected(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: Some(code.into()),
        }
    }

    /// Interprets the envelope. A failed envelope without a code is reported
    /// as a rejection with code `UNKNOWN`.
    pub fn into_result(self, procedure: Procedure) -> Result<Option<T>> {
        if self.success {
            return Ok(self.data);
        }
        let message = self
            .error
            .unwrap_or_else(|| format!("{} failed", procedure.as_str()));
        let code = self.code.map_or_else(
            || RejectionCode::Other("UNKNOWN".to_string()),
            RejectionCode::from,
        );
        Err(StoreError::Rejected { code, message })
    }

    /// Like [`into_result`](Self::into_result) but a successful envelope must carry data.
    pub fn into_data(self, procedure: Procedure) -> Result<T> {
        self.into_result(procedure)?
            .ok_or_else(|| StoreError::MalformedEnvelope {
                procedure: procedure.as_str(),
                reason: "success without data".to_string(),
            })
    }
}
