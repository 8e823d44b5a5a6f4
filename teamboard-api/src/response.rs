//! Response envelope for mutations
//!
//! Every create, update and delete answers `{ "success": true, "message": ...,
//! "data": ... }`. Failures carry `"success": false` through
//! [`ErrorResponse`](crate::error::ErrorResponse). Deletes have no `data`.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MutationResponse<T: Serialize> {
    pub success: bool,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> MutationResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl MutationResponse<()> {
    /// Envelope for a mutation that returns nothing
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}
