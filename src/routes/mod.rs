pub mod health;
pub mod menu;
pub mod metrics;
pub mod notifications;

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

use crate::error::PlanError;

pub type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Serialize a handler result into the JSON body.
pub(crate) fn respond<T: Serialize>(result: Result<T, PlanError>) -> ApiResult {
    let value = result.map_err(PlanError::into_response)?;
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| PlanError::Store(e.into()).into_response())
}
