use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Failures of the planning and notification operations.
///
/// Input errors are reported straight back to the caller and never retried.
/// `Store` wraps anything that went wrong downstream (database, cache).
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("at least one recipe is required")]
    NoCandidates,
    #[error("no active weekly menu for this week")]
    NoActiveWeek,
    #[error("no recipes available; create some recipes first")]
    EmptyRecipePool,
    #[error("invalid slot: day {day_index}, meal {meal_index}")]
    InvalidSlot { day_index: usize, meal_index: usize },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("no upcoming meal scheduled")]
    NoUpcomingMeal,
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl PlanError {
    pub fn status(&self) -> StatusCode {
        match self {
            PlanError::NotFound(_) | PlanError::NoActiveWeek => StatusCode::NOT_FOUND,
            PlanError::Delivery(DeliveryError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            PlanError::Delivery(DeliveryError::Transport(_)) => StatusCode::BAD_GATEWAY,
            PlanError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Error shape returned by every JSON handler.
    pub fn into_response(self) -> (StatusCode, Json<Value>) {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {:#}", self);
        }
        (status, Json(json!({ "error": self.to_string() })))
    }
}

/// Delivery gateway failures. None of these are fatal to the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("email delivery is not configured")]
    NotConfigured,
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),
    #[error("delivery failed: {0:#}")]
    Transport(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_http_status() {
        assert_eq!(PlanError::NoCandidates.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PlanError::NotFound("menu").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            PlanError::Store(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PlanError::from(DeliveryError::NotConfigured).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(PlanError::NoUpcomingMeal.to_string(), "no upcoming meal scheduled");
    }
}
