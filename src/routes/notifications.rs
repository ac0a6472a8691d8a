use axum::{extract::State, Json};
use chrono::Local;
use serde::Deserialize;
use uuid::Uuid;

use super::{respond, ApiResult};
use crate::{
    error::PlanError,
    models::{
        auth::AuthenticatedUser,
        preferences::{MealTimesUpdate, NotificationPreferences, PreferencesUpdate},
    },
    services::store::PreferencesStore,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct TimezoneRequest {
    pub timezone: String,
}

async fn apply_update(
    state: &AppState,
    user_id: Uuid,
    update: PreferencesUpdate,
) -> Result<NotificationPreferences, PlanError> {
    update
        .validate()
        .map_err(|e| PlanError::Invalid(e.to_string()))?;
    Ok(state.store.update(user_id, &update).await?)
}

/// GET /notifications/preferences
pub async fn get_preferences(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    respond(
        state
            .store
            .get_or_create(user.user_id)
            .await
            .map_err(PlanError::from),
    )
}

/// PUT /notifications/preferences: partial update
pub async fn update_preferences(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<PreferencesUpdate>,
) -> ApiResult {
    respond(apply_update(&state, user.user_id, body).await)
}

/// POST /notifications/toggle: master email switch
pub async fn toggle(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ToggleRequest>,
) -> ApiResult {
    let update = PreferencesUpdate {
        email_enabled: Some(body.enabled),
        ..Default::default()
    };
    respond(apply_update(&state, user.user_id, update).await)
}

/// PUT /notifications/meal-times
pub async fn update_meal_times(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<MealTimesUpdate>,
) -> ApiResult {
    let update = PreferencesUpdate {
        meal_times: Some(body),
        ..Default::default()
    };
    respond(apply_update(&state, user.user_id, update).await)
}

/// PUT /notifications/timezone
pub async fn update_timezone(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<TimezoneRequest>,
) -> ApiResult {
    let update = PreferencesUpdate {
        timezone: Some(body.timezone),
        ..Default::default()
    };
    respond(apply_update(&state, user.user_id, update).await)
}

/// POST /notifications/test
pub async fn send_test(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    respond(
        state
            .clock
            .send_test_notification(user.user_id)
            .await
            .map(|_| serde_json::json!({ "sent": true })),
    )
}

/// POST /notifications/next-meal: remind the user of their next planned meal now
pub async fn send_next_meal(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    respond(
        state
            .clock
            .send_next_meal_notification(user.user_id, Local::now().naive_local())
            .await,
    )
}

/// GET /notifications/status
pub async fn status(State(state): State<AppState>, _user: AuthenticatedUser) -> ApiResult {
    respond(Ok::<_, PlanError>(state.clock.status()))
}
