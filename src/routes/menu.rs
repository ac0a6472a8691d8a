use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Local, NaiveDate};
use rand::{rngs::StdRng, SeedableRng};
use uuid::Uuid;

use super::{respond, ApiResult};
use crate::{
    models::{
        auth::AuthenticatedUser,
        week::{CreateMenuRequest, DuplicateMenuRequest, MoveSlotRequest, SlotRequest, UpdateMenuRequest},
    },
    services::menu::{AutoAssignRequest, MenuService},
    AppState,
};

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// GET /menus/current: the active week, created empty on first access
pub async fn get_current(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    respond(MenuService::get_or_create_current_week(state.store.as_ref(), user.user_id, today()).await)
}

/// GET /menus/week/{start}
pub async fn get_week(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(start): Path<NaiveDate>,
) -> ApiResult {
    respond(MenuService::get_or_create_week(state.store.as_ref(), user.user_id, start).await)
}

/// GET /menus
pub async fn list_menus(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    respond(MenuService::list(state.store.as_ref(), user.user_id).await)
}

/// POST /menus
pub async fn create_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateMenuRequest>,
) -> ApiResult {
    respond(MenuService::create(state.store.as_ref(), user.user_id, body, today()).await)
}

/// GET /menus/{id}
pub async fn get_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult {
    respond(MenuService::get(state.store.as_ref(), user.user_id, id).await)
}

/// PUT /menus/{id}: title, description, favorite flag, tags
pub async fn update_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMenuRequest>,
) -> ApiResult {
    respond(MenuService::update_info(state.store.as_ref(), user.user_id, id, body).await)
}

/// DELETE /menus/{id}
pub async fn delete_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult {
    respond(
        MenuService::delete(state.store.as_ref(), user.user_id, id)
            .await
            .map(|_| serde_json::json!({ "deleted": id })),
    )
}

/// POST /menus/{id}/duplicate
pub async fn duplicate_menu(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<DuplicateMenuRequest>,
) -> ApiResult {
    respond(MenuService::duplicate(state.store.as_ref(), user.user_id, id, body).await)
}

/// POST /menus/slots/assign
pub async fn assign_slot(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SlotRequest>,
) -> ApiResult {
    let store = state.store.as_ref();
    respond(MenuService::assign_slot(store, store, user.user_id, &body).await)
}

/// POST /menus/slots/move: swaps the two slots
pub async fn move_slot(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<MoveSlotRequest>,
) -> ApiResult {
    respond(MenuService::move_slot(state.store.as_ref(), user.user_id, &body).await)
}

/// POST /menus/slots/notes
pub async fn update_slot_notes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SlotRequest>,
) -> ApiResult {
    respond(MenuService::update_notes(state.store.as_ref(), user.user_id, &body).await)
}

/// POST /menus/slots/remove
pub async fn remove_from_slot(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SlotRequest>,
) -> ApiResult {
    respond(MenuService::remove_from_slot(state.store.as_ref(), user.user_id, &body).await)
}

/// POST /menus/auto-assign
pub async fn auto_assign(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<AutoAssignRequest>,
) -> ApiResult {
    let store = state.store.as_ref();
    respond(MenuService::auto_assign(store, store, user.user_id, &body, today()).await)
}

/// POST /menus/fill-missing
pub async fn fill_missing(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    let store = state.store.as_ref();
    let mut rng = StdRng::from_entropy();
    respond(MenuService::fill_missing(store, store, user.user_id, today(), &mut rng).await)
}
