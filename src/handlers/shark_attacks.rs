use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::middleware::auth::AuthUser;
use crate::models::{ListQuery, SharkAttackFields, SharkAttackPatch, SharkAttackRecord};
use crate::services::shark_attack_service::{CommandError, CreateSharkAttack, ImportError, ImportSummary};
use crate::services::store::StoreError;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListParams {
    pub organization_id: Option<String>,
    pub name: Option<String>,
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub count: Option<i64>,
    pub sort_field: Option<String>,
    pub sort_asc: Option<bool>,
    pub query_total_result_count: Option<bool>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub listing: Vec<SharkAttackRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_total_result_count: Option<i64>,
}

#[derive(Deserialize)]
pub struct GetParams {
    pub organization_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateSharkAttackRequest {
    pub id: Option<String>,
    pub organization_id: Option<String>,
    pub active: Option<bool>,
    #[serde(flatten)]
    pub fields: SharkAttackFields,
}

#[derive(Deserialize)]
pub struct UpdateSharkAttackRequest {
    pub organization_id: Option<String>,
    /// Merge patches only the supplied fields; replace overwrites them all.
    pub merge: Option<bool>,
    pub active: Option<bool>,
    #[serde(flatten)]
    pub fields: SharkAttackFields,
}

#[derive(Deserialize)]
pub struct DeleteSharkAttacksRequest {
    pub ids: Vec<String>,
    pub organization_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteSharkAttacksResponse {
    pub code: u16,
    pub message: String,
}

pub async fn list_shark_attacks(
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Json<ListResponse>, (StatusCode, Json<serde_json::Value>)> {
    let query = ListQuery {
        organization_id: params
            .organization_id
            .filter(|org| !org.trim().is_empty())
            .unwrap_or_else(|| state.config.default_organization.clone()),
        name: params.name,
        active: params.active,
        page: params.page.unwrap_or(0),
        count: params.count.unwrap_or(25),
        sort_field: params.sort_field,
        sort_asc: params.sort_asc.unwrap_or(false),
    };
    let with_total = params.query_total_result_count.unwrap_or(false);

    let (listing, query_total_result_count) = state
        .service
        .list(&query, with_total)
        .await
        .map_err(command_error_response)?;

    Ok(Json(ListResponse {
        listing,
        query_total_result_count,
    }))
}

pub async fn get_shark_attack(
    Path(id): Path<String>,
    Query(params): Query<GetParams>,
    State(state): State<AppState>,
) -> Result<Json<SharkAttackRecord>, (StatusCode, Json<serde_json::Value>)> {
    let record = state
        .service
        .get(params.organization_id.as_deref(), &id)
        .await
        .map_err(command_error_response)?;

    match record {
        Some(record) => Ok(Json(record)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "code": "NOT_FOUND",
                "message": format!("SharkAttack with id {} not found", id)
            })),
        )),
    }
}

pub async fn create_shark_attack(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateSharkAttackRequest>,
) -> Result<(StatusCode, Json<SharkAttackRecord>), (StatusCode, Json<serde_json::Value>)> {
    let input = CreateSharkAttack {
        id: payload.id,
        organization_id: payload.organization_id,
        active: payload.active,
        fields: payload.fields,
    };

    let record = state
        .service
        .create(input, &auth_user.username)
        .await
        .map_err(command_error_response)?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_shark_attack(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateSharkAttackRequest>,
) -> Result<Json<SharkAttackRecord>, (StatusCode, Json<serde_json::Value>)> {
    let patch = SharkAttackPatch {
        active: payload.active,
        fields: payload.fields,
    };
    let merge = payload.merge.unwrap_or(true);

    let record = state
        .service
        .update(
            payload.organization_id.as_deref(),
            &id,
            patch,
            merge,
            &auth_user.username,
        )
        .await
        .map_err(command_error_response)?;

    Ok(Json(record))
}

pub async fn delete_shark_attacks(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<DeleteSharkAttacksRequest>,
) -> Result<(StatusCode, Json<DeleteSharkAttacksResponse>), (StatusCode, Json<serde_json::Value>)> {
    if payload.ids.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "code": "INVALID_REQUEST",
                "message": "ids must not be empty"
            })),
        ));
    }

    let outcome = state
        .service
        .delete(
            payload.organization_id.as_deref(),
            &payload.ids,
            &auth_user.username,
        )
        .await
        .map_err(command_error_response)?;

    let ids_text = serde_json::to_string(&payload.ids).unwrap_or_default();
    let ok = outcome.removed > 0;
    let response = DeleteSharkAttacksResponse {
        code: if ok { 200 } else { 400 },
        message: if ok {
            format!("SharkAttack with id:s {} has been deleted", ids_text)
        } else {
            format!("SharkAttack with id:s {} not found for deletion", ids_text)
        },
    };
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((status, Json(response)))
}

pub async fn import_shark_attacks(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<ImportSummary>, (StatusCode, Json<serde_json::Value>)> {
    let summary = state
        .service
        .import(&auth_user.username)
        .await
        .map_err(import_error_response)?;

    Ok(Json(summary))
}

pub(crate) fn command_error_response(err: CommandError) -> (StatusCode, Json<serde_json::Value>) {
    match err {
        CommandError::Store(StoreError::Timeout(err)) => {
            tracing::error!("Store timeout: {:?}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "code": "STORE_TIMEOUT",
                    "message": "Store operation timed out, retry later"
                })),
            )
        }
        CommandError::Store(StoreError::NotFound { identity }) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "code": "NOT_FOUND",
                "message": format!("SharkAttack with id {} not found", identity)
            })),
        ),
        CommandError::Store(StoreError::Duplicate { identity }) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "code": "DUPLICATE_IDENTITY",
                "message": format!("SharkAttack with id {} already exists", identity)
            })),
        ),
        CommandError::Store(StoreError::Database(err)) => {
            tracing::error!("Database error: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "code": "DATABASE_ERROR",
                    "message": "Database error"
                })),
            )
        }
        CommandError::Emit(err) => {
            tracing::error!("Event emission failed: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "code": "EVENT_EMIT_FAILED",
                    "message": "Change was saved but its event could not be emitted; retry the operation"
                })),
            )
        }
    }
}

fn import_error_response(err: ImportError) -> (StatusCode, Json<serde_json::Value>) {
    match err {
        ImportError::Fetch(err) => {
            tracing::error!("Dataset fetch failed: {:?}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "code": "DATASET_FETCH_FAILED",
                    "message": format!("{}", err)
                })),
            )
        }
        ImportError::Store(err) => command_error_response(CommandError::Store(err)),
    }
}
