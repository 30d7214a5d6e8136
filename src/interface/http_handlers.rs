use crate::application::services::EvaluationError;
use crate::domain::condition::{ComparisonOperator, ConditionValue, FieldCondition};
use crate::domain::field::MetadataSchema;
use crate::domain::privilege_set::PrivilegeSet;
use crate::domain::record::Record;
use crate::domain::user::User;
use crate::domain::xml::{privilege_set_from_xml, privilege_set_to_xml};
use crate::infrastructure::privilege_set_repository::StoredPrivilegeSet;
use crate::interface::app_state::AppState;
use crate::interface::{
    ClearCachesResponse, ConditionDto, CreatePrivilegeSetRequest, ErrorResponse, EvaluateRequest,
    EvaluateResponse, ImportXmlRequest, PrivilegeSetListResponse, PrivilegeSetResponse,
    SatisfiabilityRequest, SatisfiabilityResponse, UpdatePrivilegeSetRequest, XmlExportResponse,
};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::str::FromStr;
use std::sync::Arc;

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn evaluation_error_response(e: EvaluationError) -> axum::response::Response {
    match e {
        EvaluationError::Policy(policy) => {
            error_response(StatusCode::BAD_REQUEST, policy.to_string())
        }
        EvaluationError::Storage(storage) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, storage.to_string())
        }
    }
}

fn condition_from_dto(dto: &ConditionDto) -> Result<FieldCondition, String> {
    let operator = ComparisonOperator::from_str(&dto.operator)
        .map_err(|_| format!("unrecognized operator: {}", dto.operator))?;
    let value = match &dto.value {
        Some(text) => ConditionValue::from_authoring_text(text),
        None => ConditionValue::Absent,
    };
    Ok(FieldCondition {
        field_id: dto.field_id,
        operator,
        value,
    })
}

async fn load_schema(state: &AppState) -> Result<MetadataSchema, sqlx::Error> {
    Ok(MetadataSchema::new(state.field_repo.list_fields().await?))
}

async fn load_user(
    state: &AppState,
    user_id: Option<i64>,
) -> Result<Option<User>, axum::response::Response> {
    let Some(id) = user_id else {
        return Ok(None);
    };
    match state.user_repo.find_by_id(id).await {
        Ok(Some(user)) => Ok(Some(user)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("user {id} not found"),
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

async fn load_record(
    state: &AppState,
    record_id: Option<i64>,
) -> Result<Option<Record>, axum::response::Response> {
    let Some(id) = record_id else {
        return Ok(None);
    };
    match state.record_repo.get_record(id).await {
        Ok(Some(record)) => Ok(Some(record)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("record {id} not found"),
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    post,
    path = "/v1/authz/evaluate",
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Privilege set evaluated", body = EvaluateResponse),
        (status = 400, description = "Malformed set or condition", body = ErrorResponse),
        (status = 404, description = "Referenced set, user, or record not found", body = ErrorResponse),
    ),
    tags = ["Evaluation"],
    description = "Evaluate a stored or inline privilege set against an optional user/record pair."
)]
pub async fn evaluate_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EvaluateRequest>,
) -> impl IntoResponse {
    let set = match (&payload.set_id, &payload.data) {
        (Some(id), _) => match state.privilege_set_repo.get(id).await {
            Ok(Some(stored)) => match PrivilegeSet::from_data(&stored.data) {
                Ok(set) => set,
                // A stored snapshot that no longer parses is a server-side
                // data problem, not a caller mistake.
                Err(e) => {
                    return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
                }
            },
            Ok(None) => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    format!("privilege set {id} not found"),
                );
            }
            Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        (None, Some(data)) => match PrivilegeSet::from_data(data) {
            Ok(set) => set,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
        (None, None) => {
            return error_response(StatusCode::BAD_REQUEST, "set_id or data is required");
        }
    };
    let user = match load_user(&state, payload.user_id).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let record = match load_record(&state, payload.record_id).await {
        Ok(record) => record,
        Err(response) => return response,
    };
    match state
        .evaluation_service
        .meets_requirements(&set, user.as_ref(), record.as_ref())
        .await
    {
        Ok(outcome) => Json(EvaluateResponse {
            satisfied: outcome.satisfied,
            expires_at: outcome.expires_at.map(|t| t.to_rfc3339()),
        })
        .into_response(),
        Err(e) => evaluation_error_response(e),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    post,
    path = "/v1/authz/satisfiability",
    request_body = SatisfiabilityRequest,
    responses(
        (status = 200, description = "Satisfying records counted", body = SatisfiabilityResponse),
        (status = 400, description = "Condition not countable", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    tags = ["Evaluation"],
    description = "Count how many records in the collection would satisfy a field condition."
)]
pub async fn satisfiability_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SatisfiabilityRequest>,
) -> impl IntoResponse {
    let condition = match condition_from_dto(&payload.condition) {
        Ok(condition) => condition,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };
    let user = match load_user(&state, payload.user_id).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    match state
        .evaluation_service
        .count_satisfying_records(&condition, user.as_ref())
        .await
    {
        Ok(count) => Json(SatisfiabilityResponse {
            count,
            satisfiable: count > 0,
        })
        .into_response(),
        Err(e) => evaluation_error_response(e),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    post,
    path = "/v1/authz/privilege-sets",
    request_body = CreatePrivilegeSetRequest,
    responses(
        (status = 201, description = "Privilege set stored", body = PrivilegeSetResponse),
        (status = 400, description = "Snapshot rejected", body = ErrorResponse),
    ),
    tags = ["PrivilegeSets"],
    description = "Store a named privilege set from its opaque snapshot form."
)]
pub async fn create_privilege_set_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreatePrivilegeSetRequest>,
) -> impl IntoResponse {
    // Validate before storing so a bad snapshot never reaches the table.
    if let Err(e) = PrivilegeSet::from_data(&payload.data) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }
    let stored = StoredPrivilegeSet {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name,
        data: payload.data,
    };
    match state.privilege_set_repo.save(stored).await {
        Ok(saved) => (
            StatusCode::CREATED,
            Json(PrivilegeSetResponse {
                id: saved.id,
                name: saved.name,
                data: saved.data,
            }),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    get,
    path = "/v1/authz/privilege-sets",
    responses(
        (status = 200, description = "Privilege sets listed", body = PrivilegeSetListResponse),
    ),
    tags = ["PrivilegeSets"],
    description = "List all stored privilege sets."
)]
pub async fn list_privilege_sets_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.privilege_set_repo.list().await {
        Ok(sets) => Json(PrivilegeSetListResponse {
            sets: sets
                .into_iter()
                .map(|s| PrivilegeSetResponse {
                    id: s.id,
                    name: s.name,
                    data: s.data,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    get,
    path = "/v1/authz/privilege-sets/{set_id}",
    responses(
        (status = 200, description = "Privilege set retrieved", body = PrivilegeSetResponse),
        (status = 404, description = "Privilege set not found", body = ErrorResponse),
    ),
    tags = ["PrivilegeSets"],
    description = "Fetch one stored privilege set."
)]
pub async fn get_privilege_set_handler(
    State(state): State<Arc<AppState>>,
    Path(set_id): Path<String>,
) -> impl IntoResponse {
    match state.privilege_set_repo.get(&set_id).await {
        Ok(Some(s)) => Json(PrivilegeSetResponse {
            id: s.id,
            name: s.name,
            data: s.data,
        })
        .into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("privilege set {set_id} not found"),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    put,
    path = "/v1/authz/privilege-sets/{set_id}",
    request_body = UpdatePrivilegeSetRequest,
    responses(
        (status = 200, description = "Privilege set updated", body = PrivilegeSetResponse),
        (status = 400, description = "Snapshot rejected", body = ErrorResponse),
        (status = 404, description = "Privilege set not found", body = ErrorResponse),
    ),
    tags = ["PrivilegeSets"],
    description = "Replace the name and snapshot of a stored privilege set."
)]
pub async fn update_privilege_set_handler(
    State(state): State<Arc<AppState>>,
    Path(set_id): Path<String>,
    Json(payload): Json<UpdatePrivilegeSetRequest>,
) -> impl IntoResponse {
    if let Err(e) = PrivilegeSet::from_data(&payload.data) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }
    let stored = StoredPrivilegeSet {
        id: set_id.clone(),
        name: payload.name,
        data: payload.data,
    };
    match state.privilege_set_repo.update(stored.clone()).await {
        Ok(true) => Json(PrivilegeSetResponse {
            id: stored.id,
            name: stored.name,
            data: stored.data,
        })
        .into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            format!("privilege set {set_id} not found"),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    delete,
    path = "/v1/authz/privilege-sets/{set_id}",
    responses(
        (status = 204, description = "Privilege set deleted"),
        (status = 404, description = "Privilege set not found", body = ErrorResponse),
    ),
    tags = ["PrivilegeSets"],
    description = "Delete a stored privilege set."
)]
pub async fn delete_privilege_set_handler(
    State(state): State<Arc<AppState>>,
    Path(set_id): Path<String>,
) -> impl IntoResponse {
    match state.privilege_set_repo.delete(&set_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            format!("privilege set {set_id} not found"),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    post,
    path = "/v1/authz/privilege-sets/import-xml",
    request_body = ImportXmlRequest,
    responses(
        (status = 201, description = "Privilege set imported", body = PrivilegeSetResponse),
        (status = 400, description = "XML rejected", body = ErrorResponse),
    ),
    tags = ["PrivilegeSets"],
    description = "Parse an XML privilege set description and store the resulting snapshot."
)]
pub async fn import_privilege_set_xml_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ImportXmlRequest>,
) -> impl IntoResponse {
    let schema = match load_schema(&state).await {
        Ok(schema) => schema,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let set = match privilege_set_from_xml(&payload.xml, &schema) {
        Ok(set) => set,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let stored = StoredPrivilegeSet {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name,
        data: set.data(),
    };
    match state.privilege_set_repo.save(stored).await {
        Ok(saved) => (
            StatusCode::CREATED,
            Json(PrivilegeSetResponse {
                id: saved.id,
                name: saved.name,
                data: saved.data,
            }),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    get,
    path = "/v1/authz/privilege-sets/{set_id}/xml",
    responses(
        (status = 200, description = "Privilege set exported", body = XmlExportResponse),
        (status = 404, description = "Privilege set not found", body = ErrorResponse),
    ),
    tags = ["PrivilegeSets"],
    description = "Render a stored privilege set back into the XML authoring vocabulary."
)]
pub async fn export_privilege_set_xml_handler(
    State(state): State<Arc<AppState>>,
    Path(set_id): Path<String>,
) -> impl IntoResponse {
    let stored = match state.privilege_set_repo.get(&set_id).await {
        Ok(Some(stored)) => stored,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("privilege set {set_id} not found"),
            );
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let set = match PrivilegeSet::from_data(&stored.data) {
        Ok(set) => set,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let schema = match load_schema(&state).await {
        Ok(schema) => schema,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    match privilege_set_to_xml(&set, &schema) {
        Ok(xml) => Json(XmlExportResponse {
            id: stored.id,
            name: stored.name,
            xml,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[axum::debug_handler]
#[utoipa::path(
    post,
    path = "/v1/authz/caches/clear",
    responses(
        (status = 200, description = "Evaluation caches cleared", body = ClearCachesResponse),
    ),
    tags = ["Evaluation"],
    description = "Drop the field and value memoization tables used by the evaluator."
)]
pub async fn clear_caches_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.evaluation_service.clear_caches();
    Json(ClearCachesResponse { cleared: true }).into_response()
}
