// Interface layer: HTTP APIs, controllers, DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct EvaluateRequest {
    /// Identifier of a stored privilege set to evaluate.
    pub set_id: Option<String>,
    /// Inline opaque snapshot, as an alternative to `set_id`.
    pub data: Option<String>,
    pub user_id: Option<i64>,
    pub record_id: Option<i64>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct EvaluateResponse {
    pub satisfied: bool,
    /// RFC 3339 instant at which a currently-true result could flip, when an
    /// elapsed-time condition was involved.
    pub expires_at: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ConditionDto {
    pub field_id: i64,
    pub operator: String,
    /// Authoring-form value; omit (or send "NULL") for the current-user /
    /// current-time wildcard.
    pub value: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SatisfiabilityRequest {
    pub condition: ConditionDto,
    pub user_id: Option<i64>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SatisfiabilityResponse {
    pub count: i64,
    pub satisfiable: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePrivilegeSetRequest {
    pub name: String,
    pub data: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePrivilegeSetRequest {
    pub name: String,
    pub data: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PrivilegeSetResponse {
    pub id: String,
    pub name: String,
    pub data: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PrivilegeSetListResponse {
    pub sets: Vec<PrivilegeSetResponse>,
}

#[derive(Deserialize, ToSchema)]
pub struct ImportXmlRequest {
    pub name: String,
    pub xml: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct XmlExportResponse {
    pub id: String,
    pub name: String,
    pub xml: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ClearCachesResponse {
    pub cleared: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub mod app_state;
pub mod http_handlers;

pub use app_state::AppState;
pub use http_handlers::{
    clear_caches_handler, create_privilege_set_handler, delete_privilege_set_handler,
    evaluate_handler, export_privilege_set_xml_handler, get_privilege_set_handler,
    import_privilege_set_xml_handler, list_privilege_sets_handler, satisfiability_handler,
    update_privilege_set_handler,
};
