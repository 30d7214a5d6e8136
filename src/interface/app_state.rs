use crate::application::services::PrivilegeEvaluationService;
use crate::infrastructure::{
    FieldRepository, PrivilegeSetRepository, RecordRepository, UserRepository,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub field_repo: Arc<dyn FieldRepository>,
    pub record_repo: Arc<dyn RecordRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub privilege_set_repo: Arc<dyn PrivilegeSetRepository>,
    pub evaluation_service: Arc<PrivilegeEvaluationService>,
}
