// Application layer: evaluation services over the repository traits

pub mod services;

pub use services::{
    EvaluationCache, EvaluationError, EvaluationOutcome, PrivilegeEvaluationService,
};
