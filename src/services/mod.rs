pub mod query_service;

pub use query_service::{
    ExecuteRequest, ExecutionOutcome, QueryService, RenderedQuery, ServiceError, ValidationReport,
};
