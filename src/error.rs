use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("user {user_id} is not a manager of company {company_id}")]
    AccessDenied { user_id: i64, company_id: i64 },
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    BadParams(String),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error("export failed: {0:#}")]
    Export(anyhow::Error),
}

impl ReportError {
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::AccessDenied { .. } => "access_denied",
            ReportError::NotFound(_) => "not_found",
            ReportError::BadParams(_) => "bad_params",
            ReportError::Db(_) => "db_query_failed",
            ReportError::Export(_) => "export_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ReportError::AccessDenied {
                user_id,
                company_id,
            } => Some(json!({ "userId": user_id, "companyId": company_id })),
            _ => None,
        }
    }
}
