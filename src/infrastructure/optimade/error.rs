use crate::domain::models::ToolError;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Unknown database '{0}'. Must be one of 'cod', 'mp', or 'oqmd'.")]
    UnknownDatabase(String),
    #[error("One of `filter`, `elements` or `formula` must be provided to search for structures.")]
    MissingQuery,
    #[error("Formula search is not supported for the cod database. Search by `elements` instead, e.g. [\"Na\", \"Co\", \"O\"].")]
    FormulaUnsupported,
    #[error("No structures found for filter '{filter}' in database '{database}'.")]
    NoStructures { filter: String, database: String },
    #[error("OPTIMADE request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

impl From<QueryError> for ToolError {
    fn from(err: QueryError) -> ToolError {
        if let QueryError::FormulaUnsupported = err {
            return ToolError::Retry(err.to_string());
        }

        return ToolError::Fatal(anyhow::Error::new(err));
    }
}
