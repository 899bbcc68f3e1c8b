use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store API error ({status}): {reason}")]
    Api { status: u16, reason: String },

    #[error("Unexpected store response: {0}")]
    UnexpectedResponse(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("The file '{}' does not exist", .0.display())]
    SourceMissing(PathBuf),

    #[error("Row {line} has no '{column}' column; ensure the identifier column exists in the data")]
    MissingIdentifier { line: usize, column: String },

    #[error("Ingestion aborted after {indexed} documents: {source}")]
    IngestAborted {
        indexed: usize,
        #[source]
        source: Box<IndexerError>,
    },
}

/// Coarse classification of failures, used for reporting and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connectivity,
    StoreApi,
    MissingResource,
    Input,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::StoreApi => "store_api",
            ErrorKind::MissingResource => "missing_resource",
            ErrorKind::Input => "input",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IndexerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexerError::Connection(_) | IndexerError::Http(_) => ErrorKind::Connectivity,
            IndexerError::Api { .. } | IndexerError::UnexpectedResponse(_) => ErrorKind::StoreApi,
            IndexerError::SourceMissing(_) | IndexerError::MissingIdentifier { .. } => {
                ErrorKind::MissingResource
            }
            IndexerError::Json(_) | IndexerError::Csv(_) | IndexerError::Io(_) => ErrorKind::Input,
            IndexerError::Config(_) | IndexerError::Toml(_) => ErrorKind::Configuration,
            IndexerError::IngestAborted { source, .. } => source.kind(),
        }
    }

    /// Classify a transport failure from the HTTP client.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            IndexerError::Connection(err.to_string())
        } else {
            IndexerError::Http(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_ingest_reports_kind_of_cause() {
        let err = IndexerError::IngestAborted {
            indexed: 4,
            source: Box::new(IndexerError::MissingIdentifier {
                line: 2,
                column: "Employee_ID".to_string(),
            }),
        };
        assert_eq!(err.kind(), ErrorKind::MissingResource);
        assert!(err.to_string().contains("after 4 documents"));
    }

    #[test]
    fn api_errors_are_store_api_kind() {
        let err = IndexerError::Api { status: 400, reason: "bad request".to_string() };
        assert_eq!(err.kind(), ErrorKind::StoreApi);
        assert_eq!(err.kind().to_string(), "store_api");
    }
}
