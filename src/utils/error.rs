use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    WorkbookError(#[from] calamine::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Download of {url} failed with status {status}")]
    DownloadError { url: String, status: u16 },

    #[error("{label} source unavailable: {message}")]
    SourceUnavailableError { label: String, message: String },

    #[error("variation-normalizer unable to normalize {query}: {message}")]
    NormalizerError {
        query: String,
        message: String,
        retryable: bool,
    },

    #[error("Malformed record in {table} row {row}: {reason}")]
    MalformedRecordError {
        table: String,
        row: usize,
        reason: String,
    },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    Storage,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code for a run that ended with this severity.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EvidenceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EvidenceError::ConfigError { .. }
            | EvidenceError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            EvidenceError::HttpError(_)
            | EvidenceError::DownloadError { .. }
            | EvidenceError::NormalizerError { .. }
            | EvidenceError::SourceUnavailableError { .. } => ErrorCategory::Network,
            EvidenceError::CsvError(_)
            | EvidenceError::WorkbookError(_)
            | EvidenceError::SerializationError(_)
            | EvidenceError::MalformedRecordError { .. }
            | EvidenceError::ProcessingError { .. } => ErrorCategory::Data,
            EvidenceError::ZipError(_) | EvidenceError::StorageError { .. } => {
                ErrorCategory::Storage
            }
            EvidenceError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EvidenceError::MalformedRecordError { .. } => ErrorSeverity::Low,
            EvidenceError::HttpError(_)
            | EvidenceError::DownloadError { .. }
            | EvidenceError::SourceUnavailableError { .. } => ErrorSeverity::Medium,
            EvidenceError::NormalizerError { retryable, .. } => {
                if *retryable {
                    ErrorSeverity::Medium
                } else {
                    ErrorSeverity::High
                }
            }
            EvidenceError::IoError(_) | EvidenceError::StorageError { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EvidenceError::DownloadError { url, status } => {
                format!("Could not download source data from {} (HTTP {})", url, status)
            }
            EvidenceError::SourceUnavailableError { label, message } => {
                format!("{}: {}", label, message)
            }
            EvidenceError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            EvidenceError::WorkbookError(e) => format!("Could not read spreadsheet: {}", e),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the command line flags and the TOML configuration file"
            }
            ErrorCategory::Network => {
                "Check network access and that the variation-normalizer service is reachable, then retry"
            }
            ErrorCategory::Data => {
                "The source file layout may have changed; inspect the downloaded data"
            }
            ErrorCategory::Storage => "Check the data directories and object storage credentials",
            ErrorCategory::System => "Check file permissions and free disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, EvidenceError>;
