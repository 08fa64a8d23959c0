//! Error types for the workflow orchestration service.

/// Result type alias using the domain `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Domain error type shared by the compiler, storage, scheduler gateway and
/// executor. `status_code`/`error_code`/`is_retryable` let the HTTP layer
/// (`services/api`) translate any of these into the `{"error":{code,message}}`
/// envelope (spec.md §7) without each call site re-deriving the mapping.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ==========================================================================
    // Client errors (4xx) — spec.md §7
    // ==========================================================================
    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// Batched compile error (spec.md §4.7): one entry per violation so the
    /// caller gets every problem in one response instead of fail-fast.
    #[error("compile error: {}", .0.join("; "))]
    CompileError(Vec<String>),

    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("workflow '{workflow_id}' already exists")]
    DuplicateWorkflowId { workflow_id: String },

    #[error("invalid status transition for workflow '{workflow_id}': {from} -> {to}")]
    InvalidTransition {
        workflow_id: String,
        from: String,
        to: String,
    },

    // ==========================================================================
    // Scheduler gateway errors
    // ==========================================================================
    /// A JSON-RPC 2.0 error envelope surfaced verbatim from `AppService`
    /// (spec.md §4.2, §7).
    #[error("scheduler error {code}: {message}")]
    SchedulerError {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Timeout / connection / 5xx transport failure. Always safe to retry
    /// on the next poll cycle (spec.md §7).
    #[error("transient error: {0}")]
    Transient(String),

    // ==========================================================================
    // Internal errors (5xx)
    // ==========================================================================
    #[error("storage error: {0}")]
    StorageError(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::CompileError(_) => 400,
            Error::Validation { .. } => 400,
            Error::Conflict { .. } => 400,
            Error::DuplicateWorkflowId { .. } => 409,
            Error::InvalidTransition { .. } => 400,
            Error::SchedulerError { .. } => 502,
            Error::Transient(_) => 503,
            Error::StorageError(_) => 500,
            Error::Internal(_) => 500,
            Error::Config(_) => 500,
        }
    }

    /// Error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "NOT_FOUND",
            Error::CompileError(_) => "COMPILE_ERROR",
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::Conflict { .. } => "CONFLICT",
            Error::DuplicateWorkflowId { .. } => "DUPLICATE_WORKFLOW_ID",
            Error::InvalidTransition { .. } => "INVALID_TRANSITION",
            Error::SchedulerError { .. } => "SCHEDULER_ERROR",
            Error::Transient(_) => "TRANSIENT_ERROR",
            Error::StorageError(_) => "STORAGE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the executor should retry this on the next tick rather than
    /// fail the step outright (spec.md §7: "No per-step retry policy... the
    /// scheduler owns the job once submitted" — this only covers the RPC
    /// call itself, not job outcomes).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(e: mongodb::error::Error) -> Self {
        Error::StorageError(e.to_string())
    }
}

/// Validation error builder, used by the Field-Coercion & Rule Registry and
/// Step Validators to accumulate a batch before raising `CompileError`.
pub struct ValidationError {
    message: String,
    field: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn build(self) -> Error {
        Error::Validation {
            message: self.message,
            field: self.field,
        }
    }
}
