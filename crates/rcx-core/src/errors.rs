use crate::guardrails::BudgetKind;
use rcx_core_types::RunId;
use thiserror::Error;

/// Result type alias using RcxError
pub type Result<T> = std::result::Result<T, RcxError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable for programmatic handling,
/// test assertions and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Ingestion
    InvalidInput,
    MalformedValue,
    RuleSyntax,

    // Program shape
    SchemaViolation,
    ProjectionOrder,
    DuplicateId,

    // Run limits
    BudgetExceeded,
    LoopDetected,
    Aborted,

    // Replay
    ReplayMismatch,
    ExecutionState,

    // Integration/IO
    NotFound,
    Collision,
    Io,
    Serialization,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::MalformedValue => "ERR_MALFORMED_VALUE",
            ExErrorKind::RuleSyntax => "ERR_RULE_SYNTAX",
            ExErrorKind::SchemaViolation => "ERR_SCHEMA_VIOLATION",
            ExErrorKind::ProjectionOrder => "ERR_PROJECTION_ORDER",
            ExErrorKind::DuplicateId => "ERR_DUPLICATE_ID",
            ExErrorKind::BudgetExceeded => "ERR_BUDGET_EXCEEDED",
            ExErrorKind::LoopDetected => "ERR_LOOP_DETECTED",
            ExErrorKind::Aborted => "ERR_ABORTED",
            ExErrorKind::ReplayMismatch => "ERR_REPLAY_MISMATCH",
            ExErrorKind::ExecutionState => "ERR_EXECUTION_STATE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Collision => "ERR_COLLISION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification plus the run context the failure happened in.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    run_id: Option<RunId>,
    step: Option<u64>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            run_id: None,
            step: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add run context
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Add the step index the error was raised at
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    pub fn step(&self) -> Option<u64> {
        self.step
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(run_id) = &self.run_id {
            write!(f, " (run_id: {})", run_id)?;
        }
        if let Some(step) = self.step {
            write!(f, " (step: {})", step)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for evaluator operations
///
/// A stall is not represented here: it is a normal outcome of substitution
/// and of the dispatch loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RcxError {
    /// A guardrail limit was crossed
    #[error("Budget exceeded: {kind} limit is {limit}, observed {observed}")]
    BudgetExceeded {
        kind: BudgetKind,
        limit: usize,
        observed: usize,
    },

    /// A produced value repeated a state from the rolling history
    #[error("Loop detected: state {hash} already seen within the last {} states", .history.len())]
    LoopDetected { hash: String, history: Vec<String> },

    /// Input failed value model validation
    #[error("Malformed value: {reason}")]
    MalformedValue { reason: String },

    /// Trace or snapshot document has the wrong shape
    #[error("Schema violation: {reason}")]
    SchemaViolation { reason: String },

    /// Caller requested cancellation
    #[error("Run aborted by caller")]
    ExternalAbort,

    /// Rule text could not be parsed
    #[error("Rule syntax error on line {line}: {reason}")]
    RuleSyntax { line: usize, reason: String },

    /// A kernel projection is declared after a domain projection
    #[error("Kernel projection {projection_id} must precede domain projection {after}")]
    ProjectionOrder { projection_id: String, after: String },

    /// Two projections or rules share an id
    #[error("Duplicate projection id: {projection_id}")]
    DuplicateProjection { projection_id: String },

    /// A replayed trace diverged from the recorded one
    #[error("Replay mismatch at event {index}: {reason}")]
    ReplayMismatch { index: usize, reason: String },

    /// Execution events arrived in an order the engine cannot accept
    #[error("Execution state error: {reason}")]
    ExecutionState { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RcxError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        RcxError::MalformedValue {
            reason: reason.into(),
        }
    }

    pub fn schema(reason: impl Into<String>) -> Self {
        RcxError::SchemaViolation {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for RcxError {
    fn from(err: serde_json::Error) -> Self {
        RcxError::Serialization(err.to_string())
    }
}

impl From<RcxError> for ExError {
    fn from(err: RcxError) -> Self {
        match err {
            RcxError::BudgetExceeded {
                kind,
                limit,
                observed,
            } => ExError::new(ExErrorKind::BudgetExceeded)
                .with_op("guardrail")
                .with_message(format!("{} limit {} exceeded ({})", kind, limit, observed)),

            RcxError::LoopDetected { hash, history } => ExError::new(ExErrorKind::LoopDetected)
                .with_op("dispatch")
                .with_message(format!(
                    "state {} repeats within a history of {}",
                    hash,
                    history.len()
                )),

            RcxError::MalformedValue { reason } => {
                ExError::new(ExErrorKind::MalformedValue).with_message(reason)
            }

            RcxError::SchemaViolation { reason } => {
                ExError::new(ExErrorKind::SchemaViolation).with_message(reason)
            }

            RcxError::ExternalAbort => ExError::new(ExErrorKind::Aborted)
                .with_op("dispatch")
                .with_message("Run aborted by caller"),

            RcxError::RuleSyntax { line, reason } => ExError::new(ExErrorKind::RuleSyntax)
                .with_op("parse_rules")
                .with_message(format!("line {}: {}", line, reason)),

            RcxError::ProjectionOrder {
                projection_id,
                after,
            } => ExError::new(ExErrorKind::ProjectionOrder)
                .with_op("load_program")
                .with_message(format!(
                    "kernel projection {} declared after {}",
                    projection_id, after
                )),

            RcxError::DuplicateProjection { projection_id } => {
                ExError::new(ExErrorKind::DuplicateId)
                    .with_op("load_program")
                    .with_message(format!("duplicate projection id {}", projection_id))
            }

            RcxError::ReplayMismatch { index, reason } => ExError::new(ExErrorKind::ReplayMismatch)
                .with_op("replay")
                .with_message(format!("event {}: {}", index, reason)),

            RcxError::ExecutionState { reason } => {
                ExError::new(ExErrorKind::ExecutionState).with_message(reason)
            }

            RcxError::Serialization(msg) => {
                ExError::new(ExErrorKind::Serialization).with_message(msg)
            }
        }
    }
}
