//! Agent error types.
//!
//! Construction-time and transport failures surface through [`AgentError`].
//! Tool faults never do: the dispatcher turns them into failed outcomes that
//! go back to the model.

/// Unified error type for the agent crate.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Model errors --------------------------------------------------------
    /// The model stream failed before producing a final message.
    #[error("model transport failed: {reason}")]
    TransportFailure { reason: String },

    /// The task was cancelled by its owner.
    #[error("task cancelled")]
    Cancelled,

    // -- Tool registry errors ------------------------------------------------
    /// A dynamic tool tried to take the name of a built-in.
    #[error("tool name `{tool_name}` is reserved for a built-in")]
    ReservedToolName { tool_name: String },

    /// A dynamic tool with this name is already registered.
    #[error("tool `{tool_name}` is already registered")]
    DuplicateTool { tool_name: String },

    /// A descriptor produced a schema that does not compile.
    #[error("invalid schema for tool `{tool_name}`: {reason}")]
    InvalidSchema { tool_name: String, reason: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization failed.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Reading a configuration or script file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;
