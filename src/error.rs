//! Error handling for the RPGML runtime
//!
//! This module defines the crate-wide error type and a Result alias. Engine
//! code (arrays, collector, job queue) always returns these synchronously;
//! only the scheduler's per-node boundary swallows them.

use crate::types::Type;
use thiserror::Error;

/// Main error type for RPGML operations
#[derive(Error, Debug)]
pub enum RpgmlError {
    /// A call argument is outside its documented domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Dimension count does not match what the operation requires
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// Coordinates or a box fall outside an array
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// A value or array of the wrong element type was supplied
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: Type, actual: Type },

    /// A numeric conversion would overflow the target type
    #[error("Value {value} does not fit into {target}")]
    Conversion { value: String, target: Type },

    /// A param setter rejected its value
    #[error("Param '{param}' of node '{node}': {message}")]
    Param {
        node: String,
        param: String,
        message: String,
    },

    /// Wiring of inputs and outputs is invalid
    #[error("Connection error: {0}")]
    Connection(String),

    /// The node graph contains a dependency cycle
    #[error("Cycle detected in node graph")]
    CycleDetected,

    /// A node's tick failed
    #[error("Node '{node}' error: {message}")]
    Node { node: String, message: String },

    /// Threading primitive failure
    #[error("Thread error: {0}")]
    Thread(String),

    /// Errors related to configuration loading
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Graph description parse errors
    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A node asked the run loop to terminate normally
    #[error("Exit requested")]
    ExitRequest,

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RpgmlError>,
    },
}

impl RpgmlError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RpgmlError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a node error from any displayable message
    pub fn node(node: impl Into<String>, message: impl std::fmt::Display) -> Self {
        RpgmlError::Node {
            node: node.into(),
            message: message.to_string(),
        }
    }

    /// Create a param error
    pub fn param(
        node: impl Into<String>,
        param: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        RpgmlError::Param {
            node: node.into(),
            param: param.into(),
            message: message.to_string(),
        }
    }

    /// True if this is (or wraps) the exit sentinel
    pub fn is_exit_request(&self) -> bool {
        match self {
            RpgmlError::ExitRequest => true,
            RpgmlError::WithContext { source, .. } => source.is_exit_request(),
            _ => false,
        }
    }
}

/// Result type alias for RPGML operations
pub type Result<T> = std::result::Result<T, RpgmlError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
