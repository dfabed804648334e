//! Configuration for the RPGML runtime
//!
//! Two things are configured here:
//! - [`RuntimeConfig`]: worker count, collector cadence, pass limit, log filter
//! - [`GraphFile`]: the TOML description of a node graph, which the loader
//!   turns into configured nodes and connections
//!
//! # Example
//!
//! ```toml
//! [runtime]
//! threads = 2
//! max_passes = 10
//!
//! [[node]]
//! id = "a"
//! type = "constant"
//! params = { value = 23 }
//!
//! [[node]]
//! id = "sum"
//! type = "add"
//!
//! [[connect]]
//! from = "a.out"
//! to = "sum.in1"
//! ```

use crate::error::{Result, RpgmlError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default number of passes between collector runs
pub const DEFAULT_GC_INTERVAL: u64 = 1;

/// Default log filter when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,rpgml=debug";

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_gc_interval() -> u64 {
    DEFAULT_GC_INTERVAL
}

/// Scheduler and collector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Run the collector every N passes (0 disables it)
    #[serde(default = "default_gc_interval")]
    pub gc_interval: u64,
    /// Stop after this many passes even without an exit request
    #[serde(default)]
    pub max_passes: Option<u64>,
    /// Tracing filter directive
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            gc_interval: DEFAULT_GC_INTERVAL,
            max_passes: None,
            log_filter: None,
        }
    }
}

impl RuntimeConfig {
    /// Check constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(RpgmlError::Config(
                "threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The effective log filter directive
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// One node declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Identifier, unique within the graph
    pub id: String,
    /// Builtin node type name
    #[serde(rename = "type")]
    pub kind: String,
    /// Param values by name; arrays feed indexed params element by element
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}

/// One `node.output -> node.input` connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub from: String,
    pub to: String,
}

/// A port reference of the form `node.port`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRef<'a> {
    pub node: &'a str,
    pub port: &'a str,
}

impl<'a> PortRef<'a> {
    pub fn parse(s: &'a str) -> Result<Self> {
        match s.rsplit_once('.') {
            Some((node, port)) if !node.is_empty() && !port.is_empty() => {
                Ok(PortRef { node, port })
            }
            _ => Err(RpgmlError::Config(format!(
                "port reference '{}' must have the form node.port",
                s
            ))),
        }
    }
}

/// Parsed graph description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphFile {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeSpec>,
    #[serde(default, rename = "connect")]
    pub connections: Vec<ConnectionSpec>,
}

impl GraphFile {
    /// Parse a graph description from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: GraphFile = toml::from_str(content)?;
        file.runtime.validate()?;
        Ok(file)
    }

    /// Load a graph description from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RpgmlError::Config(format!("Failed to read graph file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content).map_err(|e| e.with_context(format!("{:?}", path)))
    }

    /// Save the graph description as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| RpgmlError::Config(format!("Failed to serialize graph: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            RpgmlError::Config(format!("Failed to write graph file {:?}: {}", path, e))
        })
    }
}
