//! # RPGML-RS: dataflow runtime
//!
//! Executes graphs of nodes that exchange N-dimensional arrays. The runtime
//! repeatedly ticks every node once per pass, in dependency order, on a pool
//! of worker threads, and reclaims the reference cycles that wiring creates.
//!
//! ## Architecture
//!
//! - **Array**: strided, typed N-d views over shared storage, with ROI,
//!   mirror, rotate and sparse transforms that never copy
//! - **GC**: reference counting plus a tracing collector for cycles
//! - **Pipeline**: nodes, ports, params, the dependency scheduler and the
//!   runtime loop
//! - **Config**: runtime settings and the TOML graph description
//!
//! ## Example
//!
//! ```no_run
//! use rpgml::gc::GarbageCollector;
//! use rpgml::pipeline::load_str;
//! use std::sync::Arc;
//!
//! let graph = r#"
//! [runtime]
//! max_passes = 3
//!
//! [[node]]
//! id = "a"
//! type = "constant"
//! params = { value = 23 }
//!
//! [[node]]
//! id = "show"
//! type = "print"
//!
//! [[connect]]
//! from = "a.out"
//! to = "show.in"
//! "#;
//!
//! let gc = Arc::new(GarbageCollector::new());
//! let mut runtime = load_str(graph, gc)?.into_runtime()?;
//! let summary = runtime.run()?;
//! assert_eq!(summary.passes, 3);
//! # Ok::<(), rpgml::RpgmlError>(())
//! ```

pub mod array;
pub mod config;
pub mod error;
pub mod gc;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use array::{Array, ArrayBase, ArrayRef, Coordinates, Size};
pub use config::{GraphFile, RuntimeConfig};
pub use error::{Result, ResultExt, RpgmlError};
pub use gc::{Collectable, CountPtr, GarbageCollector};
pub use pipeline::{Graph, Node, NodeHandle, Runtime};
pub use types::{Type, Value};
