//! Graph loader.
//!
//! Turns a [`GraphFile`] into live objects:
//! 1. Create every declared node through [`NodeFactory`] and assign its params
//! 2. Bind each node under its id in a root [`Frame`]
//! 3. Wire the declared connections
//! 4. Register every node with a [`Graph`]

use crate::array::{ArrayBase, Size};
use crate::config::{GraphFile, PortRef, RuntimeConfig};
use crate::error::{Result, ResultExt, RpgmlError};
use crate::gc::{CountPtr, GarbageCollector};
use crate::pipeline::executor::Runtime;
use crate::pipeline::frame::Frame;
use crate::pipeline::graph::Graph;
use crate::pipeline::node_type::NodeFactory;
use crate::pipeline::port::Input;
use crate::types::{Type, Value};
use std::path::Path;
use std::sync::Arc;

/// Result of loading a graph description.
pub struct LoadedGraph {
    pub config: RuntimeConfig,
    pub frame: CountPtr<Frame>,
    pub graph: Graph,
    pub gc: Arc<GarbageCollector>,
}

impl LoadedGraph {
    /// Hand everything over to a [`Runtime`].
    pub fn into_runtime(self) -> Result<Runtime> {
        Runtime::new(self.config, self.graph, Some(self.frame), self.gc)
    }
}

/// Convert a TOML param value. Arrays become one-dimensional arrays typed
/// after their elements, or of `value` elements when those are mixed.
pub fn toml_to_value(value: &toml::Value) -> Result<Value> {
    match value {
        toml::Value::Integer(i) => Ok(Value::I64(*i)),
        toml::Value::Float(f) => Ok(Value::F64(*f)),
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        toml::Value::String(s) => Ok(Value::string(s)),
        toml::Value::Array(items) => {
            let values = items
                .iter()
                .map(toml_to_value)
                .collect::<Result<Vec<Value>>>()?;
            let ty = match values.first().map(Value::get_type) {
                Some(first) if values.iter().all(|v| v.get_type() == first) => first,
                _ => Type::Value,
            };
            let size = Size::new(&[values.len()])?;
            Ok(Value::Array(Arc::new(ArrayBase::from_values(ty, size, &values)?)))
        }
        toml::Value::Datetime(_) | toml::Value::Table(_) => Err(RpgmlError::Config(format!(
            "unsupported param value '{}'",
            value
        ))),
    }
}

/// Build nodes, frame and graph from a parsed description.
pub fn load_graph(file: &GraphFile, gc: Arc<GarbageCollector>) -> Result<LoadedGraph> {
    let frame = gc.track(Frame::new("root", None));

    for spec in &file.nodes {
        let node = NodeFactory::create_by_name(&spec.kind, &spec.id, Some(&gc))?;
        for (name, raw) in &spec.params {
            let value = toml_to_value(raw)
                .with_context(|| format!("param '{}' of node '{}'", name, spec.id))?;
            node.set_param(name, None, &value)?;
        }
        frame.define_node(&spec.id, node)?;
    }

    for conn in &file.connections {
        let from = PortRef::parse(&conn.from)?;
        let to = PortRef::parse(&conn.to)?;
        let output = frame.node(from.node)?.output(from.port).ok_or_else(|| {
            RpgmlError::Connection(format!("node '{}' has no output '{}'", from.node, from.port))
        })?;
        let input = frame.node(to.node)?.input(to.port).ok_or_else(|| {
            RpgmlError::Connection(format!("node '{}' has no input '{}'", to.node, to.port))
        })?;
        Input::connect(&input, &output)
            .with_context(|| format!("connecting {} -> {}", conn.from, conn.to))?;
    }

    let mut graph = Graph::new(gc.clone());
    for spec in &file.nodes {
        graph.add_node(&frame.node(&spec.id)?);
    }
    tracing::info!(
        "Loaded graph: {} nodes, {} connections",
        graph.len(),
        file.connections.len()
    );

    Ok(LoadedGraph {
        config: file.runtime.clone(),
        frame,
        graph,
        gc,
    })
}

/// Parse and load a graph description from TOML text.
pub fn load_str(content: &str, gc: Arc<GarbageCollector>) -> Result<LoadedGraph> {
    load_graph(&GraphFile::from_toml_str(content)?, gc)
}

/// Parse and load a graph description file.
pub fn load_path(path: impl AsRef<Path>, gc: Arc<GarbageCollector>) -> Result<LoadedGraph> {
    load_graph(&GraphFile::load(path)?, gc)
}
