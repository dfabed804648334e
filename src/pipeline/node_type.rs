//! Node type enumeration for creating builtin nodes by name.
//!
//! Graph files name node types with the lowercase names returned by
//! [`NodeType::type_name`]; [`NodeFactory`] turns a type into a live node.

use crate::error::{Result, RpgmlError};
use crate::gc::GarbageCollector;
use crate::pipeline::node::{Node, NodeCell, NodeHandle};
use crate::pipeline::nodes::{
    ArithOp, ArithmeticNode, ConstantNode, CounterNode, PrintNode, TransformNode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Types of nodes that can be instantiated from a graph file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    // Source nodes
    /// Publishes a fixed value.
    Constant,
    /// Publishes its tick count.
    Counter,

    // Transform nodes
    /// Element-wise addition.
    Add,
    /// Element-wise subtraction.
    Sub,
    /// Element-wise multiplication.
    Mul,
    /// Element-wise division.
    Div,
    /// Geometric view of its input.
    Transform,

    // Sink nodes
    /// Logs its input.
    Print,
}

impl NodeType {
    /// Get the display name for this node type.
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeType::Constant => "Constant",
            NodeType::Counter => "Counter",
            NodeType::Add => "Add",
            NodeType::Sub => "Subtract",
            NodeType::Mul => "Multiply",
            NodeType::Div => "Divide",
            NodeType::Transform => "Transform",
            NodeType::Print => "Print",
        }
    }

    /// Name used in graph files.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeType::Constant => "constant",
            NodeType::Counter => "counter",
            NodeType::Add => "add",
            NodeType::Sub => "sub",
            NodeType::Mul => "mul",
            NodeType::Div => "div",
            NodeType::Transform => "transform",
            NodeType::Print => "print",
        }
    }

    pub fn from_name(name: &str) -> Option<NodeType> {
        NodeType::all()
            .iter()
            .copied()
            .find(|t| t.type_name() == name)
    }

    /// Get all available node types.
    pub fn all() -> &'static [NodeType] {
        &[
            NodeType::Constant,
            NodeType::Counter,
            NodeType::Add,
            NodeType::Sub,
            NodeType::Mul,
            NodeType::Div,
            NodeType::Transform,
            NodeType::Print,
        ]
    }

    /// Check if this node type has no inputs.
    pub fn is_source(&self) -> bool {
        matches!(self, NodeType::Constant | NodeType::Counter)
    }

    /// Check if this node type has no outputs.
    pub fn is_sink(&self) -> bool {
        matches!(self, NodeType::Print)
    }

    fn arith_op(&self) -> Option<ArithOp> {
        match self {
            NodeType::Add => Some(ArithOp::Add),
            NodeType::Sub => Some(ArithOp::Sub),
            NodeType::Mul => Some(ArithOp::Mul),
            NodeType::Div => Some(ArithOp::Div),
            _ => None,
        }
    }

    /// Get a detailed description of what this node does.
    pub fn description(&self) -> &'static str {
        match self {
            NodeType::Constant =>
                "Publishes a fixed value on 'out'.\n\
                 Params: value, type (element type name).\n\
                 Marked changed only after the value is set.",

            NodeType::Counter =>
                "Publishes its tick count as uint64.\n\
                 Param limit requests exit when reached.",

            NodeType::Add | NodeType::Sub | NodeType::Mul | NodeType::Div =>
                "Combines 'in1' and 'in2' element-wise.\n\
                 A single element is broadcast over the other input.\n\
                 Same integer types stay integer with overflow checks.",

            NodeType::Transform =>
                "Republishes 'in' through a geometric view.\n\
                 Params: roi, sparse, mirror, rotate.\n\
                 The output shares storage with the input.",

            NodeType::Print =>
                "Logs 'in' whenever it changed.",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Creates builtin nodes.
pub struct NodeFactory;

impl NodeFactory {
    /// Create a node of `kind` named `id`, tracked by `gc` when given.
    pub fn create(
        kind: NodeType,
        id: &str,
        gc: Option<&Arc<GarbageCollector>>,
    ) -> Result<NodeHandle> {
        let node: Box<dyn Node> = match kind {
            NodeType::Constant => Box::new(ConstantNode::new()),
            NodeType::Counter => Box::new(CounterNode::new()),
            NodeType::Transform => Box::new(TransformNode::new()),
            NodeType::Print => Box::new(PrintNode::new()),
            NodeType::Add | NodeType::Sub | NodeType::Mul | NodeType::Div => {
                let op = kind.arith_op().unwrap_or(ArithOp::Add);
                Box::new(ArithmeticNode::new(op))
            }
        };
        tracing::debug!("Created {} node '{}'", kind.type_name(), id);
        NodeCell::create(id, node, gc)
    }

    /// Like [`create`](Self::create) with the type given by name.
    pub fn create_by_name(
        type_name: &str,
        id: &str,
        gc: Option<&Arc<GarbageCollector>>,
    ) -> Result<NodeHandle> {
        let kind = NodeType::from_name(type_name).ok_or_else(|| {
            RpgmlError::Config(format!("unknown node type '{}' for node '{}'", type_name, id))
        })?;
        Self::create(kind, id, gc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in NodeType::all() {
            assert_eq!(NodeType::from_name(kind.type_name()), Some(*kind));
            assert!(!kind.description().is_empty());
        }
        assert_eq!(NodeType::from_name("Add"), None);
        assert_eq!(NodeType::Mul.to_string(), "Multiply");
    }

    #[test]
    fn test_factory_sets_type_names() {
        for kind in NodeType::all() {
            let node = NodeFactory::create(*kind, "n", None).unwrap();
            assert_eq!(node.type_name(), kind.type_name());
            assert_eq!(node.name(), "n");
            assert_eq!(node.inputs().is_empty(), kind.is_source());
            assert_eq!(node.outputs().is_empty(), kind.is_sink());
        }
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        assert!(matches!(
            NodeFactory::create_by_name("fft", "x", None),
            Err(RpgmlError::Config(_))
        ));
    }
}
