//! Named scopes.
//!
//! A `Frame` maps identifiers to values or nodes. Lookups fall back to the
//! parent frame. The loader defines every declared node in one root frame,
//! which then owns the configured nodes for the lifetime of a run.

use crate::error::{Result, RpgmlError};
use crate::gc::{Collectable, CountPtr, Tracer};
use crate::pipeline::node::NodeHandle;
use crate::types::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// What an identifier is bound to.
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Node(NodeHandle),
}

struct Scope {
    parent: Option<CountPtr<Frame>>,
    entries: Vec<(String, Binding)>,
}

pub struct Frame {
    name: String,
    scope: Mutex<Scope>,
}

impl Frame {
    pub fn new(name: impl Into<String>, parent: Option<CountPtr<Frame>>) -> Self {
        Self {
            name: name.into(),
            scope: Mutex::new(Scope {
                parent,
                entries: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> MutexGuard<'_, Scope> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn define(&self, name: &str, binding: Binding) -> Result<()> {
        let mut scope = self.scope();
        if scope.entries.iter().any(|(n, _)| n == name) {
            return Err(RpgmlError::Config(format!(
                "'{}' is already defined in frame '{}'",
                name, self.name
            )));
        }
        scope.entries.push((name.to_string(), binding));
        Ok(())
    }

    pub fn define_value(&self, name: &str, value: Value) -> Result<()> {
        self.define(name, Binding::Value(value))
    }

    pub fn define_node(&self, name: &str, node: NodeHandle) -> Result<()> {
        self.define(name, Binding::Node(node))
    }

    /// Resolve `name` here or in any parent frame.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        let parent = {
            let scope = self.scope();
            if let Some((_, binding)) = scope.entries.iter().find(|(n, _)| n == name) {
                return Some(binding.clone());
            }
            scope.parent.clone()
        };
        parent.and_then(|p| p.lookup(name))
    }

    /// Resolve `name` to a node.
    pub fn node(&self, name: &str) -> Result<NodeHandle> {
        match self.lookup(name) {
            Some(Binding::Node(node)) => Ok(node),
            Some(Binding::Value(_)) => Err(RpgmlError::Config(format!(
                "'{}' is a value, not a node",
                name
            ))),
            None => Err(RpgmlError::Config(format!("unknown node '{}'", name))),
        }
    }

    /// Identifiers defined directly in this frame, in definition order.
    pub fn names(&self) -> Vec<String> {
        self.scope().entries.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Nodes defined directly in this frame, in definition order.
    pub fn nodes(&self) -> Vec<NodeHandle> {
        self.scope()
            .entries
            .iter()
            .filter_map(|(_, b)| match b {
                Binding::Node(n) => Some(n.clone()),
                Binding::Value(_) => None,
            })
            .collect()
    }
}

impl Collectable for Frame {
    fn gc_children(&self, tracer: &mut Tracer) {
        let scope = self.scope();
        tracer.edge_opt(scope.parent.as_ref());
        for (_, binding) in &scope.entries {
            if let Binding::Node(node) = binding {
                tracer.edge(node);
            }
        }
    }

    fn gc_clear(&self) {
        let (parent, entries) = {
            let mut scope = self.scope();
            (scope.parent.take(), std::mem::take(&mut scope.entries))
        };
        drop(parent);
        drop(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_lookup() {
        let frame = Frame::new("root", None);
        frame.define_value("gain", Value::F64(2.0)).unwrap();
        assert!(matches!(
            frame.lookup("gain"),
            Some(Binding::Value(Value::F64(v))) if v == 2.0
        ));
        assert!(frame.lookup("missing").is_none());
        assert_eq!(frame.names(), vec!["gain".to_string()]);
    }

    #[test]
    fn test_redefinition_rejected() {
        let frame = Frame::new("root", None);
        frame.define_value("x", Value::I32(1)).unwrap();
        assert!(matches!(
            frame.define_value("x", Value::I32(2)),
            Err(RpgmlError::Config(_))
        ));
    }

    #[test]
    fn test_parent_fallback_and_shadowing() {
        let root = CountPtr::new(Frame::new("root", None));
        root.define_value("x", Value::I32(1)).unwrap();
        root.define_value("y", Value::I32(2)).unwrap();

        let child = Frame::new("child", Some(root.clone()));
        child.define_value("x", Value::I32(10)).unwrap();

        assert!(matches!(child.lookup("x"), Some(Binding::Value(Value::I32(10)))));
        assert!(matches!(child.lookup("y"), Some(Binding::Value(Value::I32(2)))));
        assert!(child.node("y").is_err());
        assert!(child.node("z").is_err());
    }
}
