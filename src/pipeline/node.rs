//! Node abstraction for the pipeline.
//!
//! Two layers:
//! - **`Node` trait**: the computation. Implementations declare ports and
//!   params statically and implement `tick`.
//! - **`NodeCell`**: the runtime object wrapping a `Node`. It owns the live
//!   ports, serializes ticks, tracks the configuring/started state, and
//!   takes part in cycle collection.
//!
//! A `NodeCell` is created in the *configuring* state. Ports may still be
//! added (variable arity nodes) until the first tick, after which the port
//! sets are frozen.

use crate::array::ArrayRef;
use crate::error::{Result, RpgmlError};
use crate::gc::{Collectable, CountPtr, GarbageCollector, Tracer, WeakPtr};
use crate::pipeline::port::{Input, Output, PortDescriptor, PortDirection};
use crate::types::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Context passed to [`Node::tick`].
pub struct TickContext<'a> {
    node: &'a str,
    inputs: &'a [CountPtr<Input>],
    outputs: &'a [CountPtr<Output>],
    pass: u64,
}

impl<'a> TickContext<'a> {
    pub fn new(
        node: &'a str,
        inputs: &'a [CountPtr<Input>],
        outputs: &'a [CountPtr<Output>],
        pass: u64,
    ) -> Self {
        Self {
            node,
            inputs,
            outputs,
            pass,
        }
    }

    /// Name of the node being ticked.
    pub fn node_name(&self) -> &str {
        self.node
    }

    /// Number of the current pass, starting at 1.
    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn inputs(&self) -> &[CountPtr<Input>] {
        self.inputs
    }

    pub fn outputs(&self) -> &[CountPtr<Output>] {
        self.outputs
    }

    pub fn input(&self, index: usize) -> Result<&Input> {
        self.inputs.get(index).map(|p| &**p).ok_or_else(|| {
            RpgmlError::node(self.node, format!("no input at index {}", index))
        })
    }

    pub fn output(&self, index: usize) -> Result<&Output> {
        self.outputs.get(index).map(|p| &**p).ok_or_else(|| {
            RpgmlError::node(self.node, format!("no output at index {}", index))
        })
    }

    /// Data of input `index`, or `None` when unconnected or empty.
    pub fn input_data(&self, index: usize) -> Result<Option<ArrayRef>> {
        Ok(self.input(index)?.get_data())
    }

    /// Data of input `index`, failing when there is none.
    pub fn require_input(&self, index: usize) -> Result<ArrayRef> {
        let input = self.input(index)?;
        input.get_data().ok_or_else(|| {
            RpgmlError::node(self.node, format!("input '{}' has no data", input.name()))
        })
    }

    pub fn has_any_input_changed(&self) -> bool {
        self.inputs.iter().any(|i| i.has_changed())
    }

    pub fn set_all_output_changed(&self) {
        for output in self.outputs {
            output.set_changed(true);
        }
    }

    /// Replace the data of output `index` and mark it changed.
    pub fn publish(&self, index: usize, data: impl Into<ArrayRef>) -> Result<()> {
        let output = self.output(index)?;
        output.set_data(data);
        output.set_changed(true);
        Ok(())
    }
}

/// Trait implemented by every node type.
pub trait Node: Send {
    /// Type name used in graph files and log messages.
    fn type_name(&self) -> &'static str;

    /// Port descriptors for this node.
    fn ports(&self) -> &'static [PortDescriptor];

    /// Assign a param. Nodes without params reject every name.
    fn set_param(&mut self, name: &str, _index: Option<usize>, _value: &Value) -> Result<()> {
        Err(RpgmlError::InvalidArgument(format!(
            "unknown param '{}'",
            name
        )))
    }

    /// Names of the params this node accepts.
    fn param_names(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Run one pass worth of computation.
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<()>;
}

/// Shared handle to a runtime node.
pub type NodeHandle = CountPtr<NodeCell>;

/// Runtime node: ports plus the wrapped [`Node`].
pub struct NodeCell {
    name: String,
    type_name: RwLock<&'static str>,
    me: WeakPtr<NodeCell>,
    gc: Option<Arc<GarbageCollector>>,
    inputs: RwLock<Vec<CountPtr<Input>>>,
    outputs: RwLock<Vec<CountPtr<Output>>>,
    inner: Mutex<Box<dyn Node>>,
    started: AtomicBool,
}

impl NodeCell {
    /// Wrap `node`, creating its declared ports. With a collector, the node
    /// and all its ports are registered for cycle collection.
    pub fn create(
        name: impl Into<String>,
        node: Box<dyn Node>,
        gc: Option<&Arc<GarbageCollector>>,
    ) -> Result<NodeHandle> {
        let name = name.into();
        let type_name = node.type_name();
        let ports = node.ports();

        let mut initial = Vec::new();
        for desc in ports.iter().filter(|d| d.direction == PortDirection::Output) {
            initial.push(desc.initial_data()?);
        }

        let cell = CountPtr::new_cyclic(|me| NodeCell {
            name,
            type_name: RwLock::new(type_name),
            me: me.clone(),
            gc: gc.cloned(),
            inputs: RwLock::new(Vec::new()),
            outputs: RwLock::new(Vec::new()),
            inner: Mutex::new(node),
            started: AtomicBool::new(false),
        });
        if let Some(gc) = gc {
            gc.register(&cell);
        }

        let mut initial = initial.into_iter();
        for desc in ports {
            match desc.direction {
                PortDirection::Input => {
                    cell.push_input(desc.name);
                }
                PortDirection::Output => {
                    let output = cell.push_output(desc.name);
                    if let Some(Some(data)) = initial.next() {
                        output.set_data(data);
                    }
                }
            }
        }
        Ok(cell)
    }

    fn track<T: Collectable>(&self, value: T) -> CountPtr<T> {
        match &self.gc {
            Some(gc) => gc.track(value),
            None => CountPtr::new(value),
        }
    }

    fn push_input(&self, name: &str) -> CountPtr<Input> {
        let input = self.track(Input::new(name, self.me.clone()));
        self.inputs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(input.clone());
        input
    }

    fn push_output(&self, name: &str) -> CountPtr<Output> {
        let output = self.track(Output::new(name, self.me.clone()));
        self.outputs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(output.clone());
        output
    }

    fn ensure_configuring(&self, what: &str) -> Result<()> {
        if self.is_started() {
            return Err(RpgmlError::node(
                &self.name,
                format!("cannot {} after the first tick", what),
            ));
        }
        Ok(())
    }

    /// Grow the input list of a variable arity node.
    pub fn add_input(&self, name: &str) -> Result<CountPtr<Input>> {
        self.ensure_configuring("add inputs")?;
        Ok(self.push_input(name))
    }

    /// Grow the output list of a variable arity node.
    pub fn add_output(&self, name: &str) -> Result<CountPtr<Output>> {
        self.ensure_configuring("add outputs")?;
        Ok(self.push_output(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        *self.type_name.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once the node has been ticked.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn inputs(&self) -> Vec<CountPtr<Input>> {
        self.inputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn outputs(&self) -> Vec<CountPtr<Output>> {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn input(&self, name: &str) -> Option<CountPtr<Input>> {
        self.inputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|i| i.name() == name)
            .cloned()
    }

    pub fn output(&self, name: &str) -> Option<CountPtr<Output>> {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|o| o.name() == name)
            .cloned()
    }

    /// Nodes feeding any of this node's inputs, in input order.
    pub fn predecessors(&self) -> Vec<NodeHandle> {
        self.inputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|i| i.source())
            .filter_map(|o| o.owner())
            .collect()
    }

    /// Assign a param of the wrapped node.
    pub fn set_param(&self, name: &str, index: Option<usize>, value: &Value) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .set_param(name, index, value)
            .map_err(|e| RpgmlError::param(&self.name, name, e))?;
        // Some params select the operation, and with it the type name
        *self.type_name.write().unwrap_or_else(PoisonError::into_inner) = inner.type_name();
        Ok(())
    }

    pub fn param_names(&self) -> Vec<&'static str> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .param_names()
    }

    /// Clear the changed flag of every output.
    pub fn reset_changed(&self) {
        for output in self.outputs.read().unwrap_or_else(PoisonError::into_inner).iter() {
            output.set_changed(false);
        }
    }

    /// Run one tick of the wrapped node.
    ///
    /// Outputs start the tick unchanged. If the tick fails they stay
    /// unchanged, so downstream nodes see the last good data as not updated.
    pub fn tick(&self, pass: u64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.started.store(true, Ordering::Release);
        self.reset_changed();

        let inputs = self.inputs.read().unwrap_or_else(PoisonError::into_inner);
        let outputs = self.outputs.read().unwrap_or_else(PoisonError::into_inner);
        let mut ctx = TickContext::new(&self.name, &inputs, &outputs, pass);
        let result = inner.tick(&mut ctx);
        if result.is_err() {
            for output in outputs.iter() {
                output.set_changed(false);
            }
        }
        result
    }
}

impl Collectable for NodeCell {
    fn gc_children(&self, tracer: &mut Tracer) {
        for input in self.inputs.read().unwrap_or_else(PoisonError::into_inner).iter() {
            tracer.edge(input);
        }
        for output in self.outputs.read().unwrap_or_else(PoisonError::into_inner).iter() {
            tracer.edge(output);
        }
    }

    fn gc_clear(&self) {
        let inputs = std::mem::take(&mut *self.inputs.write().unwrap_or_else(PoisonError::into_inner));
        let outputs =
            std::mem::take(&mut *self.outputs.write().unwrap_or_else(PoisonError::into_inner));
        drop(inputs);
        drop(outputs);
    }
}

impl std::fmt::Debug for NodeCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCell")
            .field("name", &self.name)
            .field("type", &self.type_name())
            .field("started", &self.is_started())
            .finish()
    }
}
