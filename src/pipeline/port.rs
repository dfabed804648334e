//! Ports of the node system.
//!
//! Each node type declares its ports via a static `PortDescriptor` array.
//! At construction every descriptor becomes a live [`Input`] or [`Output`].
//!
//! An `Output` owns the array it currently publishes and a "changed" flag.
//! An `Input` holds the `Output` feeding it, and that `Output` holds the
//! `Input` back in its fan-out list. The two strong links form a cycle
//! that outlives both nodes unless the ports are disconnected or the
//! collector reclaims them.

use crate::array::{ArrayBase, ArrayRef, Size};
use crate::error::{Result, RpgmlError};
use crate::gc::{Collectable, CountPtr, Tracer, WeakPtr};
use crate::pipeline::node::{NodeCell, NodeHandle};
use crate::types::Type;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Static descriptor for a node's port.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub name: &'static str,
    pub direction: PortDirection,
    /// Element type of the initially published array (outputs only).
    pub elem_type: Type,
    /// Dimension count of the initially published array (outputs only).
    pub dims: usize,
}

impl PortDescriptor {
    pub const fn input(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
            elem_type: Type::Nil,
            dims: 0,
        }
    }

    /// Output publishing nothing until the node's first tick.
    pub const fn output(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
            elem_type: Type::Nil,
            dims: 0,
        }
    }

    /// Output that starts with an empty array of `elem_type`.
    pub const fn typed_output(name: &'static str, elem_type: Type, dims: usize) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
            elem_type,
            dims,
        }
    }

    /// The array an output publishes before the first tick, if any.
    pub fn initial_data(&self) -> Result<Option<ArrayRef>> {
        if self.direction == PortDirection::Input || self.elem_type == Type::Nil {
            return Ok(None);
        }
        let size = if self.dims == 0 {
            Size::scalar()
        } else {
            Size::new(&vec![0; self.dims])?
        };
        Ok(Some(Arc::new(ArrayBase::new(self.elem_type, size)?)))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct OutputState {
    data: Option<ArrayRef>,
    changed: bool,
}

/// Publishing end of a connection.
pub struct Output {
    name: String,
    owner: WeakPtr<NodeCell>,
    state: RwLock<OutputState>,
    inputs: Mutex<Vec<CountPtr<Input>>>,
}

impl Output {
    pub fn new(name: impl Into<String>, owner: WeakPtr<NodeCell>) -> Self {
        Self {
            name: name.into(),
            owner,
            state: RwLock::new(OutputState::default()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node this output belongs to, while it is alive.
    pub fn owner(&self) -> Option<NodeHandle> {
        self.owner.upgrade()
    }

    /// The currently published array.
    pub fn data(&self) -> Option<ArrayRef> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .data
            .clone()
    }

    /// Replace the published array. Does not mark the output changed.
    pub fn set_data(&self, data: impl Into<ArrayRef>) {
        let old = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.data.replace(data.into())
        };
        drop(old);
    }

    pub fn clear_data(&self) {
        let old = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .data
            .take();
        drop(old);
    }

    pub fn has_changed(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .changed
    }

    pub fn set_changed(&self, changed: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .changed = changed;
    }

    /// Inputs this output fans out to.
    pub fn connected_inputs(&self) -> Vec<CountPtr<Input>> {
        lock(&self.inputs).clone()
    }

    pub fn fan_out(&self) -> usize {
        lock(&self.inputs).len()
    }

    /// Disconnect every input fed by this output.
    pub fn disconnect_all(&self) {
        let inputs = std::mem::take(&mut *lock(&self.inputs));
        for input in &inputs {
            input.clear_source();
        }
    }
}

impl Collectable for Output {
    fn gc_children(&self, tracer: &mut Tracer) {
        for input in lock(&self.inputs).iter() {
            tracer.edge(input);
        }
    }

    fn gc_clear(&self) {
        let inputs = std::mem::take(&mut *lock(&self.inputs));
        drop(inputs);
    }
}

/// Receiving end of a connection; fed by at most one output.
pub struct Input {
    name: String,
    owner: WeakPtr<NodeCell>,
    source: Mutex<Option<CountPtr<Output>>>,
}

impl Input {
    pub fn new(name: impl Into<String>, owner: WeakPtr<NodeCell>) -> Self {
        Self {
            name: name.into(),
            owner,
            source: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<NodeHandle> {
        self.owner.upgrade()
    }

    /// Connect `input` to `output`. An input accepts a single writer.
    pub fn connect(input: &CountPtr<Input>, output: &CountPtr<Output>) -> Result<()> {
        {
            let mut source = lock(&input.source);
            if let Some(existing) = source.as_ref() {
                if CountPtr::ptr_eq(existing, output) {
                    return Ok(());
                }
                return Err(RpgmlError::Connection(format!(
                    "input '{}' is already connected to output '{}'",
                    input.name,
                    existing.name()
                )));
            }
            *source = Some(output.clone());
        }
        lock(&output.inputs).push(input.clone());
        Ok(())
    }

    /// Remove the connection on both ends.
    pub fn disconnect(input: &CountPtr<Input>) {
        let source = lock(&input.source).take();
        if let Some(output) = source {
            lock(&output.inputs).retain(|i| !CountPtr::ptr_eq(i, input));
        }
    }

    fn clear_source(&self) {
        let source = lock(&self.source).take();
        drop(source);
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.source).is_some()
    }

    /// The output feeding this input.
    pub fn source(&self) -> Option<CountPtr<Output>> {
        lock(&self.source).clone()
    }

    /// Whether the connected output changed in the current pass.
    /// Unconnected inputs never change.
    pub fn has_changed(&self) -> bool {
        lock(&self.source)
            .as_ref()
            .is_some_and(|o| o.has_changed())
    }

    /// The connected output's array, or `None` when unconnected or empty.
    pub fn get_data(&self) -> Option<ArrayRef> {
        lock(&self.source).as_ref().and_then(|o| o.data())
    }
}

impl Collectable for Input {
    fn gc_children(&self, tracer: &mut Tracer) {
        tracer.edge_opt(lock(&self.source).as_ref());
    }

    fn gc_clear(&self) {
        self.clear_source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn pair() -> (CountPtr<Output>, CountPtr<Input>) {
        (
            CountPtr::new(Output::new("out", WeakPtr::new())),
            CountPtr::new(Input::new("in", WeakPtr::new())),
        )
    }

    #[test]
    fn test_unconnected_input() {
        let (_, input) = pair();
        assert!(!input.is_connected());
        assert!(!input.has_changed());
        assert!(input.get_data().is_none());
        assert!(input.owner().is_none());
    }

    #[test]
    fn test_set_data_does_not_mark_changed() {
        let (output, input) = pair();
        Input::connect(&input, &output).unwrap();

        output.set_data(ArrayBase::scalar(&Value::I32(7)).unwrap());
        assert!(!input.has_changed());
        assert_eq!(
            input.get_data().unwrap().scalar_value(),
            Some(Value::I32(7))
        );

        output.set_changed(true);
        assert!(input.has_changed());
    }

    #[test]
    fn test_single_writer() {
        let (a, input) = pair();
        let (b, _) = pair();
        Input::connect(&input, &a).unwrap();
        Input::connect(&input, &a).unwrap();
        assert_eq!(a.fan_out(), 1);
        assert!(matches!(
            Input::connect(&input, &b),
            Err(RpgmlError::Connection(_))
        ));
    }

    #[test]
    fn test_fan_out_and_disconnect() {
        let (output, first) = pair();
        let (_, second) = pair();
        Input::connect(&first, &output).unwrap();
        Input::connect(&second, &output).unwrap();
        assert_eq!(output.fan_out(), 2);

        Input::disconnect(&first);
        assert!(!first.is_connected());
        assert_eq!(output.fan_out(), 1);

        output.disconnect_all();
        assert!(!second.is_connected());
        assert_eq!(output.fan_out(), 0);
    }

    #[test]
    fn test_initial_data() {
        let desc = PortDescriptor::typed_output("out", Type::F32, 2);
        let data = desc.initial_data().unwrap().unwrap();
        assert_eq!(data.elem_type(), Type::F32);
        assert_eq!(data.size().as_slice(), &[0, 0]);
        assert!(PortDescriptor::output("out").initial_data().unwrap().is_none());
        assert!(PortDescriptor::input("in").initial_data().unwrap().is_none());
    }
}
