//! PrintNode: logs its input whenever it changes.

use crate::array::ArrayBase;
use crate::error::Result;
use crate::pipeline::node::{Node, TickContext};
use crate::pipeline::port::PortDescriptor;

static PORTS: &[PortDescriptor] = &[PortDescriptor::input("in")];

/// Elements shown before the listing is cut short.
const MAX_SHOWN: usize = 16;

#[derive(Debug, Default)]
pub struct PrintNode {
    printed: u64,
}

impl PrintNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the input has been logged.
    pub fn printed(&self) -> u64 {
        self.printed
    }
}

/// One-line rendering such as `int32[3] = [1, 2, 3]`.
pub fn describe(data: &ArrayBase) -> String {
    let values = data.to_values();
    let mut shown: Vec<String> = values.iter().take(MAX_SHOWN).map(|v| v.to_string()).collect();
    if values.len() > MAX_SHOWN {
        shown.push(format!("... {} more", values.len() - MAX_SHOWN));
    }
    if data.dims() == 0 {
        format!("{} = {}", data.elem_type(), shown.join(", "))
    } else {
        format!("{}{} = [{}]", data.elem_type(), data.size(), shown.join(", "))
    }
}

impl Node for PrintNode {
    fn type_name(&self) -> &'static str {
        "print"
    }

    fn ports(&self) -> &'static [PortDescriptor] {
        PORTS
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<()> {
        if !ctx.input(0)?.has_changed() {
            return Ok(());
        }
        let data = ctx.require_input(0)?;
        tracing::info!("[{}] pass {}: {}", ctx.node_name(), ctx.pass(), describe(&data));
        self.printed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{Array, Size};
    use crate::gc::{CountPtr, WeakPtr};
    use crate::pipeline::port::{Input, Output};
    use crate::types::Value;

    #[test]
    fn test_describe() {
        let scalar = ArrayBase::scalar(&Value::I32(65)).unwrap();
        assert_eq!(describe(&scalar), "int32 = 65");

        let line = ArrayBase::from(Array::<u8>::from_vec(Size::new(&[3]).unwrap(), vec![1, 2, 3]).unwrap());
        assert!(describe(&line).ends_with("= [1, 2, 3]"));

        let long = ArrayBase::from(Array::<f64>::new(Size::new(&[20]).unwrap()));
        assert!(describe(&long).contains("... 4 more"));
    }

    #[test]
    fn test_prints_only_on_change() {
        let output = CountPtr::new(Output::new("out", WeakPtr::new()));
        let input = CountPtr::new(Input::new("in", WeakPtr::new()));
        Input::connect(&input, &output).unwrap();
        output.set_data(ArrayBase::scalar(&Value::F64(1.0)).unwrap());

        let inputs = [input];
        let mut node = PrintNode::new();

        let mut ctx = TickContext::new("p", &inputs, &[], 1);
        node.tick(&mut ctx).unwrap();
        assert_eq!(node.printed(), 0);

        output.set_changed(true);
        let mut ctx = TickContext::new("p", &inputs, &[], 2);
        node.tick(&mut ctx).unwrap();
        assert_eq!(node.printed(), 1);
    }
}
