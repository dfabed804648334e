//! ArithmeticNode: element-wise `in1 <op> in2`.
//!
//! Either input may be a single element, which is broadcast over the other.
//! Otherwise both inputs must have the same size. When both inputs share an
//! integer element type the result keeps that type and overflow (or division
//! by zero) fails the tick; every other combination is computed in double.

use crate::array::{dispatch_array, Array, ArrayBase, Element, Size};
use crate::error::{Result, RpgmlError};
use crate::pipeline::node::{Node, TickContext};
use crate::pipeline::param::{self, expect_str, ParamSpec};
use crate::pipeline::port::PortDescriptor;
use crate::types::{Type, Value};

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in1"),
    PortDescriptor::input("in2"),
    PortDescriptor::output("out"),
];

static PARAMS: &[ParamSpec<ArithmeticNode>] = &[ParamSpec::scalar("op", set_op)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn name(&self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
        }
    }

    pub fn from_name(name: &str) -> Option<ArithOp> {
        match name {
            "add" | "+" => Some(ArithOp::Add),
            "sub" | "-" => Some(ArithOp::Sub),
            "mul" | "*" => Some(ArithOp::Mul),
            "div" | "/" => Some(ArithOp::Div),
            _ => None,
        }
    }

    fn apply_f64(self, l: f64, r: f64) -> f64 {
        match self {
            ArithOp::Add => l + r,
            ArithOp::Sub => l - r,
            ArithOp::Mul => l * r,
            ArithOp::Div => l / r,
        }
    }
}

/// Integer element types with checked arithmetic.
trait CheckedElement: Element + Copy {
    fn apply(op: ArithOp, l: Self, r: Self) -> Option<Self>;
}

macro_rules! impl_checked_element {
    ($($t:ty),*) => {
        $(
            impl CheckedElement for $t {
                fn apply(op: ArithOp, l: Self, r: Self) -> Option<Self> {
                    match op {
                        ArithOp::Add => l.checked_add(r),
                        ArithOp::Sub => l.checked_sub(r),
                        ArithOp::Mul => l.checked_mul(r),
                        ArithOp::Div => l.checked_div(r),
                    }
                }
            }
        )*
    };
}

impl_checked_element!(u8, i8, u16, i16, u32, i32, u64, i64);

pub struct ArithmeticNode {
    op: ArithOp,
    dirty: bool,
}

impl ArithmeticNode {
    pub fn new(op: ArithOp) -> Self {
        Self { op, dirty: true }
    }

    pub fn op(&self) -> ArithOp {
        self.op
    }

    fn compute(&self, a: &ArrayBase, b: &ArrayBase) -> Result<ArrayBase> {
        let size = broadcast_size(a, b)?;

        macro_rules! same_integer {
            ($($variant:ident),*) => {
                match (a, b) {
                    $(
                        (ArrayBase::$variant(x), ArrayBase::$variant(y)) => {
                            return combine_checked(self.op, x, y, size).map(ArrayBase::from);
                        }
                    )*
                    _ => {}
                }
            };
        }
        same_integer!(U8, I8, U16, I16, U32, I32, U64, I64);

        let xs = to_f64s(a)?;
        let ys = to_f64s(b)?;
        let out = (0..size.elements())
            .map(|i| self.op.apply_f64(pick(&xs, i), pick(&ys, i)))
            .collect();
        Ok(Array::<f64>::from_vec(size, out)?.into())
    }
}

fn set_op(node: &mut ArithmeticNode, _: Option<usize>, value: &Value) -> Result<()> {
    let name = expect_str(value)?;
    node.op = ArithOp::from_name(name)
        .ok_or_else(|| RpgmlError::InvalidArgument(format!("unknown operator '{}'", name)))?;
    node.dirty = true;
    Ok(())
}

/// Result size of combining `a` and `b`, broadcasting single elements.
fn broadcast_size(a: &ArrayBase, b: &ArrayBase) -> Result<Size> {
    let (sa, sb) = (a.size(), b.size());
    if a.len() == 1 && b.len() != 1 {
        return Ok(sb);
    }
    if b.len() == 1 || sa == sb {
        return Ok(sa);
    }
    Err(RpgmlError::InvalidArgument(format!(
        "operand sizes {} and {} do not match",
        sa, sb
    )))
}

fn pick<T: Copy>(values: &[T], i: usize) -> T {
    if values.len() == 1 {
        values[0]
    } else {
        values[i]
    }
}

fn to_f64s(base: &ArrayBase) -> Result<Vec<f64>> {
    let ty = base.elem_type();
    if !ty.is_scalar() {
        return Err(RpgmlError::TypeMismatch {
            expected: Type::F64,
            actual: ty,
        });
    }
    let mut out = Vec::with_capacity(base.len());
    dispatch_array!(base, a => a.for_each(|v| out.push(v.to_value().to_f64().unwrap_or(f64::NAN))));
    Ok(out)
}

fn combine_checked<T: CheckedElement>(
    op: ArithOp,
    x: &Array<T>,
    y: &Array<T>,
    size: Size,
) -> Result<Array<T>> {
    let xs = x.to_vec();
    let ys = y.to_vec();
    let mut out = Vec::with_capacity(size.elements());
    for i in 0..size.elements() {
        let (l, r) = (pick(&xs, i), pick(&ys, i));
        let v = T::apply(op, l, r).ok_or_else(|| RpgmlError::Conversion {
            value: format!("{:?} {} {:?}", l, op.name(), r),
            target: T::TYPE,
        })?;
        out.push(v);
    }
    Array::from_vec(size, out)
}

impl Node for ArithmeticNode {
    fn type_name(&self) -> &'static str {
        self.op.name()
    }

    fn ports(&self) -> &'static [PortDescriptor] {
        PORTS
    }

    fn set_param(&mut self, name: &str, index: Option<usize>, value: &Value) -> Result<()> {
        param::dispatch(PARAMS, self, name, index, value)
    }

    fn param_names(&self) -> Vec<&'static str> {
        param::names(PARAMS)
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<()> {
        if !self.dirty && !ctx.has_any_input_changed() {
            return Ok(());
        }
        let a = ctx.require_input(0)?;
        let b = ctx.require_input(1)?;
        let out = self
            .compute(&a, &b)
            .map_err(|e| RpgmlError::node(ctx.node_name(), e))?;
        ctx.publish(0, out)?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::node::{NodeCell, NodeHandle};
    use crate::pipeline::nodes::ConstantNode;
    use crate::pipeline::port::Input;

    fn constant(name: &str, value: impl Into<Value>) -> NodeHandle {
        NodeCell::create(name, Box::new(ConstantNode::with_value(value)), None).unwrap()
    }

    fn wired(op: ArithOp, l: &NodeHandle, r: &NodeHandle) -> NodeHandle {
        let node = NodeCell::create("op", Box::new(ArithmeticNode::new(op)), None).unwrap();
        Input::connect(&node.input("in1").unwrap(), &l.output("out").unwrap()).unwrap();
        Input::connect(&node.input("in2").unwrap(), &r.output("out").unwrap()).unwrap();
        node
    }

    fn tick_all(nodes: &[&NodeHandle], pass: u64) {
        for n in nodes {
            n.tick(pass).unwrap();
        }
    }

    #[test]
    fn test_integer_add_keeps_type() {
        let a = constant("a", 23i32);
        let b = constant("b", 42i32);
        let sum = wired(ArithOp::Add, &a, &b);
        tick_all(&[&a, &b, &sum], 1);
        let out = sum.output("out").unwrap().data().unwrap();
        assert_eq!(out.scalar_value(), Some(Value::I32(65)));
    }

    #[test]
    fn test_mixed_types_use_double() {
        let a = constant("a", 3u8);
        let b = constant("b", 0.5f64);
        let prod = wired(ArithOp::Mul, &a, &b);
        tick_all(&[&a, &b, &prod], 1);
        let out = prod.output("out").unwrap().data().unwrap();
        assert_eq!(out.elem_type(), Type::F64);
        assert_eq!(out.scalar_value(), Some(Value::F64(1.5)));
    }

    #[test]
    fn test_broadcast_scalar_over_array() {
        let array = ArrayBase::from(Array::<i64>::from_vec(Size::new(&[3]).unwrap(), vec![1, 2, 3]).unwrap());
        let a = constant("a", std::sync::Arc::new(array));
        let b = constant("b", 10i64);
        let diff = wired(ArithOp::Sub, &a, &b);
        tick_all(&[&a, &b, &diff], 1);
        let out = diff.output("out").unwrap().data().unwrap();
        assert_eq!(out.get_as::<i64>().unwrap().to_vec(), vec![-9, -8, -7]);
    }

    #[test]
    fn test_integer_overflow_fails() {
        let a = constant("a", 200u8);
        let b = constant("b", 100u8);
        let sum = wired(ArithOp::Add, &a, &b);
        tick_all(&[&a, &b], 1);
        assert!(sum.tick(1).is_err());

        let zero = constant("zero", 0i32);
        let one = constant("one", 1i32);
        let quot = wired(ArithOp::Div, &one, &zero);
        tick_all(&[&zero, &one], 1);
        assert!(quot.tick(1).is_err());
    }

    #[test]
    fn test_recomputes_only_on_change() {
        let a = constant("a", 1i32);
        let b = constant("b", 2i32);
        let sum = wired(ArithOp::Add, &a, &b);
        tick_all(&[&a, &b, &sum], 1);
        tick_all(&[&a, &b, &sum], 2);
        assert!(!sum.output("out").unwrap().has_changed());

        a.set_param("value", None, &Value::I32(5)).unwrap();
        tick_all(&[&a, &b, &sum], 3);
        let out = sum.output("out").unwrap();
        assert!(out.has_changed());
        assert_eq!(out.data().unwrap().scalar_value(), Some(Value::I32(7)));
    }

    #[test]
    fn test_size_mismatch_and_op_param() {
        let two = ArrayBase::from(Array::<f32>::new(Size::new(&[2]).unwrap()));
        let three = ArrayBase::from(Array::<f32>::new(Size::new(&[3]).unwrap()));
        assert!(broadcast_size(&two, &three).is_err());

        let mut node = ArithmeticNode::new(ArithOp::Add);
        node.set_param("op", None, &Value::string("div")).unwrap();
        assert_eq!(node.op(), ArithOp::Div);
        assert_eq!(node.type_name(), "div");
        assert!(node.set_param("op", None, &Value::string("pow")).is_err());
    }

    #[test]
    fn test_op_param_renames_cell() {
        let cell = NodeCell::create("calc", Box::new(ArithmeticNode::new(ArithOp::Add)), None).unwrap();
        assert_eq!(cell.type_name(), "add");
        cell.set_param("op", None, &Value::string("*")).unwrap();
        assert_eq!(cell.type_name(), "mul");
        assert!(cell.set_param("op", None, &Value::string("pow")).is_err());
        assert_eq!(cell.type_name(), "mul");
    }
}
