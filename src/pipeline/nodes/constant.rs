//! ConstantNode: publishes a fixed value.
//!
//! Scalars are published as zero-dimensional arrays; array values are
//! published as they are, sharing storage with the param. The output is
//! marked changed on the first tick and after every param assignment.

use crate::array::{with_element_type, Array, ArrayBase, ArrayRef, Element};
use crate::error::{Result, RpgmlError};
use crate::pipeline::node::{Node, TickContext};
use crate::pipeline::param::{self, expect_str, ParamSpec};
use crate::pipeline::port::PortDescriptor;
use crate::types::{Type, Value};
use std::sync::Arc;

static PORTS: &[PortDescriptor] = &[PortDescriptor::output("out")];

static PARAMS: &[ParamSpec<ConstantNode>] = &[
    ParamSpec::scalar("value", set_value),
    ParamSpec::scalar("type", set_type),
];

pub struct ConstantNode {
    value: Value,
    /// Element type to publish; defaults to the value's own type.
    ty: Option<Type>,
    dirty: bool,
}

impl ConstantNode {
    pub fn new() -> Self {
        Self {
            value: Value::Nil,
            ty: None,
            dirty: true,
        }
    }

    pub fn with_value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::new()
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    fn build(&self) -> Result<ArrayRef> {
        match (&self.value, self.ty) {
            (Value::Nil, _) => Err(RpgmlError::InvalidArgument(
                "no value set".to_string(),
            )),
            (Value::Array(a), None) => Ok(a.clone()),
            (Value::Array(a), Some(ty)) => {
                Ok(Arc::new(ArrayBase::from_values(ty, a.size(), &a.to_values())?))
            }
            (v, ty) => {
                let ty = ty.unwrap_or_else(|| v.get_type());
                with_element_type!(
                    ty,
                    T => Ok(Arc::new(Array::<T>::scalar(T::from_value(v)?).into())),
                    else Err(RpgmlError::InvalidArgument("nil is not a publishable type".to_string()))
                )
            }
        }
    }
}

impl Default for ConstantNode {
    fn default() -> Self {
        Self::new()
    }
}

fn set_value(node: &mut ConstantNode, _: Option<usize>, value: &Value) -> Result<()> {
    if value.is_nil() {
        return Err(RpgmlError::InvalidArgument(
            "constant value cannot be nil".to_string(),
        ));
    }
    node.value = value.clone();
    node.dirty = true;
    Ok(())
}

fn set_type(node: &mut ConstantNode, _: Option<usize>, value: &Value) -> Result<()> {
    let name = expect_str(value)?;
    let ty = Type::from_name(name)
        .filter(|t| *t != Type::Nil)
        .ok_or_else(|| RpgmlError::InvalidArgument(format!("unknown element type '{}'", name)))?;
    node.ty = Some(ty);
    node.dirty = true;
    Ok(())
}

impl Node for ConstantNode {
    fn type_name(&self) -> &'static str {
        "constant"
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
        if !self.dirty {
            return Ok(());
        }
        let data = self.build().map_err(|e| RpgmlError::node(ctx.node_name(), e))?;
        ctx.publish(0, data)?;
        self.dirty = false;
        Ok(())
    }
}
