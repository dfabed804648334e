//! CounterNode: counts its own ticks and can end the run.

use crate::array::ArrayBase;
use crate::error::{Result, RpgmlError};
use crate::pipeline::node::{Node, TickContext};
use crate::pipeline::param::{self, expect_int, ParamSpec};
use crate::pipeline::port::PortDescriptor;
use crate::types::{Type, Value};

static PORTS: &[PortDescriptor] = &[PortDescriptor::typed_output("out", Type::U64, 0)];

static PARAMS: &[ParamSpec<CounterNode>] = &[ParamSpec::scalar("limit", set_limit)];

#[derive(Debug, Default)]
pub struct CounterNode {
    count: u64,
    /// Request exit once `count` reaches this value.
    limit: Option<u64>,
}

impl CounterNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: u64) -> Self {
        Self {
            count: 0,
            limit: Some(limit),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

fn set_limit(node: &mut CounterNode, _: Option<usize>, value: &Value) -> Result<()> {
    if value.is_nil() {
        node.limit = None;
        return Ok(());
    }
    let limit = expect_int(value)?;
    node.limit = Some(u64::try_from(limit).map_err(|_| RpgmlError::Conversion {
        value: value.to_string(),
        target: Type::U64,
    })?);
    Ok(())
}

impl Node for CounterNode {
    fn type_name(&self) -> &'static str {
        "counter"
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
        self.count += 1;
        ctx.publish(0, ArrayBase::scalar(&Value::U64(self.count))?)?;
        if self.limit.is_some_and(|limit| self.count >= limit) {
            return Err(RpgmlError::ExitRequest);
        }
        Ok(())
    }
}
