//! TransformNode: republishes its input through a geometric view.
//!
//! The published array aliases the input's storage. Transforms apply in a
//! fixed order: ROI, then sparse, then mirror, then rotate.

use crate::array::{ArrayBase, Coordinates, Size};
use crate::error::{Result, RpgmlError};
use crate::pipeline::node::{Node, TickContext};
use crate::pipeline::param::{self, expect_int, expect_usize, ParamSpec};
use crate::pipeline::port::PortDescriptor;
use crate::types::Value;

static PORTS: &[PortDescriptor] = &[PortDescriptor::input("in"), PortDescriptor::output("out")];

static PARAMS: &[ParamSpec<TransformNode>] = &[
    ParamSpec::scalar("mirror", set_mirror),
    ParamSpec::scalar("rotate", set_rotate),
    ParamSpec::indexed("sparse", set_sparse),
    ParamSpec::indexed("roi", set_roi),
];

#[derive(Debug, Default)]
pub struct TransformNode {
    mirror: Option<usize>,
    rotate: i32,
    /// `[dim, nth]` or `[dim, nth, offset]`
    sparse: Vec<usize>,
    /// `[pos..., size...]`
    roi: Vec<usize>,
    dirty: bool,
}

impl TransformNode {
    pub fn new() -> Self {
        Self {
            dirty: true,
            ..Self::default()
        }
    }

    /// Apply the configured geometry to a view of `input`.
    pub fn apply(&self, input: &ArrayBase) -> Result<ArrayBase> {
        let mut view = input.clone();

        if !self.roi.is_empty() {
            let dims = view.dims();
            if self.roi.len() != 2 * dims {
                return Err(RpgmlError::Dimension {
                    expected: 2 * dims,
                    actual: self.roi.len(),
                }
                .with_context("roi takes a position and a size per dimension"));
            }
            let pos = Coordinates::new(&self.roi[..dims])?;
            let size = Size::new(&self.roi[dims..])?;
            view = view.roi(&pos, &size)?;
        }

        match self.sparse.as_slice() {
            [] => {}
            [dim, nth] => view.set_sparse(*dim, *nth, 0)?,
            [dim, nth, offset] => view.set_sparse(*dim, *nth, *offset)?,
            other => {
                return Err(RpgmlError::InvalidArgument(format!(
                    "sparse takes [dim, nth] or [dim, nth, offset], got {} values",
                    other.len()
                )))
            }
        }

        if let Some(dim) = self.mirror {
            view.set_mirrored(dim)?;
        }
        if self.rotate != 0 {
            view.set_rotated(self.rotate)?;
        }
        Ok(view)
    }
}

fn set_indexed(list: &mut Vec<usize>, index: Option<usize>, value: &Value) -> Result<()> {
    let i = index.unwrap_or(0);
    let v = expect_usize(value)?;
    // Index 0 starts a new list.
    if i == 0 {
        list.clear();
    }
    if i > list.len() {
        return Err(RpgmlError::OutOfBounds(format!(
            "element {} set before element {}",
            i,
            list.len()
        )));
    }
    if i == list.len() {
        list.push(v);
    } else {
        list[i] = v;
    }
    Ok(())
}

fn set_mirror(node: &mut TransformNode, _: Option<usize>, value: &Value) -> Result<()> {
    node.mirror = if value.is_nil() {
        None
    } else {
        Some(expect_usize(value)?)
    };
    node.dirty = true;
    Ok(())
}

fn set_rotate(node: &mut TransformNode, _: Option<usize>, value: &Value) -> Result<()> {
    let turns = expect_int(value)?;
    if !(-3..=3).contains(&turns) {
        return Err(RpgmlError::InvalidArgument(format!(
            "rotate must be within -3..=3, got {}",
            turns
        )));
    }
    node.rotate = turns as i32;
    node.dirty = true;
    Ok(())
}

fn set_sparse(node: &mut TransformNode, index: Option<usize>, value: &Value) -> Result<()> {
    set_indexed(&mut node.sparse, index, value)?;
    node.dirty = true;
    Ok(())
}

fn set_roi(node: &mut TransformNode, index: Option<usize>, value: &Value) -> Result<()> {
    set_indexed(&mut node.roi, index, value)?;
    node.dirty = true;
    Ok(())
}

impl Node for TransformNode {
    fn type_name(&self) -> &'static str {
        "transform"
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
        let input = ctx.require_input(0)?;
        let view = self
            .apply(&input)
            .map_err(|e| RpgmlError::node(ctx.node_name(), e))?;
        ctx.publish(0, view)?;
        self.dirty = false;
        Ok(())
    }
}
