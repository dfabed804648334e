//! Built-in node implementations.

pub mod arithmetic;
pub mod constant;
pub mod counter;
pub mod print;
pub mod transform;

pub use arithmetic::{ArithOp, ArithmeticNode};
pub use constant::ConstantNode;
pub use counter::CounterNode;
pub use print::PrintNode;
pub use transform::TransformNode;
