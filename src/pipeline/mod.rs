//! Node-based dataflow pipeline.
//!
//! Nodes publish arrays on outputs; inputs read whatever the connected output
//! currently holds. One pass of the [`Graph`] ticks every node exactly once, in
//! dependency order, on a [`ThreadPool`] draining a priority [`JobQueue`].
//!
//! # Architecture
//!
//! ```text
//! [Constant a] ──► in1 ┐
//!                      [Add] ──► [Print]
//! [Constant b] ──► in2 ┘
//! ```
//!
//! # Design
//!
//! - **Static descriptors**: each node type declares `PortDescriptor` and
//!   `ParamSpec` tables; `NodeCell` turns them into live ports.
//! - **DAG relaxation**: a node is queued when its last predecessor finishes,
//!   so independent branches run concurrently.
//! - **Changed flags**: outputs carry a per-pass changed flag so nodes can skip
//!   recomputation when none of their inputs changed.
//! - **Cycle collection**: ports and nodes are tracked by the
//!   [`GarbageCollector`](crate::gc::GarbageCollector); ticks hold a mutator
//!   guard so collection never observes a half-updated graph.

pub mod executor;
pub mod frame;
pub mod graph;
pub mod id;
pub mod job_queue;
pub mod loader;
pub mod node;
pub mod node_type;
pub mod nodes;
pub mod param;
pub mod port;
pub mod sync;
pub mod thread_pool;

pub use executor::{RunSummary, Runtime};
pub use frame::{Binding, Frame};
pub use graph::{Graph, GraphNode, PassReport};
pub use id::NodeId;
pub use job_queue::{EndJob, Job, JobOutcome, JobQueue, JobRef};
pub use loader::{load_graph, load_path, load_str, toml_to_value, LoadedGraph};
pub use node::{Node, NodeCell, NodeHandle, TickContext};
pub use node_type::{NodeFactory, NodeType};
pub use param::ParamSpec;
pub use port::{Input, Output, PortDescriptor, PortDirection};
pub use sync::Semaphore;
pub use thread_pool::ThreadPool;
