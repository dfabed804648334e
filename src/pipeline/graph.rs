//! Dependency graph scheduler.
//!
//! The graph owns one [`GraphNode`] per registered node plus a synthetic
//! end node that every sink feeds. A pass works by DAG relaxation:
//!
//! 1. Every graph node's remaining-predecessor counter is reset.
//! 2. Nodes without predecessors are queued.
//! 3. A worker ticks a node, then decrements each successor's counter and
//!    queues the ones that reach zero.
//! 4. The pass ends when the end node runs, which happens exactly once after
//!    every path has been relaxed.
//!
//! Queue priority is a node's longest path to the end node, so long chains
//! start early. It never affects which nodes run, only when.
//!
//! The execution plan is compiled lazily and cached until the set of nodes
//! changes or [`Graph::invalidate`] is called after rewiring.

use crate::error::{Result, RpgmlError};
use crate::gc::{CountPtr, GarbageCollector};
use crate::pipeline::id::NodeId;
use crate::pipeline::job_queue::{Job, JobOutcome, JobQueue};
use crate::pipeline::node::NodeHandle;
use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// State shared by all graph nodes for the pass in flight.
struct PassState {
    gc: Arc<GarbageCollector>,
    queue: Mutex<Option<Arc<JobQueue>>>,
    pass: AtomicU64,
    exit: AtomicBool,
    ticked: AtomicUsize,
    failed: AtomicUsize,
    done: Sender<()>,
}

impl PassState {
    fn enqueue(&self, job: Arc<GraphNode>) {
        let queue = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match queue {
            Some(queue) => queue.add_job(job),
            None => tracing::error!("Graph node became ready outside of a pass"),
        }
    }
}

/// Scheduling wrapper around one node, or around nothing for the end node.
pub struct GraphNode {
    id: NodeId,
    node: Option<NodeHandle>,
    priority: i64,
    predecessors: usize,
    remaining: AtomicUsize,
    successors: Vec<Arc<GraphNode>>,
    state: Arc<PassState>,
}

impl GraphNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> Option<&NodeHandle> {
        self.node.as_ref()
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn predecessor_count(&self) -> usize {
        self.predecessors
    }

    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Tick the wrapped node. Failures are logged and never propagate.
    fn doit(&self, node: &NodeHandle) {
        let state = &self.state;
        let pass = state.pass.load(Ordering::Acquire);
        let _mutator = state.gc.enter();

        match panic::catch_unwind(AssertUnwindSafe(|| node.tick(pass))) {
            Ok(Ok(())) => {
                state.ticked.fetch_add(1, Ordering::AcqRel);
            }
            Ok(Err(e)) if e.is_exit_request() => {
                tracing::info!("Node '{}' requested exit", node.name());
                state.ticked.fetch_add(1, Ordering::AcqRel);
                state.exit.store(true, Ordering::Release);
            }
            Ok(Err(e)) => {
                tracing::error!(
                    "Node '{}' ({}) failed in pass {}: {}",
                    node.name(),
                    node.type_name(),
                    pass,
                    e
                );
                state.failed.fetch_add(1, Ordering::AcqRel);
            }
            Err(payload) => {
                tracing::error!(
                    "Node '{}' ({}) panicked in pass {}: {}",
                    node.name(),
                    node.type_name(),
                    pass,
                    panic_message(payload.as_ref())
                );
                node.reset_changed();
                state.failed.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    fn relax(&self) {
        for succ in &self.successors {
            if succ.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                self.state.enqueue(succ.clone());
            }
        }
    }
}

impl Job for GraphNode {
    fn priority(&self) -> i64 {
        self.priority
    }

    fn run(&self) -> JobOutcome {
        match &self.node {
            Some(node) => {
                // After an exit request the rest of the pass is relaxed
                // without ticking so the end node is still reached.
                if !self.state.exit.load(Ordering::Acquire) {
                    self.doit(node);
                }
                self.relax();
            }
            None => {
                if self.state.done.try_send(()).is_err() {
                    tracing::error!("End node reached twice in one pass");
                }
            }
        }
        JobOutcome::Continue
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Compiled execution plan.
struct Plan {
    nodes: Vec<Arc<GraphNode>>,
    end: Arc<GraphNode>,
    order: Vec<NodeId>,
    generation: u64,
}

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pass: u64,
    pub ticked: usize,
    pub failed: usize,
}

pub struct Graph {
    nodes: Vec<NodeHandle>,
    index: HashMap<usize, NodeId>,
    plan: Option<Plan>,
    generation: u64,
    state: Arc<PassState>,
    done: Receiver<()>,
}

impl Graph {
    pub fn new(gc: Arc<GarbageCollector>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            plan: None,
            generation: 0,
            state: Arc::new(PassState {
                gc,
                queue: Mutex::new(None),
                pass: AtomicU64::new(0),
                exit: AtomicBool::new(false),
                ticked: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
                done: tx,
            }),
            done: rx,
        }
    }

    // ── Graph building ──

    /// Register `node` and, transitively, every node feeding it.
    /// Registering a node twice is a no-op.
    pub fn add_node(&mut self, node: &NodeHandle) -> NodeId {
        let mut pending = vec![node.clone()];
        while let Some(next) = pending.pop() {
            if self.index.contains_key(&CountPtr::addr(&next)) {
                continue;
            }
            pending.extend(next.predecessors());
            self.register(next);
        }
        self.id_of(node).unwrap_or(NodeId::INVALID)
    }

    fn register(&mut self, node: NodeHandle) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.index.insert(CountPtr::addr(&node), id);
        self.nodes.push(node);
        self.invalidate();
        id
    }

    /// Drop the cached plan; call after rewiring registered nodes.
    pub fn invalidate(&mut self) {
        self.plan = None;
        self.generation += 1;
    }

    pub fn id_of(&self, node: &NodeHandle) -> Option<NodeId> {
        self.index.get(&CountPtr::addr(node)).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeHandle> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of passes executed so far.
    pub fn passes(&self) -> u64 {
        self.state.pass.load(Ordering::Acquire)
    }

    // ── Planning ──

    /// Topological order of the current plan, compiling it if needed.
    pub fn order(&mut self) -> Result<Vec<NodeId>> {
        Ok(self.determine_order()?.order.clone())
    }

    /// Scheduling priority of `id` in the current plan.
    pub fn priority(&mut self, id: NodeId) -> Result<Option<i64>> {
        let plan = self.determine_order()?;
        Ok(plan.nodes.get(id.index()).map(|g| g.priority))
    }

    fn determine_order(&mut self) -> Result<&Plan> {
        let stale = self
            .plan
            .as_ref()
            .map_or(true, |p| p.generation != self.generation);
        if stale {
            // Inputs may have been wired to nodes that were never added.
            let mut i = 0;
            while i < self.nodes.len() {
                for pred in self.nodes[i].predecessors() {
                    if self.id_of(&pred).is_none() {
                        self.add_node(&pred);
                    }
                }
                i += 1;
            }
            let plan = self.compile()?;
            tracing::info!(
                "Graph compiled: {} nodes (gen {})",
                plan.nodes.len(),
                plan.generation
            );
            self.plan = Some(plan);
        }
        self.plan
            .as_ref()
            .ok_or_else(|| RpgmlError::Thread("graph plan missing after compile".to_string()))
    }

    fn compile(&self) -> Result<Plan> {
        let n = self.nodes.len();
        let mut succ: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        let mut seen = HashSet::new();

        for (to, node) in self.nodes.iter().enumerate() {
            for pred in node.predecessors() {
                let Some(from) = self.id_of(&pred).map(NodeId::index) else {
                    continue;
                };
                if seen.insert((from, to)) {
                    succ[from].push(to);
                    in_degree[to] += 1;
                }
            }
        }

        // Kahn's algorithm
        let mut remaining = in_degree.clone();
        let mut ready: Vec<usize> = (0..n).rev().filter(|&i| remaining[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop() {
            order.push(i);
            for &j in succ[i].iter().rev() {
                remaining[j] -= 1;
                if remaining[j] == 0 {
                    ready.push(j);
                }
            }
        }
        if order.len() != n {
            tracing::warn!(
                "Node graph has a cycle: only {} of {} nodes can be ordered",
                order.len(),
                n
            );
            return Err(RpgmlError::CycleDetected);
        }

        // Longest path to the end node, which has priority 0.
        let mut priority = vec![0i64; n];
        for &i in order.iter().rev() {
            priority[i] = 1 + succ[i].iter().map(|&j| priority[j]).max().unwrap_or(0);
        }

        let sinks = succ.iter().filter(|s| s.is_empty()).count();
        let end = Arc::new(GraphNode {
            id: NodeId::INVALID,
            node: None,
            priority: 0,
            predecessors: sinks,
            remaining: AtomicUsize::new(sinks),
            successors: Vec::new(),
            state: self.state.clone(),
        });

        let mut built: Vec<Option<Arc<GraphNode>>> = vec![None; n];
        for &i in order.iter().rev() {
            let successors = if succ[i].is_empty() {
                vec![end.clone()]
            } else {
                succ[i].iter().filter_map(|&j| built[j].clone()).collect()
            };
            built[i] = Some(Arc::new(GraphNode {
                id: NodeId(i as u32),
                node: Some(self.nodes[i].clone()),
                priority: priority[i],
                predecessors: in_degree[i],
                remaining: AtomicUsize::new(in_degree[i]),
                successors,
                state: self.state.clone(),
            }));
        }

        Ok(Plan {
            nodes: built.into_iter().flatten().collect(),
            end,
            order: order.into_iter().map(|i| NodeId(i as u32)).collect(),
            generation: self.generation,
        })
    }

    // ── Execution ──

    /// Run one pass: tick every registered node exactly once, in dependency
    /// order, on the workers draining `queue`. Blocks until the pass ends.
    ///
    /// Per-node failures are logged and counted in the report. A node asking
    /// to exit makes the pass return [`RpgmlError::ExitRequest`].
    pub fn execute(&mut self, queue: &Arc<JobQueue>) -> Result<PassReport> {
        self.determine_order()?;
        let Some(plan) = self.plan.as_ref() else {
            return Err(RpgmlError::Thread("graph plan missing".to_string()));
        };

        let state = &self.state;
        let pass = state.pass.fetch_add(1, Ordering::AcqRel) + 1;
        state.exit.store(false, Ordering::Release);
        state.ticked.store(0, Ordering::Release);
        state.failed.store(0, Ordering::Release);
        *state.queue.lock().unwrap_or_else(PoisonError::into_inner) = Some(queue.clone());

        for g in plan.nodes.iter().chain(std::iter::once(&plan.end)) {
            g.remaining.store(g.predecessors, Ordering::Release);
        }
        for g in plan.nodes.iter().chain(std::iter::once(&plan.end)) {
            if g.predecessors == 0 {
                queue.add_job(g.clone());
            }
        }

        let finished = self.done.recv();
        *state.queue.lock().unwrap_or_else(PoisonError::into_inner) = None;
        finished.map_err(|_| RpgmlError::Thread("end node signal lost".to_string()))?;

        let report = PassReport {
            pass,
            ticked: state.ticked.load(Ordering::Acquire),
            failed: state.failed.load(Ordering::Acquire),
        };
        tracing::debug!(
            "Pass {} complete: {} ticked, {} failed",
            report.pass,
            report.ticked,
            report.failed
        );

        if state.exit.load(Ordering::Acquire) {
            return Err(RpgmlError::ExitRequest);
        }
        Ok(report)
    }
}
