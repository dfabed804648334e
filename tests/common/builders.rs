//! Test nodes and graph builders

use rpgml::gc::GarbageCollector;
use rpgml::pipeline::{Input, Node, NodeCell, NodeFactory, NodeHandle, NodeType, PortDescriptor, TickContext};
use rpgml::{ArrayBase, Result, RpgmlError, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

static RECORDER_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("a"),
    PortDescriptor::input("b"),
    PortDescriptor::output("out"),
];

/// Shared log of `(pass, node name)` in tick order
pub type TickLog = Arc<Mutex<Vec<(u64, String)>>>;

pub fn tick_log() -> TickLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Counts ticks in flight and remembers the highest count seen
#[derive(Debug, Default)]
pub struct Overlap {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Overlap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// What a recording node does besides logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
    Exit,
}

/// Logs every tick and publishes the pass number
pub struct RecordingNode {
    log: TickLog,
    behavior: Behavior,
    delay: Duration,
    overlap: Option<Arc<Overlap>>,
}

impl Node for RecordingNode {
    fn type_name(&self) -> &'static str {
        "recorder"
    }

    fn ports(&self) -> &'static [PortDescriptor] {
        RECORDER_PORTS
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<()> {
        if let Some(overlap) = &self.overlap {
            overlap.enter();
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if let Some(overlap) = &self.overlap {
            overlap.leave();
        }
        self.log
            .lock()
            .unwrap()
            .push((ctx.pass(), ctx.node_name().to_string()));
        ctx.publish(0, ArrayBase::scalar(&Value::U64(ctx.pass()))?)?;
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(RpgmlError::node(ctx.node_name(), "scripted failure")),
            Behavior::Panic => panic!("scripted panic in {}", ctx.node_name()),
            Behavior::Exit => Err(RpgmlError::ExitRequest),
        }
    }
}

/// Builder for recording test nodes
pub struct RecorderBuilder {
    name: String,
    log: TickLog,
    behavior: Behavior,
    delay: Duration,
    overlap: Option<Arc<Overlap>>,
    gc: Option<Arc<GarbageCollector>>,
}

impl RecorderBuilder {
    pub fn new(name: &str, log: &TickLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            behavior: Behavior::Succeed,
            delay: Duration::ZERO,
            overlap: None,
            gc: None,
        }
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn overlap(mut self, overlap: &Arc<Overlap>) -> Self {
        self.overlap = Some(overlap.clone());
        self
    }

    pub fn gc(mut self, gc: &Arc<GarbageCollector>) -> Self {
        self.gc = Some(gc.clone());
        self
    }

    pub fn build(self) -> NodeHandle {
        let node = RecordingNode {
            log: self.log,
            behavior: self.behavior,
            delay: self.delay,
            overlap: self.overlap,
        };
        NodeCell::create(self.name, Box::new(node), self.gc.as_ref()).unwrap()
    }
}

/// Connect `from.out` to `to.<input>`
pub fn wire(from: &NodeHandle, output: &str, to: &NodeHandle, input: &str) {
    Input::connect(&to.input(input).unwrap(), &from.output(output).unwrap()).unwrap();
}

/// Builtin constant node holding `value`
pub fn constant(name: &str, value: impl Into<Value>, gc: &Arc<GarbageCollector>) -> NodeHandle {
    let node = NodeFactory::create(NodeType::Constant, name, Some(gc)).unwrap();
    node.set_param("value", None, &value.into()).unwrap();
    node
}

/// Position of the first tick of `name` in pass `pass`
pub fn position(log: &[(u64, String)], pass: u64, name: &str) -> usize {
    log.iter()
        .position(|(p, n)| *p == pass && n == name)
        .unwrap_or_else(|| panic!("{} did not tick in pass {}", name, pass))
}
