//! Runtime loop.
//!
//! Each pass:
//! 1. Execute the graph once on the worker pool.
//! 2. Every `gc_interval` passes, run the collector.
//! 3. Stop on an exit request, the pass limit, or a fatal error.

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::gc::{CollectStats, CountPtr, GarbageCollector};
use crate::pipeline::frame::Frame;
use crate::pipeline::graph::{Graph, PassReport};
use crate::pipeline::thread_pool::ThreadPool;
use std::sync::Arc;
use std::time::Instant;

/// Totals of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Passes executed, including the one that requested exit.
    pub passes: u64,
    /// True if a node asked the run to end.
    pub exit_requested: bool,
    /// Objects reclaimed by the collector over the whole run.
    pub collected: usize,
    /// Node ticks that failed over the whole run.
    pub failed_ticks: usize,
}

pub struct Runtime {
    config: RuntimeConfig,
    graph: Graph,
    frame: Option<CountPtr<Frame>>,
    gc: Arc<GarbageCollector>,
    pool: ThreadPool,
    passes: u64,
    collected: usize,
    failed_ticks: usize,
}

impl Runtime {
    /// Validate `config` and start the worker pool.
    pub fn new(
        config: RuntimeConfig,
        graph: Graph,
        frame: Option<CountPtr<Frame>>,
        gc: Arc<GarbageCollector>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = ThreadPool::new(config.threads)?;
        Ok(Self {
            config,
            graph,
            frame,
            gc,
            pool,
            passes: 0,
            collected: 0,
            failed_ticks: 0,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn frame(&self) -> Option<&CountPtr<Frame>> {
        self.frame.as_ref()
    }

    pub fn gc(&self) -> &Arc<GarbageCollector> {
        &self.gc
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Execute one pass. An exit request comes back as
    /// [`RpgmlError::ExitRequest`].
    pub fn step(&mut self) -> Result<PassReport> {
        self.passes += 1;
        let result = self.graph.execute(self.pool.queue());
        if let Ok(report) = &result {
            self.failed_ticks += report.failed;
        }

        if self.config.gc_interval > 0 && self.passes % self.config.gc_interval == 0 {
            self.collected += self.gc.run().collected;
        }
        result
    }

    /// Loop passes until exit, the pass limit, or a fatal error.
    pub fn run(&mut self) -> Result<RunSummary> {
        let started = Instant::now();
        tracing::info!(
            "Run started: {} nodes, {} workers",
            self.graph.len(),
            self.pool.size()
        );

        let mut exit_requested = false;
        loop {
            if self
                .config
                .max_passes
                .is_some_and(|limit| self.passes >= limit)
            {
                break;
            }
            match self.step() {
                Ok(_) => {}
                Err(e) if e.is_exit_request() => {
                    exit_requested = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let summary = RunSummary {
            passes: self.passes,
            exit_requested,
            collected: self.collected,
            failed_ticks: self.failed_ticks,
        };
        tracing::info!(
            "Run stopped after {} passes in {:?} (exit requested: {})",
            summary.passes,
            started.elapsed(),
            summary.exit_requested
        );
        Ok(summary)
    }

    /// Stop the workers and release the graph, then collect what is left.
    pub fn shutdown(self) -> CollectStats {
        let Runtime {
            pool,
            graph,
            frame,
            gc,
            ..
        } = self;
        pool.shutdown();
        drop(graph);
        drop(frame);
        let stats = gc.run();
        let survivors = stats.tracked - stats.collected;
        if survivors > 0 {
            tracing::debug!("{} objects still held outside the runtime", survivors);
        }
        stats
    }
}
