//! Thread-safe priority queue of jobs.
//!
//! Jobs are popped highest priority first; equal priorities pop in push
//! order. A counting semaphore tracks how many jobs are available so
//! `get_job` can block without spinning.

use crate::pipeline::sync::Semaphore;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// What a worker does after running a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Keep pulling jobs.
    Continue,
    /// Leave the worker loop.
    Exit,
}

/// A unit of work for the thread pool.
pub trait Job: Send + Sync {
    fn priority(&self) -> i64;

    fn run(&self) -> JobOutcome;
}

pub type JobRef = Arc<dyn Job>;

/// Sentinel telling the worker that dequeues it to exit.
#[derive(Debug, Default)]
pub struct EndJob;

impl Job for EndJob {
    fn priority(&self) -> i64 {
        i64::MIN
    }

    fn run(&self) -> JobOutcome {
        JobOutcome::Exit
    }
}

struct Entry {
    priority: i64,
    seq: u64,
    job: JobRef,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Heap {
    entries: BinaryHeap<Entry>,
    next_seq: u64,
}

#[derive(Default)]
pub struct JobQueue {
    heap: Mutex<Heap>,
    available: Semaphore,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job(&self, job: JobRef) {
        {
            let mut heap = self.heap.lock().unwrap_or_else(PoisonError::into_inner);
            let seq = heap.next_seq;
            heap.next_seq += 1;
            heap.entries.push(Entry {
                priority: job.priority(),
                seq,
                job,
            });
        }
        self.available.post();
    }

    fn pop(&self) -> Option<JobRef> {
        self.heap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .pop()
            .map(|e| e.job)
    }

    /// Block until a job is available and pop the highest priority one.
    pub fn get_job(&self) -> JobRef {
        loop {
            self.available.wait();
            // Every post follows a push, so a successful wait implies a job.
            if let Some(job) = self.pop() {
                return job;
            }
        }
    }

    /// Pop without blocking.
    pub fn try_get_job(&self) -> Option<JobRef> {
        if self.available.try_wait() {
            self.pop()
        } else {
            None
        }
    }

    pub fn get_job_timeout(&self, timeout: Duration) -> Option<JobRef> {
        if self.available.wait_timeout(timeout) {
            self.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.heap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
