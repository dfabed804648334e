//! Fixed-size worker pool draining one shared [`JobQueue`].

use crate::error::{Result, RpgmlError};
use crate::pipeline::job_queue::{EndJob, JobOutcome, JobQueue};
use std::sync::Arc;
use std::thread::JoinHandle;

pub struct ThreadPool {
    queue: Arc<JobQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `threads` workers on a fresh queue.
    pub fn new(threads: usize) -> Result<Self> {
        Self::with_queue(threads, Arc::new(JobQueue::new()))
    }

    pub fn with_queue(threads: usize, queue: Arc<JobQueue>) -> Result<Self> {
        if threads == 0 {
            return Err(RpgmlError::InvalidArgument(
                "thread pool needs at least one worker".to_string(),
            ));
        }

        let mut pool = Self {
            queue,
            workers: Vec::with_capacity(threads),
        };
        for i in 0..threads {
            let queue = pool.queue.clone();
            let handle = std::thread::Builder::new()
                .name(format!("rpgml-worker-{}", i))
                .spawn(move || worker_loop(&queue))
                .map_err(|e| RpgmlError::Thread(format!("failed to spawn worker {}: {}", i, e)))?;
            pool.workers.push(handle);
        }

        tracing::info!("Thread pool started with {} workers", threads);
        Ok(pool)
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stop every worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        for _ in 0..self.workers.len() {
            self.queue.add_job(Arc::new(EndJob));
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }
        tracing::info!("Thread pool stopped");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(queue: &JobQueue) {
    loop {
        let job = queue.get_job();
        if job.run() == JobOutcome::Exit {
            break;
        }
    }
}
