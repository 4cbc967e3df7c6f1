// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Serialization queue: a total order over hierarchy-mutating jobs.
//!
//! A job runs on the serializer's context and hands back a [`Confirmation`].
//! The next job does not start until that confirmation resolves, so at most one
//! hierarchy mutation is ever in flight, across every thread that submits.

use std::sync::{Arc, mpsc};
use std::thread;

use futures::FutureExt;
use futures::executor::block_on;
use tracing::{debug, trace, warn};

use crate::error::QueueError;
use crate::platform::{Confirmation, Confirmed, confirmation};

/// A unit of serialized work.
pub type Job = Box<dyn FnOnce() -> Confirmation + Send>;

/// Something that runs [`Job`]s one at a time, in submission order.
pub trait Serializer: Send + Sync + 'static {
    /// Enqueue `job`. Never blocks on the job itself.
    fn submit(&self, job: Job);

    /// Resolves once every job submitted before this call has been confirmed.
    fn barrier(&self) -> Confirmation {
        let (reached, barrier) = confirmation();
        self.submit(Box::new(move || {
            reached.complete();
            Confirmation::done()
        }));
        barrier
    }
}

/// Configuration for [`WorkerQueue::spawn`].
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Name of the worker thread.
    pub thread_name: String,
    /// Stack size of the worker thread; the platform default when `None`.
    pub stack_size: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: "understory-presenter".to_owned(),
            stack_size: None,
        }
    }
}

/// A single dedicated worker thread.
///
/// Each job runs on the worker, which then blocks until the job's confirmation
/// resolves. The thread exits once every handle to the queue has been dropped.
#[derive(Debug)]
pub struct WorkerQueue {
    jobs: mpsc::Sender<Job>,
    name: String,
}

impl WorkerQueue {
    /// Start the worker thread.
    pub fn spawn(config: WorkerConfig) -> Result<Self, QueueError> {
        let (jobs, rx) = mpsc::channel::<Job>();
        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }
        let worker_name = config.thread_name.clone();
        builder
            .spawn(move || run_worker(&worker_name, rx))
            .map_err(|source| QueueError::Spawn {
                name: config.thread_name.clone(),
                source,
            })?;
        debug!(name = %config.thread_name, "presentation worker started");
        Ok(Self {
            jobs,
            name: config.thread_name,
        })
    }

    /// Name of the worker thread.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Serializer for WorkerQueue {
    fn submit(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            warn!(name = %self.name, "presentation worker is gone; job dropped");
        }
    }
}

fn run_worker(name: &str, rx: mpsc::Receiver<Job>) {
    for (n, job) in rx.into_iter().enumerate() {
        trace!(worker = name, job = n, "job started");
        let confirmation = job();
        match block_on(confirmation) {
            Confirmed::Completed => trace!(worker = name, job = n, "job confirmed"),
            Confirmed::Dropped => {
                warn!(worker = name, job = n, "job completion dropped without firing");
            }
        }
    }
    debug!(worker = name, "presentation worker exiting");
}

/// Runs each job on the submitting thread.
///
/// Only suitable for platforms whose UI context runs jobs inline and whose
/// transitions complete synchronously: a confirmation that is still pending
/// when the job returns cannot be waited on here (the caller may itself be
/// inside an executor) and is abandoned with a warning.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineQueue;

impl Serializer for InlineQueue {
    fn submit(&self, job: Job) {
        match job().now_or_never() {
            Some(Confirmed::Completed) => {}
            Some(Confirmed::Dropped) => warn!("inline job completion dropped without firing"),
            None => warn!("inline job not confirmed synchronously; continuing without it"),
        }
    }
}

/// Convenience constructor for a shared worker queue.
pub fn spawn_worker(config: WorkerConfig) -> Result<Arc<dyn Serializer>, QueueError> {
    Ok(Arc::new(WorkerQueue::spawn(config)?))
}
