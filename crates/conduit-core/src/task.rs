//! Background work for the predict phase.
//!
//! [`WorkerPool`] submits a batch of items as chunked parallel work and hands
//! back a [`TaskHandle`] the caller joins later. Every item runs under
//! `catch_unwind`: a panicking item is logged and dropped from the results
//! instead of tearing down the rest of its chunk.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use rayon::prelude::*;
use tracing::error;

use crate::config::{ExecutionMode, NetworkConfig};

/// Result of a submitted batch. Must be joined before the inputs it was
/// computed from are replaced.
#[derive(Debug)]
pub enum TaskHandle<R> {
    /// Already computed (inline execution, or an empty batch).
    Ready(Vec<R>),
    /// Running on the pool.
    Pending(Receiver<Vec<R>>),
}

impl<R> TaskHandle<R> {
    /// Block until the batch finishes and return its results.
    pub fn join(self) -> Vec<R> {
        match self {
            TaskHandle::Ready(results) => results,
            TaskHandle::Pending(rx) => rx.recv().unwrap_or_else(|_| {
                error!("background task exited without reporting results");
                Vec::new()
            }),
        }
    }

    /// Whether results can be taken without blocking.
    pub fn is_ready(&self) -> bool {
        matches!(self, TaskHandle::Ready(_))
    }
}

/// Chunked parallel executor, inline or backed by a rayon pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    pool: Option<Arc<rayon::ThreadPool>>,
    chunk_size: usize,
}

impl WorkerPool {
    /// Build the executor described by `config`. Falls back to inline
    /// execution if the thread pool cannot be created.
    pub fn from_config(config: &NetworkConfig) -> Self {
        let chunk_size = config.predict_chunk_size.max(1);
        if config.execution == ExecutionMode::Inline {
            return Self::inline(chunk_size);
        }

        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("conduit-predict-{i}"));
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        match builder.build() {
            Ok(pool) => Self {
                pool: Some(Arc::new(pool)),
                chunk_size,
            },
            Err(err) => {
                error!(%err, "failed to build predict thread pool, running inline");
                Self::inline(chunk_size)
            }
        }
    }

    pub fn inline(chunk_size: usize) -> Self {
        Self {
            pool: None,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.pool.is_none()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run `f` over every item, `chunk_size` items per work unit. Items whose
    /// `f` panics are logged and omitted; the order of results follows the
    /// order of `items`.
    pub fn submit_chunked<T, R, F>(&self, items: Vec<T>, f: F) -> TaskHandle<R>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        if items.is_empty() {
            return TaskHandle::Ready(Vec::new());
        }
        let chunk_size = self.chunk_size;
        let Some(pool) = &self.pool else {
            let results = items
                .chunks(chunk_size)
                .flat_map(|chunk| chunk.iter().filter_map(|item| run_guarded(&f, item)))
                .collect();
            return TaskHandle::Ready(results);
        };

        let (tx, rx) = mpsc::channel();
        // Parallel iterators started from a pool job stay on that pool.
        pool.spawn(move || {
            let results: Vec<R> = items
                .par_chunks(chunk_size)
                .flat_map_iter(|chunk| chunk.iter().filter_map(|item| run_guarded(&f, item)))
                .collect();
            // The receiver may be gone if the owner was dropped without joining.
            let _ = tx.send(results);
        });
        TaskHandle::Pending(rx)
    }
}

fn run_guarded<T, R, F>(f: &F, item: &T) -> Option<R>
where
    F: Fn(&T) -> R,
{
    match panic::catch_unwind(AssertUnwindSafe(|| f(item))) {
        Ok(result) => Some(result),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic>".to_string());
            error!(%message, "work item panicked, result dropped");
            None
        }
    }
}
