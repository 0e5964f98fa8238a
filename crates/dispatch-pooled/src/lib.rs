//! Rayon-backed [`Dispatch`] for running nodes.
//!
//! Votes and bulk evidence get separate pools. A burst of bundles or large
//! proposals can then never delay the single-vote checks that decide whether
//! a step completes before its deadline.
//!
//! ```no_run
//! use concord_dispatch_pooled::{PoolSizes, PooledDispatch};
//!
//! let dispatch = PooledDispatch::new(PoolSizes::detect()).unwrap();
//! let small = PooledDispatch::new(PoolSizes::fixed(1, 2)).unwrap();
//! ```

use concord_dispatch::Dispatch;
use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("{pool} pool needs at least one thread")]
    NoThreads { pool: &'static str },

    #[error("stack size {0} is below 64KiB")]
    StackTooSmall(usize),

    #[error("failed to start {pool} pool: {source}")]
    Build {
        pool: &'static str,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// Thread counts for the two verification pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizes {
    /// Threads checking single agreement votes.
    pub vote_threads: usize,
    /// Threads checking bundles and proposal payloads.
    pub bulk_threads: usize,
    pub stack_size: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self::detect()
    }
}

impl PoolSizes {
    /// Size the pools from the machine's available parallelism.
    pub fn detect() -> Self {
        let cores = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(4);
        Self::for_cores(cores)
    }

    /// One core stays with the node loop. A third of the remainder, between
    /// one and four threads, checks votes; the rest check bulk evidence.
    pub fn for_cores(cores: usize) -> Self {
        let spare = cores.saturating_sub(1).max(2);
        let vote_threads = (spare / 3).clamp(1, 4);
        Self {
            vote_threads,
            bulk_threads: (spare - vote_threads).max(1),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub fn fixed(vote_threads: usize, bulk_threads: usize) -> Self {
        Self {
            vote_threads,
            bulk_threads,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.vote_threads == 0 {
            return Err(PoolError::NoThreads { pool: "vote" });
        }
        if self.bulk_threads == 0 {
            return Err(PoolError::NoThreads { pool: "bulk" });
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(PoolError::StackTooSmall(self.stack_size));
        }
        Ok(())
    }
}

/// Two rayon pools behind the [`Dispatch`] trait. Clones share the pools.
#[derive(Clone)]
pub struct PooledDispatch {
    sizes: PoolSizes,
    votes: Arc<rayon::ThreadPool>,
    bulk: Arc<rayon::ThreadPool>,
}

impl std::fmt::Debug for PooledDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledDispatch")
            .field("sizes", &self.sizes)
            .finish_non_exhaustive()
    }
}

impl PooledDispatch {
    pub fn new(sizes: PoolSizes) -> Result<Self, PoolError> {
        sizes.validate()?;
        let votes = start_pool("vote", sizes.vote_threads, sizes.stack_size)?;
        let bulk = start_pool("bulk", sizes.bulk_threads, sizes.stack_size)?;
        info!(
            vote_threads = sizes.vote_threads,
            bulk_threads = sizes.bulk_threads,
            "Verification pools started"
        );
        Ok(Self {
            sizes,
            votes: Arc::new(votes),
            bulk: Arc::new(bulk),
        })
    }

    pub fn sizes(&self) -> PoolSizes {
        self.sizes
    }
}

fn start_pool(
    pool: &'static str,
    threads: usize,
    stack_size: usize,
) -> Result<rayon::ThreadPool, PoolError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .stack_size(stack_size)
        .thread_name(move |i| format!("verify-{pool}-{i}"))
        .build()
        .map_err(|source| PoolError::Build { pool, source })
}

/// Run `f` on `pool` with the pool installed, so nested parallel iterators
/// stay on it.
fn spawn_installed(pool: &Arc<rayon::ThreadPool>, f: impl FnOnce() + Send + 'static) {
    let installed = Arc::clone(pool);
    pool.spawn(move || installed.install(f));
}

impl Dispatch for PooledDispatch {
    #[instrument(level = "trace", skip_all)]
    fn spawn_consensus_crypto(&self, f: impl FnOnce() + Send + 'static) {
        spawn_installed(&self.votes, f);
    }

    fn spawn_crypto(&self, f: impl FnOnce() + Send + 'static) {
        spawn_installed(&self.bulk, f);
    }

    fn map_crypto<T, R>(&self, items: &[T], f: impl Fn(&T) -> R + Send + Sync) -> Vec<R>
    where
        T: Sync,
        R: Send,
    {
        self.bulk.install(|| items.par_iter().map(f).collect())
    }
}
