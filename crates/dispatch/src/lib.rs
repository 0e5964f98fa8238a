//! Dispatch trait for running verification work away from the agreement loop.
//!
//! The player never verifies signatures itself. It emits `VerifyVote`,
//! `VerifyBundle` and `VerifyPayload` actions and the node loop hands the
//! matching closure to a [`Dispatch`] implementation:
//!
//! - `SyncDispatch` (concord-dispatch-sync) runs closures inline, which keeps
//!   simulations deterministic.
//! - `PooledDispatch` (concord-dispatch-pooled) runs them on rayon pools.
//!
//! Two pools exist. The consensus pool carries single votes, whose latency
//! decides whether a step finishes before its deadline. The general crypto
//! pool carries bundles and proposal payloads, which are larger and can
//! queue.

/// Schedules fire-and-forget verification closures.
///
/// Results travel back through channels captured by the closures; the trait
/// itself never returns values from spawned work.
///
/// Implementations must make `rayon::par_iter()` inside a spawned closure run
/// on the pool the closure was spawned on, not the global rayon pool.
pub trait Dispatch: Send + Sync + Clone {
    /// Spawn a latency-critical task (single vote verification).
    fn spawn_consensus_crypto(&self, f: impl FnOnce() + Send + 'static);

    /// Spawn a bulk verification task (bundles, proposal payloads).
    fn spawn_crypto(&self, f: impl FnOnce() + Send + 'static);

    /// Map `f` over `items` on the crypto pool and collect in order.
    ///
    /// Blocks the caller. Used for checking every vote of a bundle.
    fn map_crypto<T, R>(&self, items: &[T], f: impl Fn(&T) -> R + Send + Sync) -> Vec<R>
    where
        T: Sync,
        R: Send;
}
