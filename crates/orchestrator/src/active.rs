//! In-process registry of cancellable background jobs.
//!
//! One [`CancellationToken`] per active multi-slice job, all children of a
//! master token so shutdown cancels every running batch at once. Tokens
//! are advisory: the batch loop observes them at iteration boundaries.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Cancellation tokens for running batch jobs, keyed by job id.
pub struct ActiveJobs {
    tokens: RwLock<HashMap<String, CancellationToken>>,
    /// Master token, cancelled during shutdown.
    root: CancellationToken,
}

impl Default for ActiveJobs {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveJobs {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            root: CancellationToken::new(),
        }
    }

    /// Register a job and return its token.
    pub async fn register(&self, job_id: &str) -> CancellationToken {
        let token = self.root.child_token();
        self.tokens
            .write()
            .await
            .insert(job_id.to_string(), token.clone());
        token
    }

    /// Drop a finished job's token.
    pub async fn remove(&self, job_id: &str) {
        self.tokens.write().await.remove(job_id);
    }

    /// Cancel one job. Returns false when the job has no registered
    /// token (already finished, or never a background job).
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.tokens.read().await.get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of currently registered jobs.
    pub async fn count(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Cancel every registered job. Used during graceful shutdown.
    pub fn shutdown(&self) {
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_cancel() {
        let active = ActiveJobs::new();
        let token = active.register("AI-1").await;
        assert!(!token.is_cancelled());
        assert!(active.cancel("AI-1").await);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_unknown_job_returns_false() {
        let active = ActiveJobs::new();
        assert!(!active.cancel("AI-missing").await);
    }

    #[tokio::test]
    async fn remove_drops_token() {
        let active = ActiveJobs::new();
        active.register("AI-1").await;
        assert_eq!(active.count().await, 1);
        active.remove("AI-1").await;
        assert_eq!(active.count().await, 0);
        assert!(!active.cancel("AI-1").await);
    }

    #[tokio::test]
    async fn shutdown_cancels_all() {
        let active = ActiveJobs::new();
        let a = active.register("AI-1").await;
        let b = active.register("AI-2").await;
        active.shutdown();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
