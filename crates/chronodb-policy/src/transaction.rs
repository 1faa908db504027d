//! Transaction boundaries around policy execution.
//!
//! A policy may be invoked from a background worker (no transaction open) or
//! from an interactive call inside the caller's transaction block. The scope
//! only commits or rolls back a transaction it started itself.

use chronodb_core::{CoreResult, TransactionControl};

/// Whether entering a scope also pins a read snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMode {
    None,
    /// Push an active snapshot, only when the scope opens the transaction.
    PushActive,
}

/// An entered transaction scope. Consume it with [`release`](Self::release)
/// or [`finish`](Self::finish) on every exit path.
#[must_use = "a transaction scope must be released"]
pub struct TransactionScope<'a> {
    session: &'a dyn TransactionControl,
    owned: bool,
    pushed_snapshot: bool,
}

impl<'a> TransactionScope<'a> {
    /// Opens a transaction unless one is already in progress.
    pub async fn enter(
        session: &'a dyn TransactionControl,
        mode: SnapshotMode,
    ) -> CoreResult<TransactionScope<'a>> {
        if session.is_in_transaction().await {
            return Ok(Self {
                session,
                owned: false,
                pushed_snapshot: false,
            });
        }

        session.start_transaction().await?;
        let mut scope = Self {
            session,
            owned: true,
            pushed_snapshot: false,
        };

        if mode == SnapshotMode::PushActive {
            if let Err(err) = session.push_active_snapshot().await {
                scope.release(false).await?;
                return Err(err);
            }
            scope.pushed_snapshot = true;
        }
        Ok(scope)
    }

    /// Whether this scope started the transaction it runs in.
    #[must_use]
    pub fn owned(&self) -> bool {
        self.owned
    }

    /// The session this scope runs on.
    #[must_use]
    pub fn session(&self) -> &'a dyn TransactionControl {
        self.session
    }

    /// Ends the scope: commits an owned transaction on success, rolls it
    /// back on failure and leaves a caller's transaction alone.
    pub async fn release(self, succeeded: bool) -> CoreResult<()> {
        if !self.owned {
            return Ok(());
        }

        if succeeded {
            if self.pushed_snapshot {
                self.session.pop_active_snapshot().await?;
            }
            self.session.commit_transaction().await
        } else {
            self.session.abort_transaction().await
        }
    }

    /// Releases the scope according to `result` and hands `result` back.
    ///
    /// A failure to commit replaces a successful result; the original error
    /// wins over a failure to roll back.
    pub async fn finish<T>(self, result: CoreResult<T>) -> CoreResult<T> {
        match result {
            Ok(value) => {
                self.release(true).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(release_err) = self.release(false).await {
                    tracing::error!(error = %release_err, "failed to roll back policy transaction");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chronodb_core::CoreError;
    use parking_lot::Mutex;

    /// Session double that records every transaction-control call.
    #[derive(Default)]
    pub(crate) struct RecordingSession {
        state: Mutex<RecordingState>,
    }

    #[derive(Default)]
    struct RecordingState {
        in_transaction: bool,
        snapshots: usize,
        calls: Vec<&'static str>,
    }

    impl RecordingSession {
        pub(crate) fn in_transaction() -> Self {
            let session = Self::default();
            session.state.lock().in_transaction = true;
            session
        }

        pub(crate) fn calls(&self) -> Vec<&'static str> {
            self.state.lock().calls.clone()
        }
    }

    #[async_trait]
    impl TransactionControl for RecordingSession {
        async fn is_in_transaction(&self) -> bool {
            self.state.lock().in_transaction
        }

        async fn start_transaction(&self) -> CoreResult<()> {
            let mut state = self.state.lock();
            if state.in_transaction {
                return Err(CoreError::invalid_state("already in transaction"));
            }
            state.in_transaction = true;
            state.calls.push("start");
            Ok(())
        }

        async fn commit_transaction(&self) -> CoreResult<()> {
            let mut state = self.state.lock();
            if !state.in_transaction || state.snapshots != 0 {
                return Err(CoreError::invalid_state("cannot commit"));
            }
            state.in_transaction = false;
            state.calls.push("commit");
            Ok(())
        }

        async fn abort_transaction(&self) -> CoreResult<()> {
            let mut state = self.state.lock();
            state.in_transaction = false;
            state.snapshots = 0;
            state.calls.push("abort");
            Ok(())
        }

        async fn push_active_snapshot(&self) -> CoreResult<()> {
            let mut state = self.state.lock();
            state.snapshots += 1;
            state.calls.push("push");
            Ok(())
        }

        async fn pop_active_snapshot(&self) -> CoreResult<()> {
            let mut state = self.state.lock();
            state.snapshots -= 1;
            state.calls.push("pop");
            Ok(())
        }
    }

    #[tokio::test]
    async fn owned_scope_commits_on_success() {
        let session = RecordingSession::default();
        let scope = TransactionScope::enter(&session, SnapshotMode::None)
            .await
            .unwrap();
        assert!(scope.owned());
        scope.release(true).await.unwrap();

        assert_eq!(session.calls(), vec!["start", "commit"]);
        assert!(!session.is_in_transaction().await);
    }

    #[tokio::test]
    async fn owned_scope_pops_snapshot_before_commit() {
        let session = RecordingSession::default();
        let scope = TransactionScope::enter(&session, SnapshotMode::PushActive)
            .await
            .unwrap();
        scope.finish(Ok(())).await.unwrap();

        assert_eq!(session.calls(), vec!["start", "push", "pop", "commit"]);
    }

    #[tokio::test]
    async fn owned_scope_aborts_on_failure() {
        let session = RecordingSession::default();
        let scope = TransactionScope::enter(&session, SnapshotMode::PushActive)
            .await
            .unwrap();
        let result: CoreResult<()> = scope.finish(Err(CoreError::internal("boom"))).await;

        assert_eq!(result.unwrap_err().code(), "internal_error");
        assert_eq!(session.calls(), vec!["start", "push", "abort"]);
    }

    #[tokio::test]
    async fn caller_transaction_is_left_alone() {
        let session = RecordingSession::in_transaction();
        let scope = TransactionScope::enter(&session, SnapshotMode::PushActive)
            .await
            .unwrap();
        assert!(!scope.owned());
        scope.release(false).await.unwrap();

        assert!(session.calls().is_empty());
        assert!(session.is_in_transaction().await);
    }
}
