use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};

/// Lifetime of one view. Once closed, pending requests resolve to
/// `ViewClosed` and their results are never applied.
#[derive(Debug, Default)]
pub(crate) struct ViewScope {
    closed: CancellationToken,
}

impl ViewScope {
    pub(crate) async fn run<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        let result = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(ClientError::ViewClosed),
            result = request => result,
        };
        if self.closed.is_cancelled() {
            return Err(ClientError::ViewClosed);
        }
        result
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(ClientError::ViewClosed);
        }
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.closed.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closing_abandons_pending_requests() {
        let scope = ViewScope::default();
        let pending = scope.run(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(1)
        });
        scope.close();
        assert!(matches!(pending.await, Err(ClientError::ViewClosed)));
        assert!(scope.ensure_open().is_err());
    }

    #[tokio::test]
    async fn open_scope_passes_results_through() {
        let scope = ViewScope::default();
        assert_eq!(scope.run(async { Ok(7) }).await.unwrap(), 7);
        assert!(!scope.is_closed());
    }
}
