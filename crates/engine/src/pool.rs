//! Bounded pool for on-demand sweeps.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Semaphore, oneshot};

use herald_common::error::AppError;

/// Runs submitted sweeps in the background, at most `workers` at a time.
#[derive(Clone)]
pub struct SweepPool {
    permits: Arc<Semaphore>,
}

impl SweepPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn submit<T, F>(&self, name: &'static str, work: F) -> SweepTicket<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => {
                    tracing::debug!(sweep = name, "On-demand sweep started");
                    work.await
                }
                Err(_) => Err(AppError::Internal("sweep pool closed".to_string())),
            };

            if let Err(e) = &result {
                tracing::error!(sweep = name, error = %e, "On-demand sweep failed");
            }
            // The caller may have dropped its ticket.
            let _ = tx.send(result);
        });

        SweepTicket { rx }
    }
}

/// Handle to a submitted sweep. Dropping it does not cancel the sweep.
pub struct SweepTicket<T> {
    rx: oneshot::Receiver<Result<T, AppError>>,
}

impl<T> SweepTicket<T> {
    pub async fn wait(self) -> Result<T, AppError> {
        self.rx
            .await
            .map_err(|_| AppError::Internal("sweep task ended without a result".to_string()))?
    }
}
