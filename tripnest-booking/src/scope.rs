use std::future::Future;
use tokio::sync::watch;
use tracing::debug;
use tripnest_core::BookingError;

/// Lifetime of the view that started an operation.
///
/// Work run through [`ViewScope::run`] is dropped at its next await point
/// once the scope is torn down, so a late response cannot land on a view
/// that no longer exists.
#[derive(Debug)]
pub struct ViewScope {
    tx: watch::Sender<bool>,
}

impl ViewScope {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn teardown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_torn_down(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn run<T, F>(&self, fut: F) -> Result<T, BookingError>
    where
        F: Future<Output = Result<T, BookingError>>,
    {
        let mut rx = self.tx.subscribe();
        if *rx.borrow() {
            return Err(BookingError::Abandoned);
        }

        tokio::select! {
            result = fut => result,
            _ = rx.wait_for(|torn_down| *torn_down) => {
                debug!("Abandoning in-flight operation after view teardown");
                Err(BookingError::Abandoned)
            }
        }
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}
