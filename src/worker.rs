use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::dispatcher::{dispatch, NotifyTask};
use crate::service::ServiceState;

/// Single consumer of the notification queue. One task at a time keeps
/// delivery concurrency bounded and observable.
pub struct Worker {
    handle: JoinHandle<()>,
}

async fn consume_receiver(state: Arc<ServiceState>, mut receiver: UnboundedReceiver<NotifyTask>) {
    debug!("Starting notification consumer");
    while let Some(task) = receiver.recv().await {
        debug!("dispatching {task:?}");
        if let Err(e) = dispatch(&state, task).await {
            error!("Error dispatching notification task {e}");
        }
    }
    debug!("notification queue closed, consumer exiting");
}

impl Worker {
    pub fn new(state: Arc<ServiceState>, receiver: UnboundedReceiver<NotifyTask>) -> Self {
        let handle = tokio::spawn(consume_receiver(state, receiver));
        Worker { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}
