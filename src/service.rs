use std::sync::Arc;

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use eyre::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::error;

use crate::config::Config;
use crate::delivery::DeliveryChannel;
use crate::dispatcher::NotifyTask;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Shared state behind every request handler and the notification worker.
pub struct ServiceState {
    pub db_pool: DbPool,
    pub channel: Arc<dyn DeliveryChannel>,
    pub work_sender: UnboundedSender<NotifyTask>,
    pub config: Config,
}

impl ServiceState {
    pub fn new(
        config: Config,
        channel: Arc<dyn DeliveryChannel>,
        work_sender: UnboundedSender<NotifyTask>,
    ) -> Result<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
        let db_pool = Pool::builder().build(manager)?;
        Ok(ServiceState {
            db_pool,
            channel,
            work_sender,
            config,
        })
    }

    /// Hands an event to the notification worker. Delivery is decoupled from
    /// the request; a queue failure is logged, never surfaced to the caller.
    pub fn queue_notify(&self, task: NotifyTask) {
        if let Err(e) = self.work_sender.send(task) {
            error!("Couldn't queue notification task {e}");
        }
    }
}
