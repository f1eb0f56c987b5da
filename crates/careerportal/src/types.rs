use std::sync::Arc;

use crate::config::PortalConfig;
use crate::db::PortalDbManager;
use crate::notify::{DbNotifier, NotificationSink, PortalEvent};

/// Shared state handed to every request handler.
pub struct PortalState {
    pub db: Arc<PortalDbManager>,
    pub notifier: Arc<dyn NotificationSink>,
    pub config: Arc<PortalConfig>,
}

impl PortalState {
    /// State whose notifications are stored in the same database.
    pub fn new(db: Arc<PortalDbManager>, config: PortalConfig) -> Self {
        Self {
            notifier: Arc::new(DbNotifier::new(Arc::clone(&db))),
            db,
            config: Arc::new(config),
        }
    }

    pub fn publish(&self, event: PortalEvent) {
        self.notifier.publish(&event);
    }
}
