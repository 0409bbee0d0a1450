use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::DomainEvent;

pub struct AppState {
    /// The ledger is the only mutable shared resource; the mutex
    /// serializes all store access so check-and-insert sequences run
    /// against a consistent snapshot.
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    /// Fan-out bus for domain events; dropped when nobody listens.
    pub events_tx: broadcast::Sender<DomainEvent>,
}
