use std::sync::Arc;

use crate::config::ServerConfig;
use crate::dispatch::EventQueue;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub events: EventQueue,
}
