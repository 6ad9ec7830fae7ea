mod app;
mod visit;

use crate::trivia::TriviaApi;
use crate::types::*;
use crate::ws::BridgeConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Trivia backend (questions, answers, app switch)
    pub trivia: Arc<dyn TriviaApi>,
    /// Last known value of the app-active switch
    pub app_active: Arc<RwLock<bool>>,
    /// AR visits currently mounted, by visit id
    pub visits: Arc<RwLock<HashMap<VisitId, ArVisit>>>,
    pub bridge: BridgeConfig,
}

impl AppState {
    pub fn new(trivia: Arc<dyn TriviaApi>, app_active_default: bool, bridge: BridgeConfig) -> Self {
        Self {
            trivia,
            app_active: Arc::new(RwLock::new(app_active_default)),
            visits: Arc::new(RwLock::new(HashMap::new())),
            bridge,
        }
    }
}
