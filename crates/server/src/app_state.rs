use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::store::IssueStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IssueStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn IssueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}
