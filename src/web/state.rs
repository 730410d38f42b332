//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::storage::Storage;

pub struct AppState {
    pub storage: Storage,
    /// Active sessions: session id -> user id. Sessions live for the
    /// process lifetime; a restart logs everyone out.
    pub sessions: HashMap<String, String>,
}

pub type SharedState = Arc<Mutex<AppState>>;
