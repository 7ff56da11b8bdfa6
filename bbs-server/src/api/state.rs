//! Shared app state, the same role the teacher's `AppState` plays in
//! `auth-service::main` - one `web::Data<AppState>` handed to every handler
//! instead of each pulling its own dependencies out of extensions.

use std::sync::Arc;

use crate::registry::AppRegistry;
use crate::service::{Identity, SessionSvc};
use crate::shell::Shell;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: SessionSvc,
    pub identity: Identity,
    pub registry: Arc<AppRegistry>,
    pub shell: Arc<Shell>,
}
