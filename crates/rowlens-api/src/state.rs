//! Application state.
//!
//! A single state bundle is enough here: configuration, the file metadata
//! repository, and the storage backend. Handlers receive it as
//! `State<Arc<AppState>>`.

use std::sync::Arc;

use rowlens_core::Config;
use rowlens_db::FileRepository;
use rowlens_storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub files: FileRepository,
    pub storage: Arc<dyn Storage>,
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
