//! Background service answering content-script requests from the saved-item
//! store.

use qf_ipc::MessageHandler;
use qf_ipc::Request;
use qf_ipc::Response;
use qf_storage::SavedItemStore;
use tracing::info;
use tracing::warn;

#[derive(Debug, Default)]
pub struct BackgroundService {
    store: SavedItemStore,
}

impl BackgroundService {
    pub fn new(store: SavedItemStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SavedItemStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SavedItemStore {
        &mut self.store
    }
}

impl MessageHandler for BackgroundService {
    fn handle(&mut self, request: Request) -> Response {
        let action = request.action();
        let result = match request {
            Request::GetEnabled => Ok(Response::enabled(self.store.is_enabled())),
            Request::SetEnabled { enabled } => {
                info!(enabled, "extension toggled");
                self.store
                    .set_enabled(enabled)
                    .map(|()| Response::enabled(enabled))
            }
            Request::SaveItem { item } => self.store.save(item).map(|evicted| {
                if !evicted.is_empty() {
                    info!(evicted = evicted.len(), "saved-items cap reached");
                }
                Response::ok()
            }),
            Request::GetSavedItems => Ok(Response::items(self.store.list())),
            Request::DeleteItem { id } => self.store.remove(&id).map(|removed| {
                if removed {
                    Response::ok()
                } else {
                    Response::failure(format!("no saved item with id `{id}`"))
                }
            }),
        };

        result.unwrap_or_else(|error| {
            warn!(action, %error, "request failed");
            Response::failure(error.to_string())
        })
    }
}
