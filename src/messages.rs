//! REST controller for the `messages` collection.
//!
//! Ids travel in the JSON body, never in the URL. Each operation locks the
//! store once and does all its store calls under that lock.

use serde::Deserialize;
use tracing::debug;

use crate::error::{ServerError, StoreError};
use crate::response::{Response, Status};
use crate::store::{Message, SharedStore};

/// Incoming payload. Fields are optional so absence maps to a 400 rather
/// than a parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct MessageBody {
    pub id: Option<i64>,
    pub text: Option<String>,
}

impl MessageBody {
    pub fn parse(body: &[u8]) -> Result<Self, ServerError> {
        Ok(serde_json::from_slice(body)?)
    }

    fn id(&self) -> Result<i64, ServerError> {
        self.id.ok_or(ServerError::MissingField("id"))
    }

    fn text(&self) -> Result<&str, ServerError> {
        self.text.as_deref().ok_or(ServerError::MissingField("text"))
    }
}

#[derive(Clone)]
pub struct MessageController {
    store: SharedStore,
}

impl MessageController {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Response, ServerError> {
        let messages = self.store.lock().list_all()?;
        Ok(Response::json(Status::Ok, serde_json::to_vec(&messages)?))
    }

    /// Inserts the text and answers with the newest record carrying it, so
    /// duplicate texts resolve to the row just written.
    pub fn create(&self, body: &[u8]) -> Result<Response, ServerError> {
        let input = MessageBody::parse(body)?;
        let text = input.text()?;

        let id = {
            let store = self.store.lock();
            store.insert(text)?;
            store
                .find_ids_by_text(text)?
                .last()
                .copied()
                .ok_or(StoreError::LostInsert)?
        };
        debug!(id, "message created");

        let created = Message {
            id,
            text: text.to_string(),
        };
        Ok(Response::json(Status::Created, serde_json::to_vec(&created)?))
    }

    /// Overwrites the text in place. Unknown ids are a silent no-op.
    pub fn update(&self, body: &[u8]) -> Result<Response, ServerError> {
        let input = MessageBody::parse(body)?;
        let id = input.id()?;
        let text = input.text()?;

        self.store.lock().update_text(id, text)?;
        Ok(Response::empty(Status::Ok))
    }

    pub fn delete(&self, body: &[u8]) -> Result<Response, ServerError> {
        let id = MessageBody::parse(body)?.id()?;

        let store = self.store.lock();
        if !store.exists(id)? {
            return Err(ServerError::NotFound);
        }
        store.delete(id)?;
        debug!(id, "message deleted");
        Ok(Response::empty(Status::Ok))
    }
}
