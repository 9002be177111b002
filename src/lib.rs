pub mod config;
pub mod error;
pub mod messages;
pub mod request;
pub mod response;
pub mod router;
pub mod static_files;
pub mod store;

pub use config::Config;
pub use error::{ServerError, StoreError};
pub use messages::MessageController;
pub use request::{Method, Request};
pub use response::{Response, Status};
pub use router::{handle_connection, route, serve, Route, Router};
pub use static_files::StaticFiles;
pub use store::{shared, Message, MessageStore, SharedStore, SqliteStore};
