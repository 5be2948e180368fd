pub mod conversation;
pub mod errors;
pub mod events;
pub mod models;
pub mod providers;
pub mod registry;
pub mod stream;
pub mod transport;
