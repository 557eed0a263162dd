pub mod db;
pub mod models;

pub use models::Conversation;
