// Persistence rows, request/response shapes and the pure rules around them

pub mod admin;
pub mod analytics;
pub mod client;
pub mod event;
pub mod library;
pub mod message;
pub mod notification;
pub mod program;
pub mod progress;
pub mod routine;
pub mod schedule;
pub mod settings;
pub mod user;
pub mod validation;

pub use admin::*;
pub use analytics::*;
pub use client::*;
pub use event::*;
pub use library::*;
pub use message::*;
pub use notification::*;
pub use program::*;
pub use progress::*;
pub use routine::*;
pub use schedule::*;
pub use settings::*;
pub use user::*;
pub use validation::*;
