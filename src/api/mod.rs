// HTTP surface: one router per resource, nested under /api/v1

pub mod admin;
pub mod analytics;
pub mod clients;
pub mod events;
pub mod health;
pub mod library;
pub mod messages;
pub mod notifications;
pub mod programs;
pub mod progress;
pub mod realtime;
pub mod routes;
pub mod routines;
pub mod settings;
pub mod users;
pub mod workouts;

pub use routes::{create_routes, AppContext};
