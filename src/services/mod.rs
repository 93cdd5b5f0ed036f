// Business logic services

pub mod access;
pub mod admin_service;
pub mod analytics_service;
pub mod background_job_service;
pub mod background_tasks;
pub mod blob_storage_service;
pub mod client_service;
pub mod email_service;
pub mod event_service;
pub mod library_service;
pub mod messaging_service;
pub mod notification_service;
pub mod program_service;
pub mod progress_service;
pub mod realtime_service;
pub mod routine_service;
pub mod settings_service;
pub mod time_swap_service;
pub mod user_service;
pub mod video_metadata_service;
pub mod workout_service;

pub use admin_service::AdminService;
pub use analytics_service::AnalyticsService;
pub use background_job_service::BackgroundJobService;
pub use background_tasks::BackgroundTasks;
pub use blob_storage_service::BlobStorageService;
pub use client_service::ClientService;
pub use email_service::EmailService;
pub use event_service::EventService;
pub use library_service::LibraryService;
pub use messaging_service::MessagingService;
pub use notification_service::NotificationService;
pub use program_service::ProgramService;
pub use progress_service::ProgressService;
pub use realtime_service::{RealtimeEvent, RealtimeEventKind, RealtimeService};
pub use routine_service::RoutineService;
pub use settings_service::SettingsService;
pub use time_swap_service::TimeSwapService;
pub use user_service::UserService;
pub use video_metadata_service::{VideoMetadata, VideoMetadataService};
pub use workout_service::WorkoutService;
