use anyhow::Result;
use axum::{middleware, routing::get, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use super::admin::{admin_routes, AdminAppState};
use super::analytics::{analytics_routes, AnalyticsAppState};
use super::clients::{client_routes, ClientsAppState};
use super::events::{event_routes, EventsAppState};
use super::health::health_check;
use super::library::{library_routes, LibraryAppState};
use super::messages::{message_routes, MessagesAppState};
use super::notifications::{notification_routes, NotificationsAppState};
use super::programs::{program_routes, ProgramsAppState};
use super::progress::{progress_routes, ProgressAppState};
use super::realtime::{realtime_routes, RealtimeAppState};
use super::routines::{routine_routes, RoutinesAppState};
use super::settings::{settings_routes, SettingsAppState};
use super::users::{user_routes, UsersAppState};
use super::workouts::{workout_routes, WorkoutsAppState};
use crate::auth::{cors_layer, security_headers_layer, session_middleware, JwtService, SessionResolver};
use crate::config::AppConfig;
use crate::services::{
    AdminService, AnalyticsService, BackgroundTasks, BlobStorageService, ClientService, EmailService, EventService,
    LibraryService, MessagingService, NotificationService, ProgramService, ProgressService, RealtimeService,
    RoutineService, SettingsService, TimeSwapService, UserService, VideoMetadataService, WorkoutService,
};

pub const API_PREFIX: &str = "/api/v1";

/// Every service the router and the job scheduler share
#[derive(Clone)]
pub struct AppContext {
    pub jwt: JwtService,
    pub sessions: SessionResolver,
    pub realtime: RealtimeService,
    pub notifications: NotificationService,
    pub users: UserService,
    pub clients: ClientService,
    pub library: LibraryService,
    pub messaging: MessagingService,
    pub workouts: WorkoutService,
    pub progress: ProgressService,
    pub events: EventService,
    pub swaps: TimeSwapService,
    pub programs: ProgramService,
    pub routines: RoutineService,
    pub analytics: AnalyticsService,
    pub settings: SettingsService,
    pub admin: AdminService,
}

impl AppContext {
    pub fn new(
        db: PgPool,
        config: &AppConfig,
        email: Option<EmailService>,
        storage: Option<BlobStorageService>,
    ) -> Result<Self> {
        let tasks = BackgroundTasks::new();
        let realtime = RealtimeService::new();
        let notifications = NotificationService::new(db.clone(), realtime.clone(), email.clone(), tasks.clone());
        let metadata =
            VideoMetadataService::new(config.youtube_oembed_url.clone(), config.vimeo_oembed_url.clone())?;

        let jwt = JwtService::new(&config.jwt_secret);

        Ok(Self {
            sessions: SessionResolver::new(jwt.clone(), db.clone()),
            jwt,
            users: UserService::new(db.clone()),
            clients: ClientService::new(db.clone(), email, tasks.clone()),
            library: LibraryService::new(db.clone(), metadata, storage, notifications.clone(), tasks.clone()),
            messaging: MessagingService::new(db.clone(), realtime.clone(), notifications.clone(), tasks),
            workouts: WorkoutService::new(db.clone(), notifications.clone()),
            progress: ProgressService::new(db.clone()),
            events: EventService::new(db.clone(), notifications.clone()),
            swaps: TimeSwapService::new(
                db.clone(),
                notifications.clone(),
                realtime.clone(),
                config.swap_request_ttl_hours,
            ),
            programs: ProgramService::new(db.clone(), notifications.clone()),
            routines: RoutineService::new(db.clone(), notifications.clone()),
            analytics: AnalyticsService::new(db.clone()),
            settings: SettingsService::new(db.clone()),
            admin: AdminService::new(db),
            realtime,
            notifications,
        })
    }
}

pub fn create_routes(ctx: AppContext) -> Router {
    let jwt = ctx.jwt.clone();

    let api = Router::new()
        .nest("/users", user_routes(UsersAppState { jwt: jwt.clone(), users: ctx.users }))
        .nest("/clients", client_routes(ClientsAppState { jwt: jwt.clone(), clients: ctx.clients }))
        .nest("/library", library_routes(LibraryAppState { jwt: jwt.clone(), library: ctx.library }))
        .nest("/messages", message_routes(MessagesAppState { jwt: jwt.clone(), messaging: ctx.messaging }))
        .nest("/workouts", workout_routes(WorkoutsAppState { jwt: jwt.clone(), workouts: ctx.workouts }))
        .nest("/progress", progress_routes(ProgressAppState { jwt: jwt.clone(), progress: ctx.progress }))
        .nest(
            "/events",
            event_routes(EventsAppState {
                jwt: jwt.clone(),
                events: ctx.events,
                swaps: ctx.swaps,
            }),
        )
        .nest("/programs", program_routes(ProgramsAppState { jwt: jwt.clone(), programs: ctx.programs }))
        .nest("/routines", routine_routes(RoutinesAppState { jwt: jwt.clone(), routines: ctx.routines }))
        .nest(
            "/notifications",
            notification_routes(NotificationsAppState {
                jwt: jwt.clone(),
                notifications: ctx.notifications,
            }),
        )
        .nest("/realtime", realtime_routes(RealtimeAppState { jwt: jwt.clone(), realtime: ctx.realtime }))
        .nest("/analytics", analytics_routes(AnalyticsAppState { jwt: jwt.clone(), analytics: ctx.analytics }))
        .nest("/settings", settings_routes(SettingsAppState { jwt: jwt.clone(), settings: ctx.settings }))
        .nest("/admin", admin_routes(AdminAppState { jwt, admin: ctx.admin }))
        .layer(middleware::from_fn_with_state(ctx.sessions, session_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(security_headers_layer())
}
