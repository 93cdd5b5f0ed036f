use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use uuid::Uuid;

use crate::auth::{extract_bearer_token, JwtService, UserRole, UserSession};
use crate::errors::{AppError, AppResult};

/// Turns a bearer token into a session whose role is the stored one.
///
/// The identity provider's role only seeds the user row on first sync; after
/// that `users.role` (changed through the admin API) wins.
#[derive(Clone)]
pub struct SessionResolver {
    jwt: JwtService,
    db: PgPool,
}

impl SessionResolver {
    pub fn new(jwt: JwtService, db: PgPool) -> Self {
        Self { jwt, db }
    }

    pub async fn resolve(&self, token: &str) -> AppResult<UserSession> {
        let mut session = self.jwt.extract_user_session(token)?;
        if let Some(role) = stored_role(&self.db, session.user_id).await? {
            session.role = role;
        }
        Ok(session)
    }
}

async fn stored_role(db: &PgPool, user_id: Uuid) -> AppResult<Option<UserRole>> {
    let role = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(role)
}

/// Resolves the caller once per request and stores the session in the
/// request extensions. Requests without a usable token pass through and
/// are rejected by the `UserSession` extractor.
pub async fn session_middleware(
    State(resolver): State<SessionResolver>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| extract_bearer_token(header).ok())
        .map(str::to_owned);

    if let Some(token) = token {
        let session = resolver.resolve(&token).await?;
        request.extensions_mut().insert(session);
    }

    Ok(next.run(request).await)
}

/// Any router state that carries a `JwtService` can authenticate callers.
#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<UserSession>() {
            return Ok(session.clone());
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = extract_bearer_token(auth_header)?;
        let session = JwtService::from_ref(state).extract_user_session(token)?;

        parts.extensions.insert(session.clone());
        Ok(session)
    }
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn security_headers_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    )
}
