use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// User roles for role-based access control
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum UserRole {
    Client,
    Coach,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Client => "client",
            UserRole::Coach => "coach",
            UserRole::Admin => "admin",
        }
    }

    /// Check if this role has permission to act as another role
    pub fn can_access(&self, target_role: &UserRole) -> bool {
        match self {
            UserRole::Admin => true,
            UserRole::Coach => matches!(target_role, UserRole::Client | UserRole::Coach),
            UserRole::Client => matches!(target_role, UserRole::Client),
        }
    }
}

/// JWT claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,    // Platform user id
    pub email: String,
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

/// Authenticated caller, extracted from the bearer token
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl UserSession {
    pub fn from_claims(claims: &Claims) -> Result<Self, uuid::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&claims.sub)?,
            email: claims.email.clone(),
            role: claims.role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Coaches and admins pass
    pub fn require_coach(&self) -> AppResult<Uuid> {
        if self.role.can_access(&UserRole::Coach) {
            Ok(self.user_id)
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_client(&self) -> AppResult<Uuid> {
        if self.role == UserRole::Client {
            Ok(self.user_id)
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_admin(&self) -> AppResult<Uuid> {
        if self.is_admin() {
            Ok(self.user_id)
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> UserSession {
        UserSession {
            user_id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_user_role_permissions() {
        let admin = UserRole::Admin;
        let coach = UserRole::Coach;
        let client = UserRole::Client;

        assert!(admin.can_access(&coach));
        assert!(admin.can_access(&client));
        assert!(coach.can_access(&client));
        assert!(!coach.can_access(&admin));
        assert!(!client.can_access(&coach));
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&UserRole::Coach).unwrap(), "\"coach\"");
        let role: UserRole = serde_json::from_str("\"client\"").unwrap();
        assert_eq!(role, UserRole::Client);
        assert!(serde_json::from_str::<UserRole>("\"athlete\"").is_err());
    }

    #[test]
    fn test_role_guards() {
        assert!(session(UserRole::Coach).require_coach().is_ok());
        assert!(session(UserRole::Admin).require_coach().is_ok());
        assert!(matches!(session(UserRole::Client).require_coach(), Err(AppError::Forbidden)));
        assert!(matches!(session(UserRole::Coach).require_admin(), Err(AppError::Forbidden)));
        assert!(matches!(session(UserRole::Coach).require_client(), Err(AppError::Forbidden)));
    }
}
