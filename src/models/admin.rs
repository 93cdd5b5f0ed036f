use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::UserRole;

pub const DEFAULT_ADMIN_PAGE_SIZE: i64 = 50;
pub const MAX_ADMIN_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct AdminUserQuery {
    pub role: Option<UserRole>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AdminUserQuery {
    pub fn page(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_ADMIN_PAGE_SIZE)
            .clamp(1, MAX_ADMIN_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Clone, Default, Serialize, FromRow, PartialEq, Eq)]
pub struct PlatformStats {
    pub coaches: i64,
    pub clients: i64,
    pub admins: i64,
    pub client_records: i64,
    pub programs: i64,
    pub events: i64,
    pub messages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_bounds() {
        let query = AdminUserQuery { role: None, limit: None, offset: None };
        assert_eq!(query.page(), (50, 0));

        let query = AdminUserQuery { role: None, limit: Some(10_000), offset: Some(-5) };
        assert_eq!(query.page(), (200, 0));
    }
}
