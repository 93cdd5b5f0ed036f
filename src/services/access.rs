//! Ownership lookups shared by the resource services. Anything owned by
//! another coach reads as not found.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::Client;

pub async fn owned_client(db: &PgPool, coach_id: Uuid, client_id: Uuid) -> AppResult<Client> {
    sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1 AND coach_id = $2")
        .bind(client_id)
        .bind(coach_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("Client"))
}

/// Owned and not archived
pub async fn active_owned_client(db: &PgPool, coach_id: Uuid, client_id: Uuid) -> AppResult<Client> {
    let client = owned_client(db, coach_id, client_id).await?;
    if client.is_active() {
        Ok(client)
    } else {
        Err(AppError::NotFound("Client"))
    }
}

/// Client records linked to a client-role login
pub async fn linked_client_ids(db: &PgPool, user_id: Uuid) -> AppResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar("SELECT id FROM clients WHERE user_id = $1 AND status = 'active'")
        .bind(user_id)
        .fetch_all(db)
        .await?;
    Ok(ids)
}

/// A client record may only be linked to an existing client-role login
pub async fn ensure_client_login(db: &PgPool, user_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND role = 'client')")
        .bind(user_id)
        .fetch_one(db)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound("User"))
    }
}

pub async fn ensure_owned(db: &PgPool, table: OwnedTable, coach_id: Uuid, id: Uuid) -> AppResult<()> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND coach_id = $2)", table.name());
    let exists: bool = sqlx::query_scalar(&sql)
        .bind(id)
        .bind(coach_id)
        .fetch_one(db)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(table.entity()))
    }
}

/// Coach-owned tables addressable through `ensure_owned`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedTable {
    Programs,
    Routines,
    LibraryItems,
}

impl OwnedTable {
    fn name(&self) -> &'static str {
        match self {
            OwnedTable::Programs => "programs",
            OwnedTable::Routines => "routines",
            OwnedTable::LibraryItems => "library_items",
        }
    }

    fn entity(&self) -> &'static str {
        match self {
            OwnedTable::Programs => "Program",
            OwnedTable::Routines => "Routine",
            OwnedTable::LibraryItems => "Library item",
        }
    }
}
