use anyhow::Result;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::{uuid, Uuid};

use crate::auth::{UserRole, UserSession};
use crate::errors::AppError;
use crate::models::*;
use crate::services::*;

pub const DEMO_COACH_ID: Uuid = uuid!("00000000-0000-4000-8000-000000000001");
pub const DEMO_CLIENT_USER_ID: Uuid = uuid!("00000000-0000-4000-8000-000000000002");

/// Demo data for local development: one coach, one linked client and a
/// two-week program assigned from today.
pub struct DatabaseSeeder {
    pool: PgPool,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn seed_all(&self) -> Result<()> {
        let users = UserService::new(self.pool.clone());
        match users.me(DEMO_COACH_ID).await {
            Ok(_) => {
                tracing::info!("Demo data already present, skipping seeding");
                return Ok(());
            }
            Err(AppError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        tracing::info!("Starting database seeding...");

        self.seed_users(&users).await?;
        let client = self.seed_client().await?;
        self.seed_program(client.id).await?;

        tracing::info!("Database seeding completed!");
        Ok(())
    }

    async fn seed_users(&self, users: &UserService) -> Result<()> {
        let demo_users = [
            (DEMO_COACH_ID, "coach@example.com", "Demo Coach", UserRole::Coach),
            (DEMO_CLIENT_USER_ID, "client@example.com", "Demo Client", UserRole::Client),
        ];

        for (user_id, email, name, role) in demo_users {
            let session = UserSession {
                user_id,
                email: email.to_string(),
                role,
            };
            users
                .sync(
                    &session,
                    SyncUserRequest {
                        name: Some(name.to_string()),
                        avatar_url: None,
                    },
                )
                .await?;
            tracing::info!(%user_id, role = role.as_str(), "Created demo user");
        }

        Ok(())
    }

    async fn seed_client(&self) -> Result<Client> {
        let clients = ClientService::new(self.pool.clone(), None, BackgroundTasks::new());
        let client = clients
            .create(
                DEMO_COACH_ID,
                CreateClientRequest {
                    name: "Demo Client".to_string(),
                    email: Some("client@example.com".to_string()),
                    phone: None,
                    notes: Some("Working on second serve consistency".to_string()),
                    user_id: Some(DEMO_CLIENT_USER_ID),
                },
            )
            .await?;

        tracing::info!(client_id = %client.id, "Created demo client");
        Ok(client)
    }

    async fn seed_program(&self, client_id: Uuid) -> Result<()> {
        let notifications =
            NotificationService::new(self.pool.clone(), RealtimeService::new(), None, BackgroundTasks::new());
        let programs = ProgramService::new(self.pool.clone(), notifications);

        let drill = |title: &str, minutes: i32| DrillInput {
            title: title.to_string(),
            description: None,
            duration_minutes: Some(minutes),
            library_item_id: None,
            routine_id: None,
        };
        let weeks = (1..=2)
            .map(|week_number| WeekInput {
                week_number,
                title: Some(format!("Week {}", week_number)),
                days: vec![
                    DayInput {
                        day_number: 1,
                        title: Some("Serve".to_string()),
                        is_rest_day: false,
                        drills: vec![drill("Warm-up", 10), drill("Serve targets", 20)],
                    },
                    DayInput {
                        day_number: 3,
                        title: Some("Footwork".to_string()),
                        is_rest_day: false,
                        drills: vec![drill("Ladder", 15), drill("Split step reactions", 15)],
                    },
                    DayInput {
                        day_number: 7,
                        title: None,
                        is_rest_day: true,
                        drills: vec![],
                    },
                ],
            })
            .collect();

        let program = programs
            .create(
                DEMO_COACH_ID,
                CreateProgramRequest {
                    title: "Serve Foundations".to_string(),
                    description: Some("Two weeks of serve and movement basics".to_string()),
                    level: Some("beginner".to_string()),
                    status: Some(ProgramStatus::Active),
                    weeks,
                },
            )
            .await?;

        programs
            .assign(
                DEMO_COACH_ID,
                program.program.id,
                AssignProgramRequest {
                    client_id,
                    start_date: (Utc::now() - Duration::days(1)).date_naive(),
                },
            )
            .await?;

        tracing::info!(program_id = %program.program.id, "Created demo program");
        Ok(())
    }
}
