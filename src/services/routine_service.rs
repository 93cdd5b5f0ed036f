use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{
    AssignResult, AssignRoutineRequest, AssignedRoutine, CreateRoutineRequest, ExerciseInput, NewNotification,
    NotificationKind, Routine, RoutineAssignment, RoutineDetail, RoutineExercise, UpdateRoutineRequest,
};
use crate::services::access::{active_owned_client, ensure_owned, owned_client, OwnedTable};
use crate::services::NotificationService;

#[derive(Clone)]
pub struct RoutineService {
    db: PgPool,
    notifications: NotificationService,
}

impl RoutineService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn list(&self, coach_id: Uuid) -> AppResult<Vec<RoutineDetail>> {
        let routines = sqlx::query_as::<_, Routine>("SELECT * FROM routines WHERE coach_id = $1 ORDER BY name")
            .bind(coach_id)
            .fetch_all(&self.db)
            .await?;

        self.with_exercises(routines).await
    }

    async fn with_exercises(&self, routines: Vec<Routine>) -> AppResult<Vec<RoutineDetail>> {
        let ids: Vec<Uuid> = routines.iter().map(|r| r.id).collect();
        let exercises = sqlx::query_as::<_, RoutineExercise>(
            "SELECT * FROM routine_exercises WHERE routine_id = ANY($1) ORDER BY position",
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_routine: HashMap<Uuid, Vec<RoutineExercise>> = HashMap::new();
        for exercise in exercises {
            by_routine.entry(exercise.routine_id).or_default().push(exercise);
        }

        Ok(routines
            .into_iter()
            .map(|routine| RoutineDetail {
                exercises: by_routine.remove(&routine.id).unwrap_or_default(),
                routine,
            })
            .collect())
    }

    pub async fn get(&self, coach_id: Uuid, routine_id: Uuid) -> AppResult<RoutineDetail> {
        let routine = sqlx::query_as::<_, Routine>("SELECT * FROM routines WHERE id = $1 AND coach_id = $2")
            .bind(routine_id)
            .bind(coach_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound("Routine"))?;

        let mut details = self.with_exercises(vec![routine]).await?;
        details.pop().ok_or(AppError::NotFound("Routine"))
    }

    async fn check_library_refs(&self, coach_id: Uuid, exercises: &[ExerciseInput]) -> AppResult<()> {
        for id in exercises.iter().filter_map(|e| e.library_item_id) {
            ensure_owned(&self.db, OwnedTable::LibraryItems, coach_id, id).await?;
        }
        Ok(())
    }

    pub async fn create(&self, coach_id: Uuid, request: CreateRoutineRequest) -> AppResult<RoutineDetail> {
        self.check_library_refs(coach_id, &request.exercises).await?;

        let mut tx = self.db.begin().await?;
        let routine = sqlx::query_as::<_, Routine>(
            "INSERT INTO routines (id, coach_id, name, description) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(coach_id)
        .bind(request.name.trim())
        .bind(request.description)
        .fetch_one(&mut *tx)
        .await?;

        insert_exercises(&mut tx, routine.id, &request.exercises).await?;
        tx.commit().await?;

        info!(%coach_id, routine_id = %routine.id, "Created routine");
        self.get(coach_id, routine.id).await
    }

    /// Exercises, when given, replace the whole list
    pub async fn update(&self, coach_id: Uuid, routine_id: Uuid, request: UpdateRoutineRequest) -> AppResult<RoutineDetail> {
        if let Some(exercises) = &request.exercises {
            self.check_library_refs(coach_id, exercises).await?;
        }

        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE routines SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                updated_at = NOW()
            WHERE id = $1 AND coach_id = $2
            "#,
        )
        .bind(routine_id)
        .bind(coach_id)
        .bind(request.name)
        .bind(request.description)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound("Routine"));
        }

        if let Some(exercises) = &request.exercises {
            sqlx::query("DELETE FROM routine_exercises WHERE routine_id = $1")
                .bind(routine_id)
                .execute(&mut *tx)
                .await?;
            insert_exercises(&mut tx, routine_id, exercises).await?;
        }

        tx.commit().await?;
        self.get(coach_id, routine_id).await
    }

    pub async fn delete(&self, coach_id: Uuid, routine_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM routines WHERE id = $1 AND coach_id = $2")
            .bind(routine_id)
            .bind(coach_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Routine"));
        }
        Ok(())
    }

    pub async fn assign(&self, coach_id: Uuid, routine_id: Uuid, request: AssignRoutineRequest) -> AppResult<AssignResult> {
        let routine = self.get(coach_id, routine_id).await?;

        let mut clients = Vec::with_capacity(request.client_ids.len());
        for client_id in &request.client_ids {
            clients.push(active_owned_client(&self.db, coach_id, *client_id).await?);
        }

        let mut result = AssignResult {
            assigned: Vec::new(),
            already_assigned: Vec::new(),
        };

        for client in clients {
            let inserted = sqlx::query(
                r#"
                INSERT INTO routine_assignments (id, routine_id, client_id, start_date, notes)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (routine_id, client_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(routine_id)
            .bind(client.id)
            .bind(request.start_date)
            .bind(request.notes.as_deref())
            .execute(&self.db)
            .await?
            .rows_affected();

            if inserted == 0 {
                result.already_assigned.push(client.id);
                continue;
            }

            result.assigned.push(client.id);
            if let Some(user_id) = client.user_id {
                self.notifications.dispatch(
                    NewNotification::new(
                        user_id,
                        NotificationKind::RoutineAssigned,
                        "New routine assigned",
                        format!("Your coach assigned \"{}\"", routine.routine.name),
                    )
                    .with_data(serde_json::json!({ "routine_id": routine_id })),
                );
            }
        }

        Ok(result)
    }

    pub async fn unassign(&self, coach_id: Uuid, routine_id: Uuid, client_id: Uuid) -> AppResult<()> {
        ensure_owned(&self.db, OwnedTable::Routines, coach_id, routine_id).await?;
        owned_client(&self.db, coach_id, client_id).await?;

        let result = sqlx::query("DELETE FROM routine_assignments WHERE routine_id = $1 AND client_id = $2")
            .bind(routine_id)
            .bind(client_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Routine assignment"));
        }
        Ok(())
    }

    pub async fn my_routines(&self, user_id: Uuid) -> AppResult<Vec<AssignedRoutine>> {
        let assignments = sqlx::query_as::<_, RoutineAssignment>(
            r#"
            SELECT ra.* FROM routine_assignments ra
            JOIN clients c ON c.id = ra.client_id
            WHERE c.user_id = $1 AND c.status = 'active'
            ORDER BY ra.assigned_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let routine_ids: Vec<Uuid> = assignments.iter().map(|a| a.routine_id).collect();
        let routines = sqlx::query_as::<_, Routine>("SELECT * FROM routines WHERE id = ANY($1)")
            .bind(&routine_ids)
            .fetch_all(&self.db)
            .await?;

        let details: HashMap<Uuid, RoutineDetail> = self
            .with_exercises(routines)
            .await?
            .into_iter()
            .map(|d| (d.routine.id, d))
            .collect();

        Ok(assignments
            .into_iter()
            .filter_map(|assignment| {
                let routine = details.get(&assignment.routine_id).cloned();
                routine.map(|routine| AssignedRoutine { assignment, routine })
            })
            .collect())
    }
}

async fn insert_exercises(
    tx: &mut Transaction<'_, Postgres>,
    routine_id: Uuid,
    exercises: &[ExerciseInput],
) -> AppResult<()> {
    for (index, exercise) in exercises.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO routine_exercises (
                id, routine_id, position, name, description, sets, reps, duration_seconds, library_item_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(routine_id)
        .bind(index as i32 + 1)
        .bind(&exercise.name)
        .bind(&exercise.description)
        .bind(exercise.sets)
        .bind(exercise.reps)
        .bind(exercise.duration_seconds)
        .bind(exercise.library_item_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
