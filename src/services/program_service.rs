use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

use crate::auth::UserSession;
use crate::errors::{AppError, AppResult};
use crate::models::{
    project_calendar, AssignProgramRequest, AssignmentContext, AssignmentWithClient, CalendarDrill, CalendarQuery,
    CreateProgramRequest, DayDetail, NewNotification, NotificationKind, Program, ProgramAssignment, ProgramDay,
    ProgramDetail, ProgramDrill, ProgramStatus, ProgramSummary, ProgramWeek, ScheduledDrillRow,
    UpdateProgramRequest, WeekDetail, WeekInput,
};
use crate::services::access::{active_owned_client, ensure_owned, owned_client, OwnedTable};
use crate::services::NotificationService;

#[derive(Clone)]
pub struct ProgramService {
    db: PgPool,
    notifications: NotificationService,
}

impl ProgramService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn list(&self, coach_id: Uuid) -> AppResult<Vec<ProgramSummary>> {
        let programs = sqlx::query_as::<_, ProgramSummary>(
            r#"
            SELECT
                p.id, p.title, p.description, p.level, p.status, p.updated_at,
                (SELECT COUNT(*) FROM program_weeks w WHERE w.program_id = p.id) AS week_count,
                (SELECT COUNT(*) FROM program_assignments a WHERE a.program_id = p.id) AS assignment_count
            FROM programs p
            WHERE p.coach_id = $1
            ORDER BY p.updated_at DESC
            "#,
        )
        .bind(coach_id)
        .fetch_all(&self.db)
        .await?;

        Ok(programs)
    }

    pub async fn get(&self, coach_id: Uuid, program_id: Uuid) -> AppResult<ProgramDetail> {
        let program = self.owned_program(coach_id, program_id).await?;
        self.load_detail(program).await
    }

    async fn owned_program(&self, coach_id: Uuid, program_id: Uuid) -> AppResult<Program> {
        sqlx::query_as::<_, Program>("SELECT * FROM programs WHERE id = $1 AND coach_id = $2")
            .bind(program_id)
            .bind(coach_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound("Program"))
    }

    async fn load_detail(&self, program: Program) -> AppResult<ProgramDetail> {
        let weeks = sqlx::query_as::<_, ProgramWeek>(
            "SELECT * FROM program_weeks WHERE program_id = $1 ORDER BY week_number",
        )
        .bind(program.id)
        .fetch_all(&self.db)
        .await?;

        let days = sqlx::query_as::<_, ProgramDay>(
            r#"
            SELECT d.* FROM program_days d
            JOIN program_weeks w ON w.id = d.week_id
            WHERE w.program_id = $1
            ORDER BY d.day_number
            "#,
        )
        .bind(program.id)
        .fetch_all(&self.db)
        .await?;

        let drills = sqlx::query_as::<_, ProgramDrill>(
            r#"
            SELECT dr.* FROM program_drills dr
            JOIN program_days d ON d.id = dr.day_id
            JOIN program_weeks w ON w.id = d.week_id
            WHERE w.program_id = $1
            ORDER BY dr.position
            "#,
        )
        .bind(program.id)
        .fetch_all(&self.db)
        .await?;

        Ok(assemble_detail(program, weeks, days, drills))
    }

    /// Library items and routines referenced by drills must belong to the coach
    async fn check_references(&self, coach_id: Uuid, weeks: &[WeekInput]) -> AppResult<()> {
        let mut library_items = HashSet::new();
        let mut routines = HashSet::new();
        for drill in weeks.iter().flat_map(|w| w.drill_refs()) {
            if let Some(id) = drill.library_item_id {
                library_items.insert(id);
            }
            if let Some(id) = drill.routine_id {
                routines.insert(id);
            }
        }

        for id in library_items {
            ensure_owned(&self.db, OwnedTable::LibraryItems, coach_id, id).await?;
        }
        for id in routines {
            ensure_owned(&self.db, OwnedTable::Routines, coach_id, id).await?;
        }
        Ok(())
    }

    pub async fn create(&self, coach_id: Uuid, request: CreateProgramRequest) -> AppResult<ProgramDetail> {
        self.check_references(coach_id, &request.weeks).await?;

        let mut tx = self.db.begin().await?;

        let program = sqlx::query_as::<_, Program>(
            r#"
            INSERT INTO programs (id, coach_id, title, description, level, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(coach_id)
        .bind(request.title.trim())
        .bind(request.description)
        .bind(request.level)
        .bind(request.status.unwrap_or(ProgramStatus::Draft))
        .fetch_one(&mut *tx)
        .await?;

        insert_structure(&mut tx, program.id, &request.weeks).await?;
        tx.commit().await?;

        let detail = self.load_detail(program).await?;
        info!(
            %coach_id,
            program_id = %detail.program.id,
            weeks = detail.weeks.len(),
            drills = detail.drill_count(),
            "Created program"
        );
        Ok(detail)
    }

    pub async fn update(&self, coach_id: Uuid, program_id: Uuid, request: UpdateProgramRequest) -> AppResult<Program> {
        sqlx::query_as::<_, Program>(
            r#"
            UPDATE programs SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                level = COALESCE($5, level),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1 AND coach_id = $2
            RETURNING *
            "#,
        )
        .bind(program_id)
        .bind(coach_id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.level)
        .bind(request.status)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Program"))
    }

    /// Swap the whole week/day/drill tree in one transaction. Completions of
    /// removed drills go with them.
    pub async fn replace_structure(&self, coach_id: Uuid, program_id: Uuid, weeks: Vec<WeekInput>) -> AppResult<ProgramDetail> {
        let program = self.owned_program(coach_id, program_id).await?;
        self.check_references(coach_id, &weeks).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM program_weeks WHERE program_id = $1")
            .bind(program_id)
            .execute(&mut *tx)
            .await?;

        insert_structure(&mut tx, program_id, &weeks).await?;

        sqlx::query("UPDATE programs SET updated_at = NOW() WHERE id = $1")
            .bind(program_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(%program_id, weeks = weeks.len(), "Replaced program structure");
        self.load_detail(program).await
    }

    /// Copy as a draft with " (copy)" appended; assignments are not copied
    pub async fn duplicate(&self, coach_id: Uuid, program_id: Uuid) -> AppResult<ProgramDetail> {
        let source = self.get(coach_id, program_id).await?;
        let weeks = structure_inputs(&source);

        let mut tx = self.db.begin().await?;

        let copy = sqlx::query_as::<_, Program>(
            r#"
            INSERT INTO programs (id, coach_id, title, description, level, status)
            VALUES ($1, $2, $3, $4, $5, 'draft')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(coach_id)
        .bind(format!("{} (copy)", source.program.title))
        .bind(&source.program.description)
        .bind(&source.program.level)
        .fetch_one(&mut *tx)
        .await?;

        insert_structure(&mut tx, copy.id, &weeks).await?;
        tx.commit().await?;

        info!(source_id = %program_id, copy_id = %copy.id, "Duplicated program");
        self.load_detail(copy).await
    }

    pub async fn delete(&self, coach_id: Uuid, program_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM programs WHERE id = $1 AND coach_id = $2")
            .bind(program_id)
            .bind(coach_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Program"));
        }
        Ok(())
    }

    pub async fn assign(&self, coach_id: Uuid, program_id: Uuid, request: AssignProgramRequest) -> AppResult<ProgramAssignment> {
        let program = self.owned_program(coach_id, program_id).await?;
        let client = active_owned_client(&self.db, coach_id, request.client_id).await?;

        let assignment = sqlx::query_as::<_, ProgramAssignment>(
            r#"
            INSERT INTO program_assignments (id, program_id, client_id, start_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(program_id)
        .bind(client.id)
        .bind(request.start_date)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "Program is already assigned to this client"))?;

        if let Some(user_id) = client.user_id {
            self.notifications.dispatch(
                NewNotification::new(
                    user_id,
                    NotificationKind::ProgramAssigned,
                    "New program assigned",
                    format!("\"{}\" starts on {}", program.title, request.start_date),
                )
                .with_data(serde_json::json!({
                    "program_id": program.id,
                    "assignment_id": assignment.id,
                })),
            );
        }

        info!(%program_id, client_id = %client.id, "Assigned program");
        Ok(assignment)
    }

    pub async fn unassign(&self, coach_id: Uuid, program_id: Uuid, client_id: Uuid) -> AppResult<()> {
        self.owned_program(coach_id, program_id).await?;
        owned_client(&self.db, coach_id, client_id).await?;

        let result = sqlx::query("DELETE FROM program_assignments WHERE program_id = $1 AND client_id = $2")
            .bind(program_id)
            .bind(client_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Program assignment"));
        }
        Ok(())
    }

    pub async fn assignments(&self, coach_id: Uuid, program_id: Uuid) -> AppResult<Vec<AssignmentWithClient>> {
        self.owned_program(coach_id, program_id).await?;

        let assignments = sqlx::query_as::<_, AssignmentWithClient>(
            r#"
            SELECT a.id, a.program_id, a.client_id, c.name AS client_name,
                   a.start_date, a.status, a.assigned_at, a.completed_at
            FROM program_assignments a
            JOIN clients c ON c.id = a.client_id
            WHERE a.program_id = $1
            ORDER BY a.assigned_at DESC
            "#,
        )
        .bind(program_id)
        .fetch_all(&self.db)
        .await?;

        Ok(assignments)
    }

    /// Program-day projection of one assignment
    pub async fn calendar(
        &self,
        session: &UserSession,
        assignment_id: Uuid,
        query: &CalendarQuery,
    ) -> AppResult<BTreeMap<String, Vec<CalendarDrill>>> {
        let range = match (query.from, query.to) {
            (Some(from), Some(to)) if from > to => {
                return Err(AppError::bad_request("`from` must not be after `to`"));
            }
            (Some(from), Some(to)) => Some((from, to)),
            (Some(from), None) => Some((from, NaiveDate::MAX)),
            (None, Some(to)) => Some((NaiveDate::MIN, to)),
            (None, None) => None,
        };

        let assignment = visible_assignment(&self.db, session, assignment_id).await?;
        let rows = scheduled_drills(&self.db, assignment.program_id).await?;
        let replaced = replaced_days(&self.db, assignment.id).await?;
        let completed = completed_drills(&self.db, assignment.id).await?;

        Ok(project_calendar(assignment.start_date, &rows, &replaced, &completed, range))
    }
}

async fn insert_structure(
    tx: &mut Transaction<'_, Postgres>,
    program_id: Uuid,
    weeks: &[WeekInput],
) -> AppResult<()> {
    for week in weeks {
        let week_id = Uuid::new_v4();
        sqlx::query("INSERT INTO program_weeks (id, program_id, week_number, title) VALUES ($1, $2, $3, $4)")
            .bind(week_id)
            .bind(program_id)
            .bind(week.week_number)
            .bind(&week.title)
            .execute(&mut **tx)
            .await?;

        for day in &week.days {
            let day_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO program_days (id, week_id, day_number, title, is_rest_day) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(day_id)
            .bind(week_id)
            .bind(day.day_number)
            .bind(&day.title)
            .bind(day.is_rest_day)
            .execute(&mut **tx)
            .await?;

            for (index, drill) in day.drills.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO program_drills (
                        id, day_id, position, title, description, duration_minutes, library_item_id, routine_id
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(day_id)
                .bind(index as i32 + 1)
                .bind(&drill.title)
                .bind(&drill.description)
                .bind(drill.duration_minutes)
                .bind(drill.library_item_id)
                .bind(drill.routine_id)
                .execute(&mut **tx)
                .await?;
            }
        }
    }
    Ok(())
}

fn assemble_detail(
    program: Program,
    weeks: Vec<ProgramWeek>,
    days: Vec<ProgramDay>,
    drills: Vec<ProgramDrill>,
) -> ProgramDetail {
    let mut drills_by_day: HashMap<Uuid, Vec<ProgramDrill>> = HashMap::new();
    for drill in drills {
        drills_by_day.entry(drill.day_id).or_default().push(drill);
    }

    let mut days_by_week: HashMap<Uuid, Vec<DayDetail>> = HashMap::new();
    for day in days {
        let drills = drills_by_day.remove(&day.id).unwrap_or_default();
        days_by_week.entry(day.week_id).or_default().push(DayDetail { day, drills });
    }

    let weeks = weeks
        .into_iter()
        .map(|week| {
            let days = days_by_week.remove(&week.id).unwrap_or_default();
            WeekDetail { week, days }
        })
        .collect();

    ProgramDetail { program, weeks }
}

fn structure_inputs(detail: &ProgramDetail) -> Vec<WeekInput> {
    use crate::models::{DayInput, DrillInput};

    detail
        .weeks
        .iter()
        .map(|week| WeekInput {
            week_number: week.week.week_number,
            title: week.week.title.clone(),
            days: week
                .days
                .iter()
                .map(|day| DayInput {
                    day_number: day.day.day_number,
                    title: day.day.title.clone(),
                    is_rest_day: day.day.is_rest_day,
                    drills: day
                        .drills
                        .iter()
                        .map(|drill| DrillInput {
                            title: drill.title.clone(),
                            description: drill.description.clone(),
                            duration_minutes: drill.duration_minutes,
                            library_item_id: drill.library_item_id,
                            routine_id: drill.routine_id,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

/// Every drill of a program in stored order (week, day, position)
pub async fn scheduled_drills(db: &PgPool, program_id: Uuid) -> AppResult<Vec<ScheduledDrillRow>> {
    let rows = sqlx::query_as::<_, ScheduledDrillRow>(
        r#"
        SELECT
            d.id AS day_id, w.week_number, d.day_number,
            dr.id AS drill_id, dr.position, dr.title, dr.description,
            dr.duration_minutes, dr.library_item_id, dr.routine_id
        FROM program_weeks w
        JOIN program_days d ON d.week_id = w.id
        JOIN program_drills dr ON dr.day_id = d.id
        WHERE w.program_id = $1
        ORDER BY w.week_number, d.day_number, dr.position
        "#,
    )
    .bind(program_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

pub async fn replaced_days(db: &PgPool, assignment_id: Uuid) -> AppResult<HashSet<Uuid>> {
    let days: Vec<Uuid> = sqlx::query_scalar("SELECT day_id FROM day_replacements WHERE assignment_id = $1")
        .bind(assignment_id)
        .fetch_all(db)
        .await?;
    Ok(days.into_iter().collect())
}

pub async fn completed_drills(db: &PgPool, assignment_id: Uuid) -> AppResult<HashSet<Uuid>> {
    let drills: Vec<Uuid> = sqlx::query_scalar("SELECT drill_id FROM drill_completions WHERE assignment_id = $1")
        .bind(assignment_id)
        .fetch_all(db)
        .await?;
    Ok(drills.into_iter().collect())
}

pub async fn assignment_context(db: &PgPool, assignment_id: Uuid) -> AppResult<Option<AssignmentContext>> {
    let assignment = sqlx::query_as::<_, AssignmentContext>(
        r#"
        SELECT a.id, a.program_id, p.title AS program_title, p.coach_id,
               a.client_id, c.user_id AS client_user_id, a.start_date, a.status
        FROM program_assignments a
        JOIN programs p ON p.id = a.program_id
        JOIN clients c ON c.id = a.client_id
        WHERE a.id = $1
        "#,
    )
    .bind(assignment_id)
    .fetch_optional(db)
    .await?;

    Ok(assignment)
}

/// Owning coach, the linked client user, or an admin
pub async fn visible_assignment(db: &PgPool, session: &UserSession, assignment_id: Uuid) -> AppResult<AssignmentContext> {
    assignment_context(db, assignment_id)
        .await?
        .filter(|a| {
            session.is_admin() || a.coach_id == session.user_id || a.client_user_id == Some(session.user_id)
        })
        .ok_or(AppError::NotFound("Program assignment"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_assemble_detail_nests_rows_in_order() {
        let now = Utc::now();
        let program = Program {
            id: Uuid::new_v4(),
            coach_id: Uuid::new_v4(),
            title: "Return of serve".to_string(),
            description: None,
            level: Some("intermediate".to_string()),
            status: ProgramStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let week = ProgramWeek { id: Uuid::new_v4(), program_id: program.id, week_number: 1, title: None };
        let day = ProgramDay { id: Uuid::new_v4(), week_id: week.id, day_number: 2, title: None, is_rest_day: false };
        let drill = |position: i32, title: &str| ProgramDrill {
            id: Uuid::new_v4(),
            day_id: day.id,
            position,
            title: title.to_string(),
            description: None,
            duration_minutes: None,
            library_item_id: None,
            routine_id: None,
        };
        let drills = vec![drill(1, "Split step"), drill(2, "Block return")];

        let detail = assemble_detail(program, vec![week.clone()], vec![day.clone()], drills);

        assert_eq!(detail.weeks.len(), 1);
        assert_eq!(detail.weeks[0].days[0].day.day_number, 2);
        assert_eq!(detail.drill_count(), 2);
        assert_eq!(detail.weeks[0].days[0].drills[1].title, "Block return");

        let inputs = structure_inputs(&detail);
        assert_eq!(inputs[0].days[0].drills.len(), 2);
        assert_eq!(inputs[0].week_number, 1);
    }
}
