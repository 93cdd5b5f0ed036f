mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use coach_platform::auth::UserRole;
use coach_platform::errors::AppError;
use coach_platform::models::*;
use pretty_assertions::assert_eq;
use serial_test::serial;

use common::*;

#[tokio::test]
#[serial]
async fn test_coaches_cannot_see_each_others_data() {
    init_test_logging();
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let coach_a = create_user(&pool, UserRole::Coach).await;
    let coach_b = create_user(&pool, UserRole::Coach).await;

    let client = ctx.clients.create(coach_a.user_id, client_request(None)).await.unwrap();
    let program = ctx
        .programs
        .create(coach_a.user_id, program_request(vec![week(1, vec![day(1, vec![drill("Serve")])])]))
        .await
        .unwrap();

    assert_matches!(ctx.clients.get(coach_b.user_id, client.id).await, Err(AppError::NotFound(_)));
    assert_matches!(
        ctx.programs.get(coach_b.user_id, program.program.id).await,
        Err(AppError::NotFound(_))
    );
    assert_matches!(
        ctx.events
            .create(coach_b.user_id, lesson_request(Some(client.id), Utc::now() + Duration::days(2)))
            .await,
        Err(AppError::NotFound(_))
    );

    let listed = ctx
        .clients
        .list(coach_b.user_id, &ClientQuery { status: None, search: None })
        .await
        .unwrap();
    assert!(listed.iter().all(|c| c.id != client.id));
}

#[tokio::test]
#[serial]
async fn test_archive_removes_everything_scheduled_for_the_client() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let coach = create_user(&pool, UserRole::Coach).await;
    let client_user = create_user(&pool, UserRole::Client).await;
    let client = ctx
        .clients
        .create(coach.user_id, client_request(Some(client_user.user_id)))
        .await
        .unwrap();

    ctx.events
        .create(coach.user_id, lesson_request(Some(client.id), Utc::now() + Duration::days(3)))
        .await
        .unwrap();
    let program = ctx
        .programs
        .create(coach.user_id, program_request(vec![week(1, vec![day(1, vec![drill("Serve")])])]))
        .await
        .unwrap();
    ctx.programs
        .assign(
            coach.user_id,
            program.program.id,
            AssignProgramRequest { client_id: client.id, start_date: Utc::now().date_naive() },
        )
        .await
        .unwrap();

    let routine = ctx
        .routines
        .create(
            coach.user_id,
            CreateRoutineRequest { name: "Morning mobility".to_string(), description: None, exercises: vec![] },
        )
        .await
        .unwrap();
    ctx.routines
        .assign(
            coach.user_id,
            routine.routine.id,
            AssignRoutineRequest { client_ids: vec![client.id], start_date: None, notes: None },
        )
        .await
        .unwrap();

    let item = ctx
        .library
        .create(
            coach.user_id,
            CreateLibraryItemRequest {
                title: Some("Split step".to_string()),
                description: None,
                category: None,
                kind: LibraryItemKind::Link,
                url: "https://example.com/split-step".to_string(),
                storage_key: None,
            },
        )
        .await
        .unwrap();
    ctx.library
        .assign(coach.user_id, item.id, AssignLibraryItemRequest { client_ids: vec![client.id], notes: None })
        .await
        .unwrap();

    let (archived, summary) = ctx.clients.archive(coach.user_id, client.id).await.unwrap();

    assert_eq!(archived.status, ClientStatus::Archived);
    assert!(archived.archived_at.is_some());
    assert_eq!(
        summary,
        ArchiveSummary {
            events_deleted: 1,
            program_assignments_deleted: 1,
            routine_assignments_deleted: 1,
            video_assignments_deleted: 1,
        }
    );

    let (_, again) = ctx.clients.archive(coach.user_id, client.id).await.unwrap();
    assert_eq!(again, ArchiveSummary::default());

    for table in ["events", "routine_assignments", "video_assignments"] {
        let remaining: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE client_id = $1", table))
            .bind(client.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0, "{} left behind", table);
    }
}

#[tokio::test]
#[serial]
async fn test_swap_request_is_approved_only_once() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let coach = create_user(&pool, UserRole::Coach).await;
    let alice = create_user(&pool, UserRole::Client).await;
    let bob = create_user(&pool, UserRole::Client).await;

    let alice_client = ctx.clients.create(coach.user_id, client_request(Some(alice.user_id))).await.unwrap();
    let bob_client = ctx.clients.create(coach.user_id, client_request(Some(bob.user_id))).await.unwrap();

    let base = Utc::now() + Duration::days(5);
    let alice_lesson = ctx
        .events
        .create(coach.user_id, lesson_request(Some(alice_client.id), base))
        .await
        .unwrap();
    let bob_lesson = ctx
        .events
        .create(coach.user_id, lesson_request(Some(bob_client.id), base + Duration::hours(3)))
        .await
        .unwrap();

    let swap = ctx
        .swaps
        .request_swap(
            alice.user_id,
            CreateSwapRequest {
                requester_event_id: alice_lesson.id,
                target_event_id: bob_lesson.id,
                message: Some("Can we trade?".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(swap.status, SwapStatus::Pending);

    let duplicate = ctx
        .swaps
        .request_swap(
            alice.user_id,
            CreateSwapRequest {
                requester_event_id: alice_lesson.id,
                target_event_id: bob_lesson.id,
                message: None,
            },
        )
        .await;
    assert_matches!(duplicate, Err(AppError::Conflict(_)));

    let approved = ctx.swaps.respond(&bob, swap.id, true).await.unwrap();
    assert_eq!(approved.status, SwapStatus::Approved);

    let moved_alice = ctx.events.get_owned(coach.user_id, alice_lesson.id).await.unwrap();
    let moved_bob = ctx.events.get_owned(coach.user_id, bob_lesson.id).await.unwrap();
    assert_eq!(moved_alice.client_id, Some(bob_client.id));
    assert_eq!(moved_bob.client_id, Some(alice_client.id));

    assert_matches!(ctx.swaps.respond(&bob, swap.id, true).await, Err(AppError::Conflict(_)));
    assert_matches!(ctx.swaps.respond(&coach, swap.id, false).await, Err(AppError::Conflict(_)));
}

#[tokio::test]
#[serial]
async fn test_drill_completion_is_idempotent_and_finishes_the_assignment() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let coach = create_user(&pool, UserRole::Coach).await;
    let client_user = create_user(&pool, UserRole::Client).await;
    let client = ctx
        .clients
        .create(coach.user_id, client_request(Some(client_user.user_id)))
        .await
        .unwrap();

    let program = ctx
        .programs
        .create(
            coach.user_id,
            program_request(vec![week(1, vec![day(1, vec![drill("Warm-up"), drill("Serve targets")])])]),
        )
        .await
        .unwrap();
    let drills = &program.weeks[0].days[0].drills;

    let assignment = ctx
        .programs
        .assign(
            coach.user_id,
            program.program.id,
            AssignProgramRequest { client_id: client.id, start_date: Utc::now().date_naive() },
        )
        .await
        .unwrap();

    let complete = |drill_id| CompleteDrillRequest {
        assignment_id: assignment.id,
        drill_id,
        notes: None,
    };

    let first = ctx.workouts.complete_drill(client_user.user_id, complete(drills[0].id)).await.unwrap();
    assert!(first.completed);
    assert!(!first.already_completed);

    let repeat = ctx.workouts.complete_drill(client_user.user_id, complete(drills[0].id)).await.unwrap();
    assert!(repeat.already_completed);
    assert_eq!(repeat.assignment_status, AssignmentStatus::Active);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM drill_completions WHERE assignment_id = $1")
        .bind(assignment.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let last = ctx.workouts.complete_drill(client_user.user_id, complete(drills[1].id)).await.unwrap();
    assert_eq!(last.assignment_status, AssignmentStatus::Completed);

    let reopened = ctx
        .workouts
        .uncomplete_drill(
            client_user.user_id,
            UncompleteDrillRequest { assignment_id: assignment.id, drill_id: drills[1].id },
        )
        .await
        .unwrap();
    assert_eq!(reopened.assignment_status, AssignmentStatus::Active);
}

#[tokio::test]
#[serial]
async fn test_program_calendar_projects_days_across_leap_day() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let coach = create_user(&pool, UserRole::Coach).await;
    let client_user = create_user(&pool, UserRole::Client).await;
    let client = ctx
        .clients
        .create(coach.user_id, client_request(Some(client_user.user_id)))
        .await
        .unwrap();

    let program = ctx
        .programs
        .create(
            coach.user_id,
            program_request(vec![
                week(1, vec![day(1, vec![drill("A"), drill("B")]), day(4, vec![drill("C")])]),
                week(2, vec![day(1, vec![drill("D")])]),
            ]),
        )
        .await
        .unwrap();

    let assignment = ctx
        .programs
        .assign(
            coach.user_id,
            program.program.id,
            AssignProgramRequest { client_id: client.id, start_date: date(2024, 2, 26) },
        )
        .await
        .unwrap();

    let calendar = ctx
        .programs
        .calendar(&client_user, assignment.id, &CalendarQuery { from: None, to: None })
        .await
        .unwrap();

    let keys: Vec<&str> = calendar.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["2024-02-26", "2024-02-29", "2024-03-04"]);
    let first_day: Vec<&str> = calendar["2024-02-26"].iter().map(|d| d.title.as_str()).collect();
    assert_eq!(first_day, vec!["A", "B"]);

    let ranged = ctx
        .programs
        .calendar(
            &coach,
            assignment.id,
            &CalendarQuery { from: Some(date(2024, 2, 27)), to: Some(date(2024, 3, 3)) },
        )
        .await
        .unwrap();
    assert_eq!(ranged.keys().cloned().collect::<Vec<_>>(), vec!["2024-02-29".to_string()]);

    let stranger = create_user(&pool, UserRole::Client).await;
    assert_matches!(
        ctx.programs
            .calendar(&stranger, assignment.id, &CalendarQuery { from: None, to: None })
            .await,
        Err(AppError::NotFound(_))
    );
}

#[tokio::test]
#[serial]
async fn test_swap_past_its_expiry_cannot_be_answered() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let coach = create_user(&pool, UserRole::Coach).await;
    let alice = create_user(&pool, UserRole::Client).await;
    let bob = create_user(&pool, UserRole::Client).await;

    let alice_client = ctx.clients.create(coach.user_id, client_request(Some(alice.user_id))).await.unwrap();
    let bob_client = ctx.clients.create(coach.user_id, client_request(Some(bob.user_id))).await.unwrap();

    let base = Utc::now() + Duration::days(6);
    let alice_lesson = ctx
        .events
        .create(coach.user_id, lesson_request(Some(alice_client.id), base))
        .await
        .unwrap();
    let bob_lesson = ctx
        .events
        .create(coach.user_id, lesson_request(Some(bob_client.id), base + Duration::hours(2)))
        .await
        .unwrap();

    let backdate = |id: uuid::Uuid| {
        sqlx::query("UPDATE time_swap_requests SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
            .bind(id)
            .execute(&pool)
    };
    let status_of = |id: uuid::Uuid| {
        sqlx::query_as::<_, TimeSwapRequest>("SELECT * FROM time_swap_requests WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
    };

    let stale = ctx
        .swaps
        .request_swap(
            alice.user_id,
            CreateSwapRequest { requester_event_id: alice_lesson.id, target_event_id: bob_lesson.id, message: None },
        )
        .await
        .unwrap();
    backdate(stale.id).await.unwrap();

    assert_matches!(ctx.swaps.respond(&bob, stale.id, true).await, Err(AppError::Conflict(_)));
    assert_eq!(status_of(stale.id).await.unwrap().status, SwapStatus::Expired);

    let untouched = ctx.events.get_owned(coach.user_id, alice_lesson.id).await.unwrap();
    assert_eq!(untouched.client_id, Some(alice_client.id));

    let overdue = ctx
        .swaps
        .request_swap(
            bob.user_id,
            CreateSwapRequest { requester_event_id: bob_lesson.id, target_event_id: alice_lesson.id, message: None },
        )
        .await
        .unwrap();
    backdate(overdue.id).await.unwrap();

    let expired = ctx.swaps.expire_due().await.unwrap();
    assert!(expired.iter().any(|s| s.id == overdue.id));
    assert!(expired.iter().all(|s| s.status == SwapStatus::Expired));
    assert_eq!(status_of(overdue.id).await.unwrap().status, SwapStatus::Expired);

    let again = ctx.swaps.expire_due().await.unwrap();
    assert!(again.iter().all(|s| s.id != overdue.id));
}

#[tokio::test]
#[serial]
async fn test_notifications_are_only_visible_to_their_owner() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let owner = create_user(&pool, UserRole::Client).await;
    let other = create_user(&pool, UserRole::Client).await;

    let notification = ctx
        .notifications
        .notify(NewNotification::new(owner.user_id, NotificationKind::SwapApproved, "Swap approved", "See you Tuesday"))
        .await
        .unwrap()
        .unwrap();

    assert_matches!(
        ctx.notifications.mark_read(other.user_id, notification.id).await,
        Err(AppError::NotFound(_))
    );
    assert_matches!(
        ctx.notifications.delete(other.user_id, notification.id).await,
        Err(AppError::NotFound(_))
    );

    let unread = ctx
        .notifications
        .list(owner.user_id, &NotificationQuery { unread_only: true, limit: None })
        .await
        .unwrap();
    assert!(unread.iter().any(|n| n.id == notification.id));

    let read = ctx.notifications.mark_read(owner.user_id, notification.id).await.unwrap();
    assert!(read.read_at.is_some());
    ctx.notifications.delete(owner.user_id, notification.id).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_replaced_days_leave_progress_and_completion() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let coach = create_user(&pool, UserRole::Coach).await;
    let client_user = create_user(&pool, UserRole::Client).await;
    let client = ctx
        .clients
        .create(coach.user_id, client_request(Some(client_user.user_id)))
        .await
        .unwrap();

    let program = ctx
        .programs
        .create(
            coach.user_id,
            program_request(vec![week(1, vec![day(1, vec![drill("Footwork")]), day(2, vec![drill("Serve")])])]),
        )
        .await
        .unwrap();
    let first_day = &program.weeks[0].days[0];
    let second_day = &program.weeks[0].days[1];

    let assignment = ctx
        .programs
        .assign(
            coach.user_id,
            program.program.id,
            AssignProgramRequest { client_id: client.id, start_date: Utc::now().date_naive() },
        )
        .await
        .unwrap();

    let lesson = ctx
        .events
        .create(coach.user_id, lesson_request(Some(client.id), Utc::now() + Duration::days(1)))
        .await
        .unwrap();
    ctx.events
        .replace_program_day(
            coach.user_id,
            lesson.id,
            ReplaceDayRequest { assignment_id: assignment.id, day_id: second_day.day.id },
        )
        .await
        .unwrap();

    let result = ctx
        .workouts
        .complete_drill(
            client_user.user_id,
            CompleteDrillRequest { assignment_id: assignment.id, drill_id: first_day.drills[0].id, notes: None },
        )
        .await
        .unwrap();
    assert_eq!(result.assignment_status, AssignmentStatus::Completed);

    let progress = ctx.progress.assignment_progress(&client_user, assignment.id).await.unwrap();
    assert_eq!(progress.total_drills, 1);
    assert_eq!(progress.completed_drills, 1);
    assert_eq!(progress.completion_percentage, 100.0);
}

#[tokio::test]
#[serial]
async fn test_resync_keeps_the_role_an_admin_assigned() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let admin = create_user(&pool, UserRole::Admin).await;
    let member = create_user(&pool, UserRole::Client).await;

    let promoted = ctx.admin.set_role(admin.user_id, member.user_id, UserRole::Coach).await.unwrap();
    assert_eq!(promoted.role, UserRole::Coach);

    // Token still carries the old role
    ctx.users
        .sync(&member, SyncUserRequest { name: Some("Renamed".to_string()), avatar_url: None })
        .await
        .unwrap();

    let stored = ctx.users.me(member.user_id).await.unwrap();
    assert_eq!(stored.role, UserRole::Coach);
    assert_eq!(stored.name.as_deref(), Some("Renamed"));
}

#[tokio::test]
#[serial]
async fn test_clients_link_only_to_client_logins() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let coach = create_user(&pool, UserRole::Coach).await;
    let rival = create_user(&pool, UserRole::Coach).await;
    let admin = create_user(&pool, UserRole::Admin).await;
    let client_user = create_user(&pool, UserRole::Client).await;

    for user_id in [rival.user_id, admin.user_id, uuid::Uuid::new_v4()] {
        assert_matches!(
            ctx.clients.create(coach.user_id, client_request(Some(user_id))).await,
            Err(AppError::NotFound(_))
        );
    }

    let client = ctx
        .clients
        .create(coach.user_id, client_request(Some(client_user.user_id)))
        .await
        .unwrap();
    assert_eq!(client.user_id, Some(client_user.user_id));

    assert_matches!(
        ctx.clients
            .update(
                coach.user_id,
                client.id,
                UpdateClientRequest { user_id: Some(rival.user_id), ..Default::default() },
            )
            .await,
        Err(AppError::NotFound(_))
    );
}

#[tokio::test]
#[serial]
async fn test_overlapping_events_are_rejected_but_touching_ones_are_not() {
    let Some(pool) = test_pool().await else { return };
    let ctx = test_context(pool.clone());

    let coach = create_user(&pool, UserRole::Coach).await;
    let base = Utc::now() + Duration::days(10);

    ctx.events.create(coach.user_id, lesson_request(None, base)).await.unwrap();

    assert_matches!(
        ctx.events
            .create(coach.user_id, lesson_request(None, base + Duration::minutes(30)))
            .await,
        Err(AppError::Conflict(_))
    );

    let touching = ctx
        .events
        .create(coach.user_id, lesson_request(None, base + Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(touching.start_time, base + Duration::hours(1));

    let other_coach = create_user(&pool, UserRole::Coach).await;
    ctx.events
        .create(other_coach.user_id, lesson_request(None, base))
        .await
        .unwrap();
}
