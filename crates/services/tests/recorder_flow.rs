use std::sync::Arc;

use chrono::Duration;
use reading_core::model::{Chapter, ChapterId, SubjectId, UNKNOWN_SUBJECT_NAME, UserId};
use reading_core::time::fixed_now;
use services::{
    AdminPolicy, AppServices, AuthError, Clock, IdentityProvider, RecordOutcome, RecorderError,
    TokenIdentity,
};
use storage::repository::{
    HistoryRepository, InMemoryRepository, NewSubjectRecord, Storage, SubjectRepository,
};

const READER: &str = "reader-1";

fn reader() -> UserId {
    UserId::new(READER).unwrap()
}

/// Storage seeded with "Math" holding Algebra at 40 of 100 minutes.
async fn seeded() -> (InMemoryRepository, SubjectId) {
    let repo = InMemoryRepository::new();
    let algebra = Chapter::from_persisted(ChapterId::new(1), "Algebra", 100, 40.0, false).unwrap();
    let geometry = Chapter::from_persisted(ChapterId::new(2), "Geometry", 0, 0.0, false).unwrap();
    let id = repo
        .insert_new_subject(
            &reader(),
            NewSubjectRecord {
                name: "Math".into(),
                chapters: vec![algebra, geometry],
                created_at: fixed_now(),
            },
        )
        .await
        .unwrap();
    (repo, id)
}

async fn services_for(repo: &InMemoryRepository) -> AppServices {
    AppServices::bootstrap(
        Storage::from_in_memory(repo.clone()),
        Arc::new(TokenIdentity::new(READER)),
        AdminPolicy::default(),
        Clock::fixed(fixed_now()),
    )
    .await
    .unwrap()
}

async fn algebra(repo: &InMemoryRepository, id: SubjectId) -> Chapter {
    repo.get_subject(&reader(), id).await.unwrap().unwrap().chapters()[0].clone()
}

#[tokio::test]
async fn recording_half_hour_advances_chapter() {
    let (repo, id) = seeded().await;
    let app = services_for(&repo).await;

    assert!(app.recorder().record_reading(id, "Algebra", 1800).await);

    let history = repo.list_history(&reader()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!((history[0].duration_minutes - 30.0).abs() < 0.01);
    assert_eq!(history[0].subject_name, "Math");
    assert_eq!(history[0].chapter_name, "Algebra");
    assert_eq!(history[0].chapter_id, Some(ChapterId::new(1)));
    assert_eq!(history[0].recorded_at, fixed_now());
    assert_eq!(history[0].user_id, reader());

    let chapter = algebra(&repo, id).await;
    assert!((chapter.read() - 70.0).abs() < 1e-9);
    assert!(!chapter.is_completed());
}

#[tokio::test]
async fn second_recording_completes_chapter() {
    let (repo, id) = seeded().await;
    let app = services_for(&repo).await;

    assert!(app.recorder().record_reading(id, "Algebra", 1800).await);
    assert!(app.recorder().record_reading(id, "Algebra", 1800).await);

    let chapter = algebra(&repo, id).await;
    assert!((chapter.read() - 100.0).abs() < 1e-9);
    assert!(chapter.is_completed());

    let history = repo.list_history(&reader()).await.unwrap();
    let for_chapter = history.iter().filter(|r| r.chapter_name == "Algebra").count();
    assert_eq!(for_chapter, 2);
    assert_ne!(history[0].id, history[1].id);
}

#[tokio::test]
async fn sub_second_session_is_skipped() {
    let (repo, id) = seeded().await;
    let app = services_for(&repo).await;

    let outcome = app.recorder().try_record_reading(id, "Algebra", 0).await.unwrap();
    assert_eq!(outcome, RecordOutcome::Skipped);
    assert!(!app.recorder().record_reading(id, "Algebra", 0).await);

    assert!(repo.list_history(&reader()).await.unwrap().is_empty());
    assert!((algebra(&repo, id).await.read() - 40.0).abs() < 1e-9);
}

#[tokio::test]
async fn injected_failure_writes_nothing() {
    let (repo, id) = seeded().await;
    let app = services_for(&repo).await;
    repo.fail_next_commit();

    assert!(!app.recorder().record_reading(id, "Algebra", 1800).await);

    assert!(repo.list_history(&reader()).await.unwrap().is_empty());
    assert!((algebra(&repo, id).await.read() - 40.0).abs() < 1e-9);
    assert!(app.live().history().is_empty());

    // The preserved duration can be retried.
    assert!(app.recorder().record_reading(id, "Algebra", 1800).await);
    assert_eq!(repo.list_history(&reader()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn recording_by_chapter_id_survives_rename_lookups() {
    let (repo, id) = seeded().await;
    let app = services_for(&repo).await;

    let outcome = app
        .recorder()
        .try_record_reading(id, ChapterId::new(2), 90)
        .await
        .unwrap();

    let RecordOutcome::Recorded(session) = outcome else {
        panic!("expected a recorded session");
    };
    let chapter = session.chapter.expect("chapter updated");
    assert_eq!(chapter.name(), "Geometry");
    assert!((chapter.read() - 1.5).abs() < 1e-9);
    // No target set, so completion is not derived.
    assert!(!chapter.is_completed());

    let history = repo.list_history(&reader()).await.unwrap();
    assert_eq!(history[0].chapter_name, "Geometry");
}

#[tokio::test]
async fn stale_snapshot_still_names_chapter_from_store() {
    let (repo, _) = seeded().await;
    let app = services_for(&repo).await;
    // Written behind the live store's back, so its snapshot does not know it.
    let chapter = Chapter::from_persisted(ChapterId::new(1), "Sonnets", 0, 0.0, false).unwrap();
    let late = repo
        .insert_new_subject(
            &reader(),
            NewSubjectRecord {
                name: "Poetry".into(),
                chapters: vec![chapter],
                created_at: fixed_now(),
            },
        )
        .await
        .unwrap();

    assert!(app.recorder().record_reading(late, ChapterId::new(1), 120).await);

    let history = repo.list_history(&reader()).await.unwrap();
    assert_eq!(history[0].chapter_id, Some(ChapterId::new(1)));
    assert_eq!(history[0].chapter_name, "Sonnets");
    assert_eq!(history[0].subject_name, UNKNOWN_SUBJECT_NAME);
}

#[tokio::test]
async fn unknown_subject_records_with_sentinel_name() {
    let (repo, _) = seeded().await;
    let app = services_for(&repo).await;

    let outcome = app
        .recorder()
        .try_record_reading(SubjectId::new(999), "Algebra", 120)
        .await
        .unwrap();
    let RecordOutcome::Recorded(session) = outcome else {
        panic!("expected a recorded session");
    };
    assert!(session.chapter.is_none());

    let history = repo.list_history(&reader()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].subject_name, UNKNOWN_SUBJECT_NAME);
}

#[tokio::test]
async fn unknown_chapter_leaves_progress_alone() {
    let (repo, id) = seeded().await;
    let app = services_for(&repo).await;

    assert!(app.recorder().record_reading(id, "Calculus", 600).await);

    assert_eq!(repo.list_history(&reader()).await.unwrap().len(), 1);
    let subject = repo.get_subject(&reader(), id).await.unwrap().unwrap();
    assert!((subject.chapters()[0].read() - 40.0).abs() < 1e-9);
    assert!(subject.chapters()[1].read().abs() < f64::EPSILON);
}

#[tokio::test]
async fn live_collections_follow_recordings() {
    let (repo, id) = seeded().await;
    let app = services_for(&repo).await;
    let mut history_rx = app.live().subscribe_history();
    let mut subjects_rx = app.live().subscribe_subjects();
    history_rx.borrow_and_update();
    subjects_rx.borrow_and_update();

    assert!(app.recorder().record_reading(id, "Algebra", 600).await);

    assert!(history_rx.has_changed().unwrap());
    assert_eq!(history_rx.borrow_and_update().len(), 1);
    assert!(subjects_rx.has_changed().unwrap());
    let subjects = subjects_rx.borrow_and_update().clone();
    assert!((subjects[0].chapters()[0].read() - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn recorder_requires_signed_in_user() {
    let (repo, id) = seeded().await;
    let identity: Arc<dyn IdentityProvider> = Arc::new(TokenIdentity::new(READER));
    let live = Arc::new(services::LiveStore::new(Storage::from_in_memory(repo.clone())));
    let recorder = services::SessionRecorder::new(
        Clock::fixed(fixed_now()),
        identity,
        Arc::new(repo.clone()),
        live,
    );

    let err = recorder.try_record_reading(id, "Algebra", 60).await.unwrap_err();
    assert!(matches!(err, RecorderError::Auth(AuthError::NotSignedIn)));
    assert!(repo.list_history(&reader()).await.unwrap().is_empty());
}

#[tokio::test]
async fn recorded_sessions_show_up_in_stats() {
    let (repo, id) = seeded().await;
    let app = services_for(&repo).await;

    assert!(app.recorder().record_reading(id, "Algebra", 2700).await);
    let stats = app.reports().stats(&(fixed_now() + Duration::days(3)));

    let nonzero: Vec<_> = stats.chart.iter().filter(|d| d.minutes > 0.0).collect();
    assert_eq!(stats.chart.len(), 7);
    assert_eq!(nonzero.len(), 1);
    assert!((nonzero[0].minutes - 45.0).abs() < 1e-9);
    assert!((stats.total_minutes - 45.0).abs() < 1e-9);
}
