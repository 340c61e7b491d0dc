use edu_control::RoleChange;
use edu_models::{EduError, LessonDraft, Role, SerieDraft, UpdateUserRequest};
use edu_testsupport::{file_store, test_store};

fn profile(name: &str, email: &str) -> UpdateUserRequest {
    UpdateUserRequest {
        name: Some(name.into()),
        email: Some(email.into()),
        ..Default::default()
    }
}

fn draft(title: &str, published: bool) -> SerieDraft {
    SerieDraft {
        serie_title: title.into(),
        serie_description: format!("About {title}"),
        is_publish: published,
    }
}

fn lesson(title: &str) -> LessonDraft {
    LessonDraft {
        lesson_title: title.into(),
        lesson_content: "content".into(),
    }
}

#[tokio::test]
async fn user_profiles_insert_once_and_merge_updates() {
    let store = test_store().await.unwrap();

    let user = store.insert_user("u1", &profile("Lan", "lan@example.com")).await.unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.user_id, "u1");
    assert_eq!(user.role, Role::Student);
    assert!(user.serie_subscribe.is_empty());

    let err = store.insert_user("u1", &profile("Other", "o@example.com")).await.unwrap_err();
    assert!(matches!(err, EduError::UserAlreadyExists { .. }));

    let avatar = UpdateUserRequest {
        avatar: Some("https://cdn/a.png".into()),
        ..Default::default()
    };
    let updated = store.update_user("u1", &avatar).await.unwrap();
    assert_eq!(updated.name.as_deref(), Some("Lan"));
    assert_eq!(updated.avatar.as_deref(), Some("https://cdn/a.png"));
    assert!(updated.updated_at >= user.updated_at);

    let created = store.create_or_update_user("u2", &profile("Minh", "minh@example.com")).await.unwrap();
    assert_eq!(created.email.as_deref(), Some("minh@example.com"));
}

#[tokio::test]
async fn promotion_reports_each_outcome() {
    let store = test_store().await.unwrap();
    store.insert_user("u1", &profile("Lan", "lan@example.com")).await.unwrap();

    assert_eq!(
        store.set_role_by_email("lan@example.com", Role::Instructor).await.unwrap(),
        RoleChange::Updated
    );
    assert_eq!(
        store.set_role_by_email("lan@example.com", Role::Instructor).await.unwrap(),
        RoleChange::Unchanged
    );
    assert_eq!(
        store.set_role_by_email("nobody@example.com", Role::Instructor).await.unwrap(),
        RoleChange::NotFound
    );
    let user = store.find_user("u1").await.unwrap().unwrap();
    assert_eq!(user.role, Role::Instructor);
}

#[tokio::test]
async fn series_are_paged_newest_first_and_filtered() {
    let store = test_store().await.unwrap();
    let first = store.insert_serie(&draft("Rust basics", true), "owner", "").await.unwrap();
    let second = store.insert_serie(&draft("Rust advanced", false), "owner", "").await.unwrap();
    let third = store.insert_serie(&draft("Cooking", true), "chef", "").await.unwrap();

    let page = store.list_series(1, 2, None).await.unwrap();
    let ids: Vec<&str> = page.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![third.id.as_str(), second.id.as_str()]);

    let rest = store.list_series(2, 2, None).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, first.id);

    let unpublished = store.list_series(1, 10, Some(false)).await.unwrap();
    assert_eq!(unpublished.len(), 1);
    assert_eq!(unpublished[0].id, second.id);

    let found = store.search_series("RUST").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, first.id);

    assert_eq!(store.series_by_owner("owner").await.unwrap().len(), 2);
}

#[tokio::test]
async fn subscriptions_keep_the_counter_in_step() {
    let store = test_store().await.unwrap();
    store.insert_user("u1", &profile("Lan", "lan@example.com")).await.unwrap();
    let serie = store.insert_serie(&draft("Rust", true), "owner", "").await.unwrap();

    assert!(store.subscribe(&serie.id, "u1").await.unwrap());
    assert!(!store.subscribe(&serie.id, "u1").await.unwrap());

    let serie_now = store.find_serie(&serie.id).await.unwrap().unwrap();
    assert_eq!(serie_now.serie_subscribe_num, 1);
    let user = store.find_user("u1").await.unwrap().unwrap();
    assert_eq!(user.serie_subscribe, vec![serie.id.clone()]);
    assert_eq!(
        store.subscriber_emails(&serie.id).await.unwrap(),
        vec!["lan@example.com".to_string()]
    );
    assert_eq!(store.series_subscribed_by("u1").await.unwrap().len(), 1);

    assert!(store.unsubscribe(&serie.id, "u1").await.unwrap());
    assert!(!store.unsubscribe(&serie.id, "u1").await.unwrap());
    let serie_now = store.find_serie(&serie.id).await.unwrap().unwrap();
    assert_eq!(serie_now.serie_subscribe_num, 0);
}

#[tokio::test]
async fn lessons_keep_their_order_and_block_serie_deletion() {
    let store = test_store().await.unwrap();
    let serie = store.insert_serie(&draft("Rust", true), "owner", "").await.unwrap();
    let one = store.insert_lesson(&serie.id, &lesson("One"), "", &[]).await.unwrap();
    let two = store
        .insert_lesson(&serie.id, &lesson("Two"), "https://cdn/v.mp4", &["https://cdn/a.pdf".into()])
        .await
        .unwrap();

    let serie_now = store.find_serie(&serie.id).await.unwrap().unwrap();
    assert_eq!(serie_now.serie_lessons, vec![one.id.clone(), two.id.clone()]);
    assert_eq!(two.lesson_serie, serie.id);
    assert!(store.find_lesson("other-serie", &one.id).await.unwrap().is_none());

    let err = store.delete_serie(&serie.id).await.unwrap_err();
    assert!(matches!(err, EduError::SerieHasLessons { .. }));

    store.delete_lesson(&serie.id, &one.id).await.unwrap();
    store.delete_lesson(&serie.id, &two.id).await.unwrap();
    store.delete_serie(&serie.id).await.unwrap();
    assert!(store.find_serie(&serie.id).await.unwrap().is_none());
}

#[tokio::test]
async fn documents_are_removed_one_at_a_time() {
    let store = test_store().await.unwrap();
    let serie = store.insert_serie(&draft("Rust", true), "owner", "").await.unwrap();
    let docs = vec!["https://cdn/a.pdf".to_string(), "https://cdn/b.pdf".to_string()];
    let created = store.insert_lesson(&serie.id, &lesson("One"), "", &docs).await.unwrap();

    let err = store
        .remove_document(&serie.id, &created.id, "https://cdn/zzz.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, EduError::DocumentNotFound { .. }));

    let updated = store
        .remove_document(&serie.id, &created.id, "https://cdn/a.pdf")
        .await
        .unwrap();
    assert_eq!(updated.lesson_documents, vec!["https://cdn/b.pdf".to_string()]);
}

#[tokio::test]
async fn file_backed_store_persists_across_queries() {
    let (_dir, store) = file_store().await.unwrap();
    let serie = store.insert_serie(&draft("Rust", true), "owner", "").await.unwrap();
    assert_eq!(store.find_serie(&serie.id).await.unwrap().unwrap().serie_title, "Rust");
}
