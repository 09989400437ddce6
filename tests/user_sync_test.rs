mod common;

use stockroom_api::{events::Event, services::users::ClerkProfile};

fn profile(id: &str, email: &str) -> ClerkProfile {
    ClerkProfile {
        clerk_user_id: id.to_string(),
        email: Some(email.to_string()),
        first_name: Some("Ada".to_string()),
        last_name: Some("Park".to_string()),
        username: None,
        profile_image_url: None,
    }
}

#[tokio::test]
async fn sync_inserts_then_updates_in_place() {
    let (services, mut rx) = common::setup().await;

    let created = services
        .users
        .sync(profile("user_1", "ada@example.com"))
        .await
        .unwrap();
    assert_eq!(created.email.as_deref(), Some("ada@example.com"));

    let updated = services
        .users
        .sync(profile("user_1", "ada@new.example.com"))
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.email.as_deref(), Some("ada@new.example.com"));
    assert!(updated.updated_at.is_some());

    // Both syncs emitted an event.
    for _ in 0..2 {
        match rx.recv().await {
            Some(Event::UserSynced { clerk_user_id }) => assert_eq!(clerk_user_id, "user_1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

#[tokio::test]
async fn remove_is_idempotent() {
    let (services, _rx) = common::setup().await;

    services
        .users
        .sync(profile("user_1", "ada@example.com"))
        .await
        .unwrap();

    services.users.remove("user_1").await.unwrap();
    // A repeated deletion webhook is a no-op, not an error.
    services.users.remove("user_1").await.unwrap();
}
