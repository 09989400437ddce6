use std::sync::Arc;

use sea_orm::{Database, DatabaseConnection};
use tokio::sync::mpsc;

use stockroom_api::{
    db::run_migrations,
    events::{Event, EventSender},
    AppServices,
};

/// Fresh in-memory database with the full schema applied, plus a service
/// container and the receiving end of the event channel.
pub async fn setup() -> (AppServices, mpsc::Receiver<Event>) {
    let (services, _, rx) = setup_with_db().await;
    (services, rx)
}

/// Like [`setup`], but also hands back the connection for tests that need to
/// reach under the service layer.
#[allow(dead_code)]
pub async fn setup_with_db() -> (
    AppServices,
    Arc<DatabaseConnection>,
    mpsc::Receiver<Event>,
) {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    run_migrations(&db).await.expect("failed to run migrations");

    let db = Arc::new(db);
    let (tx, rx) = mpsc::channel(64);
    let services = AppServices::new(db.clone(), EventSender::new(tx));
    (services, db, rx)
}
