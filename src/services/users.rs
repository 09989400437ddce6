use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Profile fields mirrored from the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ClerkProfile {
    pub clerk_user_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Inserts or refreshes the local mirror row for an identity-provider
    /// user. Called for both `user.created` and `user.updated` webhooks, so
    /// it must be idempotent.
    #[instrument(skip(self, profile), fields(clerk_user_id = %profile.clerk_user_id))]
    pub async fn sync(&self, profile: ClerkProfile) -> Result<user::Model, ServiceError> {
        if profile.clerk_user_id.is_empty() {
            return Err(ServiceError::ValidationError(
                "clerk_user_id must not be empty".to_string(),
            ));
        }

        let existing = UserEntity::find()
            .filter(user::Column::ClerkUserId.eq(profile.clerk_user_id.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let saved = match existing {
            Some(found) => {
                let mut model: user::ActiveModel = found.into();
                model.email = Set(profile.email);
                model.first_name = Set(profile.first_name);
                model.last_name = Set(profile.last_name);
                model.username = Set(profile.username);
                model.profile_image_url = Set(profile.profile_image_url);
                model.updated_at = Set(Some(Utc::now()));
                model.update(&*self.db).await.map_err(ServiceError::db_error)?
            }
            None => {
                let model = user::ActiveModel {
                    clerk_user_id: Set(profile.clerk_user_id.clone()),
                    email: Set(profile.email),
                    first_name: Set(profile.first_name),
                    last_name: Set(profile.last_name),
                    username: Set(profile.username),
                    profile_image_url: Set(profile.profile_image_url),
                    created_at: Set(Utc::now()),
                    updated_at: Set(None),
                    ..Default::default()
                };
                model.insert(&*self.db).await.map_err(ServiceError::db_error)?
            }
        };

        self.event_sender
            .send_or_log(Event::UserSynced {
                clerk_user_id: saved.clerk_user_id.clone(),
            })
            .await;
        Ok(saved)
    }

    /// Removes the mirror row after a `user.deleted` webhook. Missing rows
    /// are fine; deletion webhooks can arrive more than once.
    #[instrument(skip(self))]
    pub async fn remove(&self, clerk_user_id: &str) -> Result<(), ServiceError> {
        let deleted = UserEntity::delete_many()
            .filter(user::Column::ClerkUserId.eq(clerk_user_id))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        if deleted.rows_affected > 0 {
            info!(%clerk_user_id, "user removed");
            self.event_sender
                .send_or_log(Event::UserRemoved {
                    clerk_user_id: clerk_user_id.to_string(),
                })
                .await;
        }
        Ok(())
    }
}
