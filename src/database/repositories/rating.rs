//! SeaORM-based user rating repository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;

use crate::entities::{prelude::UserRatings, user_ratings};
use crate::errors::StoreResult;
use crate::models::Rating;

use super::traits::RatingStore;

/// SeaORM-backed store for user ratings (one per module)
#[derive(Clone)]
pub struct RatingSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl RatingSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn model_to_domain(model: user_ratings::Model) -> Rating {
        Rating {
            module_id: model.module_id as u32,
            score: model.rating as u8,
            comment: model.comment,
            rated_at: model.rated_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl RatingStore for RatingSeaOrmRepository {
    async fn get(&self, module_id: u32) -> StoreResult<Option<Rating>> {
        let model = UserRatings::find()
            .filter(user_ratings::Column::ModuleId.eq(module_id as i64))
            .one(&*self.connection)
            .await?;
        Ok(model.map(Self::model_to_domain))
    }

    async fn upsert(
        &self,
        module_id: u32,
        score: u8,
        comment: Option<String>,
    ) -> StoreResult<Rating> {
        let now = Utc::now();
        let existing = UserRatings::find()
            .filter(user_ratings::Column::ModuleId.eq(module_id as i64))
            .one(&*self.connection)
            .await?;

        let model = match existing {
            Some(model) => {
                let mut active: user_ratings::ActiveModel = model.into();
                active.rating = Set(score as i32);
                active.comment = Set(comment);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?
            }
            None => {
                user_ratings::ActiveModel {
                    module_id: Set(module_id as i64),
                    rating: Set(score as i32),
                    comment: Set(comment),
                    rated_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&*self.connection)
                .await?
            }
        };

        Ok(Self::model_to_domain(model))
    }
}
