use async_trait::async_trait;
use reading_core::model::{GoalSettings, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_goals_row};
use crate::repository::{GoalSettingsRepository, StorageError};

#[async_trait]
impl GoalSettingsRepository for SqliteRepository {
    async fn get_goals(&self, user: &UserId) -> Result<Option<GoalSettings>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT daily_goal_minutes, weekly_goal_minutes
            FROM goal_settings
            WHERE user_id = ?1
            ",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_goals_row).transpose()
    }

    async fn save_goals(&self, user: &UserId, goals: &GoalSettings) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO goal_settings (user_id, daily_goal_minutes, weekly_goal_minutes)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                daily_goal_minutes = excluded.daily_goal_minutes,
                weekly_goal_minutes = excluded.weekly_goal_minutes
            ",
        )
        .bind(user.as_str())
        .bind(i64::from(goals.daily_goal_minutes()))
        .bind(i64::from(goals.weekly_goal_minutes()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
