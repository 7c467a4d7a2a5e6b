use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GoalSettingsError {
    #[error("daily goal must be > 0 minutes")]
    ZeroDailyGoal,

    #[error("weekly goal must be > 0 minutes")]
    ZeroWeeklyGoal,

    #[error("weekly goal ({weekly}) cannot be below the daily goal ({daily})")]
    WeeklyBelowDaily { daily: u32, weekly: u32 },
}

pub const DEFAULT_DAILY_GOAL_MINUTES: u32 = 60;
pub const DEFAULT_WEEKLY_GOAL_MINUTES: u32 = 420;

/// Per-user reading targets in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalSettings {
    daily_goal_minutes: u32,
    weekly_goal_minutes: u32,
}

impl GoalSettings {
    /// # Errors
    ///
    /// Returns `GoalSettingsError` if either goal is zero or the weekly goal
    /// is below the daily goal.
    pub fn new(
        daily_goal_minutes: u32,
        weekly_goal_minutes: u32,
    ) -> Result<Self, GoalSettingsError> {
        if daily_goal_minutes == 0 {
            return Err(GoalSettingsError::ZeroDailyGoal);
        }
        if weekly_goal_minutes == 0 {
            return Err(GoalSettingsError::ZeroWeeklyGoal);
        }
        if weekly_goal_minutes < daily_goal_minutes {
            return Err(GoalSettingsError::WeeklyBelowDaily {
                daily: daily_goal_minutes,
                weekly: weekly_goal_minutes,
            });
        }
        Ok(Self {
            daily_goal_minutes,
            weekly_goal_minutes,
        })
    }

    #[must_use]
    pub fn daily_goal_minutes(&self) -> u32 {
        self.daily_goal_minutes
    }

    #[must_use]
    pub fn weekly_goal_minutes(&self) -> u32 {
        self.weekly_goal_minutes
    }
}

impl Default for GoalSettings {
    fn default() -> Self {
        Self {
            daily_goal_minutes: DEFAULT_DAILY_GOAL_MINUTES,
            weekly_goal_minutes: DEFAULT_WEEKLY_GOAL_MINUTES,
        }
    }
}

/// Partial update; unset fields keep their current value on save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoalSettingsDraft {
    pub daily_goal_minutes: Option<u32>,
    pub weekly_goal_minutes: Option<u32>,
}

impl GoalSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.daily_goal_minutes.is_none() && self.weekly_goal_minutes.is_none()
    }

    /// Merge the draft over `current` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns `GoalSettingsError` if the merged settings are invalid.
    pub fn merge_into(self, current: &GoalSettings) -> Result<GoalSettings, GoalSettingsError> {
        GoalSettings::new(
            self.daily_goal_minutes.unwrap_or(current.daily_goal_minutes),
            self.weekly_goal_minutes.unwrap_or(current.weekly_goal_minutes),
        )
    }
}
