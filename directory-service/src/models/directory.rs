//! Organisation units and experience records.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct JobGroup {
    pub id: i64,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}

/// A named level reached once a user's total experience meets the threshold.
#[derive(Debug, Clone, FromRow)]
pub struct Level {
    pub id: i64,
    pub name: String,
    pub total_required_experience: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Experience {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub created_utc: DateTime<Utc>,
}

/// Where a total sits on the level ladder.
#[derive(Debug, Clone, Default)]
pub struct LevelProgress {
    pub current: Option<Level>,
    pub next: Option<Level>,
}

impl LevelProgress {
    /// `levels` need not be sorted.
    pub fn locate(levels: &[Level], total_experience: i64) -> Self {
        let current = levels
            .iter()
            .filter(|l| l.total_required_experience <= total_experience)
            .max_by_key(|l| l.total_required_experience)
            .cloned();
        let next = levels
            .iter()
            .filter(|l| l.total_required_experience > total_experience)
            .min_by_key(|l| l.total_required_experience)
            .cloned();
        Self { current, next }
    }

    pub fn remaining_to_next(&self, total_experience: i64) -> Option<i64> {
        self.next
            .as_ref()
            .map(|l| l.total_required_experience.saturating_sub(total_experience))
    }
}
