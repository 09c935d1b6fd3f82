use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::admin::LevelResponse;
use crate::models::Experience;
use crate::services::ExperienceSummary;

/// Amount is range-checked by the service so an out-of-range value is a 400, not a 422.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GrantExperienceRequest {
    #[validate(length(min = 1, max = 50, message = "Employee id is required"))]
    #[schema(example = "E001")]
    pub employee_id: String,

    #[schema(example = 100, minimum = 1, maximum = 1000000)]
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExperienceResponse {
    pub id: i64,
    pub amount: i64,
    pub created_utc: DateTime<Utc>,
}

impl From<Experience> for ExperienceResponse {
    fn from(e: Experience) -> Self {
        Self {
            id: e.id,
            amount: e.amount,
            created_utc: e.created_utc,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExperienceSummaryResponse {
    pub total_experience: i64,
    pub current_level: Option<LevelResponse>,
    pub next_level: Option<LevelResponse>,
    /// Experience still needed for `next_level`
    pub remaining_to_next: Option<i64>,
    pub data: Vec<ExperienceResponse>,
}

impl From<ExperienceSummary> for ExperienceSummaryResponse {
    fn from(summary: ExperienceSummary) -> Self {
        let remaining_to_next = summary
            .progress
            .remaining_to_next(summary.total_experience);
        Self {
            total_experience: summary.total_experience,
            current_level: summary.progress.current.map(LevelResponse::from),
            next_level: summary.progress.next.map(LevelResponse::from),
            remaining_to_next,
            data: summary
                .entries
                .into_iter()
                .map(ExperienceResponse::from)
                .collect(),
        }
    }
}
