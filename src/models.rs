use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Applied,
    Interview,
    Rejected,
    Offer,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Applied,
        JobStatus::Interview,
        JobStatus::Rejected,
        JobStatus::Offer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Applied => "APPLIED",
            JobStatus::Interview => "INTERVIEW",
            JobStatus::Rejected => "REJECTED",
            JobStatus::Offer => "OFFER",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("must be one of APPLIED, INTERVIEW, REJECTED, OFFER")]
pub struct UnknownStatus;

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or(UnknownStatus)
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: i64,
    pub company: String,
    pub position: String,
    pub location: String,
    pub status: JobStatus,
    pub applied_date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One observed status change. Written once, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub id: i64,
    pub job_id: i64,
    pub from: JobStatus,
    pub to: JobStatus,
    pub changed_at: DateTime<Utc>,
}

/// A validated create/replace payload with defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInput {
    pub company: String,
    pub position: String,
    pub location: String,
    pub status: JobStatus,
    pub applied_date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
}

impl From<JobApplication> for JobInput {
    fn from(job: JobApplication) -> Self {
        Self {
            company: job.company,
            position: job.position,
            location: job.location,
            status: job.status,
            applied_date: job.applied_date,
            tags: job.tags,
            notes: job.notes,
            url: job.url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StatusCounts {
    pub applied: u64,
    pub interview: u64,
    pub rejected: u64,
    pub offer: u64,
}

impl StatusCounts {
    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Applied => self.applied,
            JobStatus::Interview => self.interview,
            JobStatus::Rejected => self.rejected,
            JobStatus::Offer => self.offer,
        }
    }

    pub fn add(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Applied => self.applied += count,
            JobStatus::Interview => self.interview += count,
            JobStatus::Rejected => self.rejected += count,
            JobStatus::Offer => self.offer += count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: u64,
    pub by_status: StatusCounts,
    pub applied_this_week: u64,
}
