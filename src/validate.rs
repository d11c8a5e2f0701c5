//! Schema gate for create and replace payloads.
//!
//! Every field is checked on its own so a single response can list all of the
//! problems with a payload instead of stopping at the first one.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{JobInput, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub details: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.details.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    #[cfg(test)]
    pub fn has(&self, field: &str) -> bool {
        self.details.iter().any(|d| d.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed")?;
        for (i, detail) in self.details.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{} {}", sep, detail.field, detail.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a job payload, filling in `status` and `appliedDate` defaults.
pub fn validate_job(payload: &Value, now: DateTime<Utc>) -> Result<JobInput, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let Some(obj) = payload.as_object() else {
        errors.push("body", "must be a JSON object");
        return Err(errors);
    };

    let company = required_text(obj, "company", &mut errors);
    let position = required_text(obj, "position", &mut errors);
    let location = required_text(obj, "location", &mut errors);

    let status = match present(obj, "status") {
        None => Some(JobStatus::default()),
        Some(Value::String(s)) => match s.parse::<JobStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                errors.push("status", e.to_string());
                None
            }
        },
        Some(_) => {
            errors.push("status", "must be a string");
            None
        }
    };

    let applied_date = match present(obj, "appliedDate") {
        None => Some(now),
        Some(Value::String(s)) => match parse_date(s) {
            Some(date) => Some(date),
            None => {
                errors.push(
                    "appliedDate",
                    "must be an RFC 3339 timestamp or YYYY-MM-DD date between years 0000 and 9999",
                );
                None
            }
        },
        Some(_) => {
            errors.push("appliedDate", "must be a string");
            None
        }
    };

    let tags = match present(obj, "tags") {
        None => Some(Vec::new()),
        Some(Value::Array(items)) => {
            let tags: Option<Vec<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            if tags.is_none() {
                errors.push("tags", "must contain only strings");
            }
            tags
        }
        Some(_) => {
            errors.push("tags", "must be an array of strings");
            None
        }
    };

    let notes = optional_text(obj, "notes", &mut errors);

    let url = optional_text(obj, "url", &mut errors);
    if let Some(Some(raw)) = &url {
        if url::Url::parse(raw).is_err() {
            errors.push("url", "must be an absolute URL");
        }
    }

    match (company, position, location, status, applied_date, tags, notes, url) {
        (
            Some(company),
            Some(position),
            Some(location),
            Some(status),
            Some(applied_date),
            Some(tags),
            Some(notes),
            Some(url),
        ) if errors.is_empty() => Ok(JobInput {
            company,
            position,
            location,
            status,
            applied_date,
            tags,
            notes,
            url,
        }),
        _ => Err(errors),
    }
}

/// A field counts as absent when missing or explicitly `null`.
fn present<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn required_text(obj: &Map<String, Value>, field: &str, errors: &mut ValidationErrors) -> Option<String> {
    match present(obj, field) {
        None => {
            errors.push(field, "is required");
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push(field, "must not be empty");
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(field, "must be a string");
            None
        }
    }
}

// Outer None means invalid, inner None means absent.
fn optional_text(
    obj: &Map<String, Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<Option<String>> {
    match present(obj, field) {
        None => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => {
            errors.push(field, "must be a string");
            None
        }
    }
}

/// Accepts full timestamps, zone-less timestamps (taken as UTC) and bare dates.
///
/// Only four-digit years (after conversion to UTC) are accepted, matching the
/// fixed-width text the store keeps.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    parse_any_date(s.trim()).filter(|dt| (0..=9999).contains(&dt.year()))
}

fn parse_any_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
