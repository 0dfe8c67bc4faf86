use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use rocket::http::Status;
use serde::Serialize;

use crate::resp::problem::Problem;

lazy_static::lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE: Regex = Regex::new(r"^\+?[0-9][0-9 \-]{5,18}[0-9]$").unwrap();
}

pub const MAX_TEXT: usize = 5000;
pub const MAX_SHORT: usize = 200;

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}

pub fn is_phone(value: &str) -> bool {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    PHONE.is_match(value.trim()) && (7..=15).contains(&digits)
}

pub fn is_url(value: &str) -> bool {
    let value = value.trim();
    (value.starts_with("https://") || value.starts_with("http://"))
        && value.len() > "https://".len()
        && !value.contains(char::is_whitespace)
}

/// Request payloads that check their own field constraints.
pub trait Validate {
    fn validate(&self) -> Result<(), Problem>;
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub detail: String,
}

/// Accumulates every failed field check of one payload.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Checks {
        Checks::default()
    }

    pub fn fail(&mut self, field: &'static str, detail: impl ToString) -> &mut Checks {
        self.errors.push(FieldError {
            field,
            detail: detail.to_string(),
        });
        self
    }

    pub fn check(&mut self, ok: bool, field: &'static str, detail: impl ToString) -> &mut Checks {
        if !ok {
            self.fail(field, detail);
        }
        self
    }

    pub fn required(&mut self, field: &'static str, value: &str) -> &mut Checks {
        if value.trim().is_empty() {
            self.fail(field, "Value is required.");
        } else if value.chars().count() > MAX_SHORT {
            self.fail(field, format!("Can't be longer than {} characters.", MAX_SHORT));
        }
        self
    }

    pub fn text(&mut self, field: &'static str, value: &str) -> &mut Checks {
        self.check(
            value.chars().count() <= MAX_TEXT,
            field,
            format!("Can't be longer than {} characters.", MAX_TEXT),
        )
    }

    pub fn email(&mut self, field: &'static str, value: &str) -> &mut Checks {
        self.check(is_email(value), field, "Not a valid e-mail address.")
    }

    pub fn phone(&mut self, field: &'static str, value: &str) -> &mut Checks {
        self.check(is_phone(value), field, "Not a valid phone number.")
    }

    pub fn optional_phone(&mut self, field: &'static str, value: &Option<String>) -> &mut Checks {
        match value {
            Some(phone) => self.phone(field, phone),
            None => self,
        }
    }

    pub fn optional_url(&mut self, field: &'static str, value: &Option<String>) -> &mut Checks {
        match value {
            Some(url) => self.check(is_url(url), field, "Not a valid http(s) URL."),
            None => self,
        }
    }

    pub fn urls(&mut self, field: &'static str, values: &[String]) -> &mut Checks {
        self.check(
            values.iter().all(|it| is_url(it)),
            field,
            "Every entry must be a valid http(s) URL.",
        )
    }

    /// Entries must be non-blank; the list itself may be empty.
    pub fn entries(&mut self, field: &'static str, values: &[String]) -> &mut Checks {
        self.check(
            values
                .iter()
                .all(|it| !it.trim().is_empty() && it.chars().count() <= MAX_SHORT),
            field,
            "Entries must be non-blank and short.",
        )
    }

    pub fn non_empty(&mut self, field: &'static str, values: &[String]) -> &mut Checks {
        self.check(!values.is_empty(), field, "At least one entry is required.")
            .entries(field, values)
    }

    pub fn experience(&mut self, field: &'static str, years: u32) -> &mut Checks {
        self.check(years <= 60, field, "Experience can't exceed 60 years.")
    }

    pub fn established(&mut self, field: &'static str, year: Option<u32>) -> &mut Checks {
        match year {
            Some(year) => {
                let current = u32::try_from(Utc::now().year()).unwrap_or(u32::MAX);
                self.check(
                    (1800..=current).contains(&year),
                    field,
                    format!("Year must be between 1800 and {}.", current),
                )
            }
            None => self,
        }
    }

    pub fn not_past(&mut self, field: &'static str, date: Option<NaiveDate>) -> &mut Checks {
        match date {
            Some(date) => self.check(
                date >= Utc::now().date_naive(),
                field,
                "Date can't be in the past.",
            ),
            None => self,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(&mut self) -> Result<(), Problem> {
        if self.errors.is_empty() {
            return Ok(());
        }

        let errors = std::mem::take(&mut self.errors);
        let detail = errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.detail))
            .collect::<Vec<_>>()
            .join(" ");

        Err(
            Problem::new_untyped(Status::BadRequest, "Submitted data is invalid.")
                .detail(detail)
                .insert("invalid_fields", errors),
        )
    }
}
