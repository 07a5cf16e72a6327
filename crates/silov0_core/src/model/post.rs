//! Post domain model and normalizer.
//!
//! # Responsibility
//! - Define the canonical `Post` record and its untrusted `RawPost` input view.
//! - Validate and canonicalize raw records (`normalize_post`).
//! - Derive deterministic identifiers from title + date (`create_slug`).
//!
//! # Invariants
//! - `normalize_post` is idempotent: normalizing a normalized post is a no-op.
//! - Slugs are lower-case, never contain `--`, never start or end with `-`.
//! - Tags keep caller order and duplicates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Title used when the raw record has no usable title.
pub const UNTITLED: &str = "Untitled";

static NON_SLUG_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));
static DASH_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid dash regex"));
static CALENDAR_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})(?:-(\d{2})(?:-(\d{2}))?)?$").expect("valid calendar date regex")
});

/// Offset-less timestamp layouts, read as UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Stable identifier of one post inside a collection.
pub type PostId = String;

/// Canonical blog-post record.
///
/// Field declaration order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Unique within a collection. Derived via [`create_slug`] when absent.
    pub id: PostId,
    /// Trimmed title, [`UNTITLED`] when blank.
    pub title: String,
    /// Publication date, usually `YYYY-MM-DD`. Kept verbatim.
    pub date: String,
    /// Trimmed summary, empty when absent.
    pub summary: String,
    /// Ordered tags, not deduplicated.
    pub tags: Vec<String>,
}

impl Post {
    /// Runs this post back through the normalizer.
    ///
    /// Used by persistence paths that must not trust in-memory values.
    pub fn renormalize(&self) -> Result<Post, PostValidationError> {
        normalize_post(&RawPost::from(self))
    }

    /// Interprets `date` as an instant in UTC.
    ///
    /// Accepts RFC 3339 timestamps, offset-less `YYYY-MM-DDTHH:MM[:SS[.f]]`
    /// timestamps (read as UTC) and the calendar forms `YYYY-MM-DD`,
    /// `YYYY-MM` and `YYYY`. Missing month/day default to the first, missing
    /// time to midnight UTC. Returns `None` for anything else.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_post_date(&self.date)
    }
}

/// Parses a post date; see [`Post::published_at`].
pub fn parse_post_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Some(naive.and_utc());
    }
    parse_calendar_date(value)
}

fn parse_calendar_date(value: &str) -> Option<DateTime<Utc>> {
    let captures = CALENDAR_DATE_RE.captures(value)?;
    let part = |index: usize| captures.get(index).map(|m| m.as_str().parse::<u32>());
    let year = captures[1].parse::<i32>().ok()?;
    let month = part(2).transpose().ok()?.unwrap_or(1);
    let day = part(3).transpose().ok()?.unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
}

/// Validation failure raised while normalizing raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostValidationError {
    /// Input is not a JSON object.
    NotAnObject,
    /// `date` is absent, null, or blank.
    MissingDate,
    /// Neither an explicit id nor a non-empty slug is available.
    UnderivableId,
    /// A field is present with a type the model cannot accept.
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

impl Display for PostValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "post must be an object"),
            Self::MissingDate => write!(f, "post is missing a date"),
            Self::UnderivableId => {
                write!(f, "post id cannot be derived from its title and date")
            }
            Self::InvalidField { field, expected } => {
                write!(f, "post field `{field}` must be {expected}")
            }
        }
    }
}

impl Error for PostValidationError {}

/// Untrusted post input with every field optional.
///
/// Built from JSON (`RawPost::from_value`) or from code via the `with_*`
/// builders. `tags: None` means "absent or not a sequence".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPost {
    pub id: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl RawPost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Reads a raw record from an arbitrary JSON value.
    ///
    /// # Errors
    /// - `NotAnObject` when `value` is not a JSON object.
    /// - `InvalidField` when a scalar field is not a string, or when `tags`
    ///   is an array holding a non-string element.
    ///
    /// `null` counts as absent. A non-array `tags` value is dropped.
    pub fn from_value(value: &Value) -> Result<Self, PostValidationError> {
        let object = value.as_object().ok_or(PostValidationError::NotAnObject)?;
        Ok(Self {
            id: optional_string(object, "id")?,
            title: optional_string(object, "title")?,
            date: optional_string(object, "date")?,
            summary: optional_string(object, "summary")?,
            tags: optional_tags(object)?,
        })
    }
}

impl From<&Post> for RawPost {
    fn from(post: &Post) -> Self {
        Self {
            id: Some(post.id.clone()),
            title: Some(post.title.clone()),
            date: Some(post.date.clone()),
            summary: Some(post.summary.clone()),
            tags: Some(post.tags.clone()),
        }
    }
}

/// Normalizes one raw record into the canonical shape.
///
/// # Contract
/// - `id`: explicit non-empty id, else `create_slug(title, date)`.
/// - `title`: trimmed, or [`UNTITLED`] when blank.
/// - `summary`: trimmed, or empty.
/// - `tags`: kept as given, or empty.
///
/// # Errors
/// - `MissingDate` when `date` is absent or blank.
/// - `UnderivableId` when no id is given and the slug comes out empty.
pub fn normalize_post(raw: &RawPost) -> Result<Post, PostValidationError> {
    let date = match raw.date.as_deref() {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => return Err(PostValidationError::MissingDate),
    };

    let raw_title = raw.title.as_deref().unwrap_or_default();
    let id = match raw.id.as_deref() {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => create_slug(raw_title, &date),
    };
    if id.is_empty() {
        return Err(PostValidationError::UnderivableId);
    }

    let title = match raw_title.trim() {
        "" => UNTITLED.to_string(),
        trimmed => trimmed.to_string(),
    };

    Ok(Post {
        id,
        title,
        date,
        summary: raw
            .summary
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        tags: raw.tags.clone().unwrap_or_default(),
    })
}

/// Normalizes one JSON value; see [`RawPost::from_value`] and [`normalize_post`].
pub fn normalize_value(value: &Value) -> Result<Post, PostValidationError> {
    normalize_post(&RawPost::from_value(value)?)
}

/// Derives a URL-safe identifier from title and date.
///
/// Both parts are lower-cased and every run of characters outside
/// `[a-z0-9]` becomes one `-`. Empty parts are skipped, so
/// `create_slug("Hello   World!!", "")` is `hello-world`.
pub fn create_slug(title: &str, date: &str) -> String {
    let parts = [clean_slug_part(date), clean_slug_part(title)];
    let joined = parts
        .iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("-");
    DASH_RUN_RE.replace_all(&joined, "-").into_owned()
}

fn clean_slug_part(value: &str) -> String {
    let lowered = value.to_lowercase();
    NON_SLUG_CHARS_RE
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

fn optional_string(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, PostValidationError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(PostValidationError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

fn optional_tags(object: &Map<String, Value>) -> Result<Option<Vec<String>>, PostValidationError> {
    let Some(Value::Array(items)) = object.get("tags") else {
        return Ok(None);
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(tag) => Ok(tag.clone()),
            _ => Err(PostValidationError::InvalidField {
                field: "tags",
                expected: "an array of strings",
            }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
