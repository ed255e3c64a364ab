//! Domain entities shared by discovery, the orchestrator and the CLI.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Login credentials. The secret is never persisted or printed.
#[derive(Clone)]
pub struct Credentials {
    pub id: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Semester codes as used by the platform's course listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Semester {
    #[serde(rename = "10")]
    First,
    #[serde(rename = "11")]
    Summer,
    #[serde(rename = "20")]
    Second,
    #[serde(rename = "21")]
    Winter,
}

impl Semester {
    pub const ALL: [Semester; 4] = [
        Semester::First,
        Semester::Summer,
        Semester::Second,
        Semester::Winter,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Semester::First => "10",
            Semester::Summer => "11",
            Semester::Second => "20",
            Semester::Winter => "21",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "10" => Some(Semester::First),
            "11" => Some(Semester::Summer),
            "20" => Some(Semester::Second),
            "21" => Some(Semester::Winter),
            _ => None,
        }
    }
}

impl std::str::FromStr for Semester {
    type Err = String;

    /// Accepts a platform code (`20`) or a name (`second`, `fall`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(sem) = Semester::from_code(s) {
            return Ok(sem);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "spring" | "1" => Ok(Semester::First),
            "summer" => Ok(Semester::Summer),
            "second" | "fall" | "autumn" | "2" => Ok(Semester::Second),
            "winter" => Ok(Semester::Winter),
            other => Err(format!("unknown semester '{other}' (use 10, 11, 20, 21 or a name)")),
        }
    }
}

/// An academic term: year plus semester code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    pub year: i32,
    pub semester: Semester,
}

impl Term {
    pub fn new(year: i32, semester: Semester) -> Self {
        Self { year, semester }
    }

    /// The term in session on `today`: Jan–Feb winter, Mar–Jul first,
    /// Aug summer, Sep–Dec second.
    pub fn current(today: NaiveDate) -> Self {
        let semester = match today.month() {
            1 | 2 => Semester::Winter,
            3..=7 => Semester::First,
            8 => Semester::Summer,
            _ => Semester::Second,
        };
        Self::new(today.year(), semester)
    }

    pub fn today() -> Self {
        Self::current(chrono::Local::now().date_naive())
    }

    /// Parse `"2024-10"` style input.
    pub fn parse(s: &str) -> Option<Self> {
        let (year, code) = s.trim().split_once('-')?;
        Some(Self::new(year.parse().ok()?, Semester::from_code(code)?))
    }

    /// Cache scope key for this term under an account.
    pub fn scope_key(&self, user_id: &str) -> String {
        format!("{}:{}", user_id, self)
    }

    pub fn listing_url(&self, platform_base: &str) -> String {
        format!(
            "{}/local/ubion/user/index.php?year={}&semester={}",
            platform_base,
            self.year,
            self.semester.code()
        )
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.semester.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LectureStatus {
    New,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecture {
    /// `{courseId}_{ordinal}`; ordinal is the scan order within the course page.
    pub id: String,
    pub title: String,
    pub week: String,
    /// N from the enclosing `section-N` container, if any.
    pub week_ordinal: Option<u32>,
    pub status: LectureStatus,
    pub viewer_url: String,
    pub course_id: String,
    /// Content-derived key, stable across rescans.
    pub fingerprint: String,
}

/// First 16 hex chars of SHA-256 over course id and viewer URL.
pub fn lecture_fingerprint(course_id: &str, viewer_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(course_id.as_bytes());
    hasher.update(viewer_url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialKind {
    File,
    Folder,
    Assignment,
    Quiz,
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MaterialKind::File => "file",
            MaterialKind::Folder => "folder",
            MaterialKind::Assignment => "assignment",
            MaterialKind::Quiz => "quiz",
        };
        f.write_str(s)
    }
}

/// A non-video resource listed on a course page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub title: String,
    pub kind: MaterialKind,
    pub url: String,
    pub week: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub professor: String,
    pub year: String,
    pub semester: String,
    pub url: String,
    #[serde(default)]
    pub lectures: Vec<Lecture>,
    #[serde(default)]
    pub materials: Vec<Material>,
}

/// Aggregate result of one discovery run; the cache payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySnapshot {
    pub term: Term,
    pub courses: Vec<Course>,
    pub lectures: Vec<Lecture>,
    pub failed_courses: usize,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoverySnapshot {
    /// Find a lecture by ordinal id or fingerprint, with its course.
    pub fn find(&self, key: &str) -> Option<(&Course, &Lecture)> {
        self.courses.iter().find_map(|c| {
            c.lectures
                .iter()
                .find(|l| l.id == key || l.fingerprint == key)
                .map(|l| (c, l))
        })
    }
}
