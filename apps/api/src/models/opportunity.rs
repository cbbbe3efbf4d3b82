use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Administrator input values meaning "every department".
const OPEN_SENTINELS: [&str; 2] = ["all", "*"];

/// Department allow-list of an opportunity. Empty means open to all.
///
/// The `"all"` / `"*"` sentinels are collapsed when the list is built from
/// administrator or caller input; readers only ever see the empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AllowedDepartments(Vec<String>);

impl AllowedDepartments {
    pub fn open() -> Self {
        Self(Vec::new())
    }

    /// Trims entries, drops blanks and case-insensitive duplicates (first
    /// spelling wins) and collapses the open sentinels to the empty list.
    pub fn from_admin_input<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut departments: Vec<String> = Vec::new();
        for entry in raw {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            if OPEN_SENTINELS.iter().any(|s| same_department(entry, s)) {
                return Self::open();
            }
            if !departments.iter().any(|d| same_department(d, entry)) {
                departments.push(entry.to_string());
            }
        }
        Self(departments)
    }

    /// Parses the comma-separated form used by upload forms.
    pub fn from_csv(raw: &str) -> Self {
        Self::from_admin_input(raw.split(','))
    }

    /// Wraps a list that was normalized when it was written.
    pub fn from_stored(departments: Vec<String>) -> Self {
        Self(departments)
    }

    pub fn is_open(&self) -> bool {
        self.0.is_empty()
    }

    pub fn permits(&self, department: &str) -> bool {
        self.is_open() || self.0.iter().any(|d| same_department(d, department))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn lowercased(&self) -> Vec<String> {
        self.0.iter().map(|d| d.to_lowercase()).collect()
    }
}

/// Department names compare trimmed and Unicode-lowercased, matching the
/// lowercased column the SQL pushdown reads.
fn same_department(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl From<Vec<String>> for AllowedDepartments {
    fn from(raw: Vec<String>) -> Self {
        Self::from_admin_input(raw)
    }
}

impl From<AllowedDepartments> for Vec<String> {
    fn from(allowed: AllowedDepartments) -> Self {
        allowed.0
    }
}

/// Upstream feeds send `null` for unset fields; treat it like a missing one.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A candidate opportunity as consumed by the recommender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_skills: Vec<String>,
    /// Target department used by the department-match feature only.
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub min_year: u32,
    /// Enforced by the eligibility filter.
    #[serde(default, deserialize_with = "null_as_default")]
    pub allowed_departments: AllowedDepartments,
    #[serde(default)]
    pub min_cgpa: Option<f64>,
    #[serde(default)]
    pub max_arrears: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlacementRow {
    pub id: Uuid,
    pub staff_email: String,
    pub company_name: String,
    pub title: String,
    pub description: String,
    pub department: Option<String>,
    pub required_skills: Vec<String>,
    pub min_year: i32,
    pub allowed_departments: Vec<String>,
    pub allowed_departments_lower: Vec<String>,
    pub min_cgpa: Option<f64>,
    pub max_arrears: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl PlacementRow {
    pub fn to_record(&self) -> OpportunityRecord {
        OpportunityRecord {
            id: self.id.to_string(),
            required_skills: self.required_skills.clone(),
            department: self.department.clone(),
            min_year: self.min_year.max(0) as u32,
            allowed_departments: AllowedDepartments::from_stored(self.allowed_departments.clone()),
            min_cgpa: self.min_cgpa,
            max_arrears: self.max_arrears.map(|a| a.max(0) as u32),
        }
    }
}
