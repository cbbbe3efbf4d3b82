//! Postgres-backed candidate source and profile store lookups, plus the
//! administrative write path for placement notices.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::opportunity::{AllowedDepartments, PlacementRow};
use crate::models::student::{StudentRow, StudentSignals};
use crate::recommend::features::normalize_skills;

/// Department allow-list as sent by the portal: a JSON list, or the
/// comma-separated text of the upload form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DepartmentsInput {
    List(Vec<String>),
    Csv(String),
}

impl Default for DepartmentsInput {
    fn default() -> Self {
        DepartmentsInput::List(Vec::new())
    }
}

impl DepartmentsInput {
    pub fn normalize(&self) -> AllowedDepartments {
        match self {
            DepartmentsInput::List(entries) => AllowedDepartments::from_admin_input(entries),
            DepartmentsInput::Csv(raw) => AllowedDepartments::from_csv(raw),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewPlacement {
    pub staff_email: String,
    pub company_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub min_year: u32,
    /// Raw administrator input; `"all"` / `"*"` mean open to every department.
    #[serde(default)]
    pub allowed_departments: DepartmentsInput,
    #[serde(default)]
    pub min_cgpa: Option<f64>,
    #[serde(default)]
    pub max_arrears: Option<u32>,
}

impl NewPlacement {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.company_name.trim().is_empty() || self.title.trim().is_empty() {
            return Err(AppError::Validation(
                "company_name and title cannot be empty".to_string(),
            ));
        }
        if !self.staff_email.contains('@') {
            return Err(AppError::Validation("staff_email must be an email".to_string()));
        }
        if i32::try_from(self.min_year).is_err() {
            return Err(AppError::Validation("min_year is out of range".to_string()));
        }
        if self.max_arrears.is_some_and(|a| i32::try_from(a).is_err()) {
            return Err(AppError::Validation("max_arrears is out of range".to_string()));
        }
        if let Some(min_cgpa) = self.min_cgpa {
            if !min_cgpa.is_finite() || min_cgpa < 0.0 {
                return Err(AppError::Validation(
                    "min_cgpa must be a non-negative number".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Inserts a placement notice. The department sentinel is collapsed here, at
/// the write boundary, so stored allow-lists are always explicit.
pub async fn create_placement(pool: &PgPool, new: &NewPlacement) -> Result<PlacementRow, AppError> {
    new.validate()?;

    let min_year = i32::try_from(new.min_year)
        .map_err(|_| AppError::Validation("min_year is out of range".to_string()))?;
    let max_arrears = new
        .max_arrears
        .map(i32::try_from)
        .transpose()
        .map_err(|_| AppError::Validation("max_arrears is out of range".to_string()))?;
    let allowed = new.allowed_departments.normalize();
    let skills: Vec<String> = normalize_skills(&new.required_skills).into_iter().collect();
    let department = new
        .department
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let row = sqlx::query_as::<_, PlacementRow>(
        r#"
        INSERT INTO placements
            (staff_email, company_name, title, description, department, required_skills,
             min_year, allowed_departments, allowed_departments_lower, min_cgpa, max_arrears)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(new.staff_email.trim())
    .bind(new.company_name.trim())
    .bind(new.title.trim())
    .bind(new.description.trim())
    .bind(department)
    .bind(&skills)
    .bind(min_year)
    .bind(allowed.as_slice())
    .bind(allowed.lowercased())
    .bind(new.min_cgpa)
    .bind(max_arrears)
    .fetch_one(pool)
    .await?;

    info!(
        "Created placement {} ({}) open to {}",
        row.id,
        row.company_name,
        if allowed.is_open() {
            "all departments".to_string()
        } else {
            allowed.as_slice().join(", ")
        }
    );
    Ok(row)
}

pub async fn fetch_student(pool: &PgPool, email: &str) -> Result<Option<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await
}

pub async fn fetch_placement(pool: &PgPool, id: Uuid) -> Result<Option<PlacementRow>, sqlx::Error> {
    sqlx::query_as::<_, PlacementRow>("SELECT * FROM placements WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Every stored student. The department may live in the profile document,
/// so gates are applied in-process on the decoded signals.
pub async fn list_students(pool: &PgPool) -> Result<Vec<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>("SELECT * FROM students ORDER BY email")
        .fetch_all(pool)
        .await
}

/// Placements the student may see, with the eligibility gates pushed down to
/// SQL. Callers still run the in-process filter; it is idempotent.
pub async fn list_visible_placements(
    pool: &PgPool,
    student: &StudentSignals,
    limit: i64,
) -> Result<Vec<PlacementRow>, sqlx::Error> {
    sqlx::query_as::<_, PlacementRow>(
        r#"
        SELECT *
        FROM placements
        WHERE (cardinality(allowed_departments_lower) = 0
               OR $1 = ANY(allowed_departments_lower))
          AND (min_cgpa IS NULL OR ($2::float8 IS NOT NULL AND $2::float8 >= min_cgpa))
          AND (max_arrears IS NULL OR ($3::int4 IS NOT NULL AND $3::int4 <= max_arrears))
        ORDER BY created_at DESC, id
        LIMIT $4
        "#,
    )
    .bind(student.department.trim().to_lowercase())
    .bind(student.cgpa)
    .bind(student.arrears_count.map(|a| a.min(i32::MAX as u32) as i32))
    .bind(limit)
    .fetch_all(pool)
    .await
}
