//! Download formats shared by the roster and attendance exports.

use anyhow::Context;
use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Reads the `format` query parameter; absent means JSON.
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(|f| f.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("json") => Ok(ExportFormat::Json),
            Some("csv") => Ok(ExportFormat::Csv),
            Some(other) => Err(AppError::Validation(format!(
                "Unsupported export format '{other}'; expected json or csv"
            ))),
        }
    }
}

/// Writes rows with a header line. `headers` must match the row type's field names.
pub fn to_csv<T: Serialize>(rows: &[T], headers: &[&str]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    // Serializing emits the header from the first row; an empty export writes it explicitly.
    if rows.is_empty() {
        writer.write_record(headers)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {e}"))?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

pub fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// Keeps letters and digits; everything else becomes `_`.
pub fn safe_filename_part(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "export".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Line {
        email: String,
        cgpa: Option<f64>,
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(ExportFormat::parse(None).unwrap(), ExportFormat::Json);
        assert_eq!(ExportFormat::parse(Some(" CSV ")).unwrap(), ExportFormat::Csv);
        assert!(matches!(
            ExportFormat::parse(Some("xlsx")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_csv_has_header_and_blank_unknowns() {
        let rows = vec![
            Line {
                email: "asha@kongu.edu".to_string(),
                cgpa: Some(8.5),
            },
            Line {
                email: "kavin@kongu.edu".to_string(),
                cgpa: None,
            },
        ];
        let csv = to_csv(&rows, &["email", "cgpa"]).unwrap();
        assert_eq!(csv, "email,cgpa\nasha@kongu.edu,8.5\nkavin@kongu.edu,\n");
    }

    #[test]
    fn test_empty_csv_still_has_header() {
        let rows: Vec<Line> = Vec::new();
        assert_eq!(to_csv(&rows, &["email", "cgpa"]).unwrap(), "email,cgpa\n");
    }

    #[test]
    fn test_safe_filename_part() {
        assert_eq!(safe_filename_part("Zoho Corp."), "Zoho_Corp");
        assert_eq!(safe_filename_part("***"), "export");
    }
}
