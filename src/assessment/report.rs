use chrono::Utc;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::evaluation::{EvaluationRecord, MAX_SCORE};

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 20.0;
const BODY_FONT_SIZE: f32 = 11.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const WRAP_COLUMNS: usize = 90;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render PDF: {0}")]
    Render(String),
}

/// Keeps only ASCII letters, digits and '-' so the id is safe in a filename.
pub fn sanitize_session_id(session_id: &str) -> String {
    let cleaned: String = session_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "session".to_string()
    } else {
        cleaned
    }
}

pub fn report_path(report_dir: &Path, session_id: &str) -> PathBuf {
    report_dir.join(format!(
        "excel_assessment_{}.pdf",
        sanitize_session_id(session_id)
    ))
}

/// Greedy word wrap on character count.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

struct Cursor<'a> {
    layer: &'a PdfLayerReference,
    y: f32,
}

impl Cursor<'_> {
    fn line(&mut self, text: &str, size: f32, font: &IndirectFontRef) -> bool {
        if self.y < MARGIN_MM {
            return false;
        }
        self.layer.use_text(text, size, Mm(MARGIN_MM), Mm(self.y), font);
        self.y -= LINE_HEIGHT_MM * (size / BODY_FONT_SIZE).max(1.0);
        true
    }

    fn gap(&mut self) {
        self.y -= LINE_HEIGHT_MM;
    }
}

fn draw_summary(
    layer: &PdfLayerReference,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
    session_id: &str,
    evaluation: &EvaluationRecord,
) {
    let mut cursor = Cursor {
        layer,
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    };

    cursor.line("Excel Assessment Summary", 18.0, bold);
    cursor.line(&format!("Session {}", session_id), BODY_FONT_SIZE, regular);
    cursor.gap();

    let score = evaluation.score.unwrap_or(0);
    cursor.line(&format!("Overall Score: {}/{}", score, MAX_SCORE), 14.0, bold);
    let grade = evaluation.grade.as_deref().unwrap_or("Not available");
    cursor.line(&format!("Grade: {}", grade), 14.0, bold);
    cursor.gap();

    let body = evaluation
        .summary
        .as_deref()
        .or(evaluation.feedback.as_deref())
        .unwrap_or("No summary was provided.");
    for line in wrap_text(body, WRAP_COLUMNS) {
        if !cursor.line(&line, BODY_FONT_SIZE, regular) {
            break;
        }
    }

    let recommendations = evaluation.recommendations();
    if !recommendations.is_empty() {
        cursor.gap();
        cursor.line("Recommendations", 12.0, bold);
        for (index, item) in recommendations.iter().enumerate() {
            for line in wrap_text(&format!("{}. {}", index + 1, item), WRAP_COLUMNS) {
                cursor.line(&line, BODY_FONT_SIZE, regular);
            }
        }
    }

    layer.use_text(
        format!("Generated {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")),
        8.0,
        Mm(MARGIN_MM),
        Mm(MARGIN_MM / 2.0),
        regular,
    );
}

/// Writes the single-page summary report and returns its path.
pub fn render_summary_report(
    report_dir: &Path,
    session_id: &str,
    evaluation: &EvaluationRecord,
) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(report_dir)?;
    let path = report_path(report_dir, session_id);

    let title = format!("Excel Assessment Summary - Session {}", session_id);
    let (doc, page, layer) = PdfDocument::new(
        title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Render(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Render(e.to_string()))?;

    draw_summary(
        &doc.get_page(page).get_layer(layer),
        &regular,
        &bold,
        session_id,
        evaluation,
    );

    let file = File::create(&path)?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| ReportError::Render(e.to_string()))?;

    tracing::info!(path = %path.display(), "Generated summary report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_sanitized_for_filenames() {
        assert_eq!(sanitize_session_id("abc-123"), "abc-123");
        assert_eq!(sanitize_session_id("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_session_id("///"), "session");
        assert_eq!(
            report_path(Path::new("/tmp/reports"), "a b"),
            PathBuf::from("/tmp/reports/excel_assessment_ab.pdf")
        );
    }

    #[test]
    fn wrap_respects_width_and_paragraphs() {
        let lines = wrap_text("one two three four\nfive", 9);
        assert_eq!(lines, vec!["one two", "three", "four", "five"]);
        assert!(wrap_text("", 10).is_empty());
    }

    #[test]
    fn renders_pdf_into_report_dir() {
        let dir = tempfile::tempdir().unwrap();
        let record = EvaluationRecord {
            score: Some(82),
            grade: Some("Proficient".to_string()),
            summary: Some("Clear pivots and a tidy chart. ".repeat(20)),
            recommendations: Some(vec!["Label chart axes".to_string()]),
            ..Default::default()
        };

        let path = render_summary_report(&dir.path().join("out"), "3f2a-session", &record).unwrap();
        assert_eq!(path.file_name().unwrap(), "excel_assessment_3f2a-session.pdf");
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_failure_records_without_grade_or_summary() {
        let dir = tempfile::tempdir().unwrap();
        let record = EvaluationRecord {
            score: Some(0),
            feedback: Some("Unable to evaluate".to_string()),
            ..Default::default()
        };
        let path = render_summary_report(dir.path(), "s", &record).unwrap();
        assert!(path.exists());
    }
}
