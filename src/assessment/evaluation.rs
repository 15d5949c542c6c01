use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::schema;
use super::upload::UploadedFile;
use crate::shared::inference::{
    ChatMessage, ChatModel, ChatRequest, ModelError, ResponseFormat, Sampling,
};

pub const MAX_SCORE: u32 = 100;

/// Rubric categories and their maximum points, in display order.
pub const CATEGORIES: [(&str, &str, u32); 5] = [
    ("technical_accuracy", "Technical Accuracy", 30),
    ("pivot_tables", "Pivot Tables", 25),
    ("visualization", "Visualization", 20),
    ("data_organization", "Data Organization", 15),
    ("presentation", "Presentation", 10),
];

const UPLOAD_RETRY_HINT: &str = "Please try uploading the file again or contact support";
const SUMMARY_RETRY_HINT: &str = "Please try again or contact support";

static EVALUATION_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let nullable_int = |description: &str| json!({"type": ["integer", "null"], "description": description});
    let nullable_text = |description: &str| json!({"type": ["string", "null"], "description": description});
    schema::strict(json!({
        "title": "EvaluationFeedback",
        "type": "object",
        "properties": {
            "score": nullable_int("Overall score from 0 to 100"),
            "technical_accuracy": nullable_int("Formulas, calculations and data handling, 0 to 30"),
            "pivot_tables": nullable_int("Pivot tables and summarisation, 0 to 25"),
            "visualization": nullable_int("Charts and visual clarity, 0 to 20"),
            "data_organization": nullable_int("Structure, layout and readability, 0 to 15"),
            "presentation": nullable_int("Formatting and overall presentation, 0 to 10"),
            "grade": nullable_text("One of Expert, Proficient, Competent, Basic, Needs Training"),
            "summary": nullable_text("Two or three sentence summary of the candidate's work"),
            "feedback": nullable_text("Qualitative feedback"),
            "recommendations": {
                "type": ["array", "null"],
                "items": {"type": "string"},
                "description": "Recommended improvements or next steps"
            }
        }
    }))
});

/// JSON schema the model's structured output is pinned to.
pub fn evaluation_schema() -> &'static Value {
    &EVALUATION_SCHEMA
}

/// Structured result of one evaluation call. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub score: Option<u32>,
    pub technical_accuracy: Option<u32>,
    pub pivot_tables: Option<u32>,
    pub visualization: Option<u32>,
    pub data_organization: Option<u32>,
    pub presentation: Option<u32>,
    pub grade: Option<String>,
    pub summary: Option<String>,
    pub feedback: Option<String>,
    pub recommendations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub key: &'static str,
    pub label: &'static str,
    pub score: u32,
    pub max: u32,
}

impl EvaluationRecord {
    fn failure(feedback: String, hint: &str) -> Self {
        Self {
            score: Some(0),
            feedback: Some(feedback),
            recommendations: Some(vec![hint.to_string()]),
            ..Default::default()
        }
    }

    fn sub_score(&self, key: &str) -> Option<u32> {
        match key {
            "technical_accuracy" => self.technical_accuracy,
            "pivot_tables" => self.pivot_tables,
            "visualization" => self.visualization,
            "data_organization" => self.data_organization,
            "presentation" => self.presentation,
            _ => None,
        }
    }

    /// Per-category scores for display; a missing category counts as zero.
    pub fn category_scores(&self) -> Vec<CategoryScore> {
        CATEGORIES
            .iter()
            .map(|(key, label, max)| CategoryScore {
                key,
                label,
                score: self.sub_score(key).unwrap_or(0),
                max: *max,
            })
            .collect()
    }

    pub fn recommendations(&self) -> &[String] {
        self.recommendations.as_deref().unwrap_or(&[])
    }
}

/// Maps an overall score onto the proficiency bands.
pub fn grade_for(score: u32) -> &'static str {
    match score {
        90.. => "Expert",
        80..=89 => "Proficient",
        70..=79 => "Competent",
        60..=69 => "Basic",
        _ => "Needs Training",
    }
}

/// Wire shape of the model output; numbers are loose so a stray float or
/// out-of-range value is clamped rather than rejected.
#[derive(Debug, Deserialize)]
struct RawEvaluation {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    technical_accuracy: Option<f64>,
    #[serde(default)]
    pivot_tables: Option<f64>,
    #[serde(default)]
    visualization: Option<f64>,
    #[serde(default)]
    data_organization: Option<f64>,
    #[serde(default)]
    presentation: Option<f64>,
    #[serde(default)]
    grade: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    recommendations: Option<Vec<String>>,
}

fn clamp_points(value: Option<f64>, max: u32) -> Option<u32> {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, max as f64) as u32)
}

impl From<RawEvaluation> for EvaluationRecord {
    fn from(raw: RawEvaluation) -> Self {
        let mut record = EvaluationRecord {
            score: clamp_points(raw.score, MAX_SCORE),
            technical_accuracy: clamp_points(raw.technical_accuracy, CATEGORIES[0].2),
            pivot_tables: clamp_points(raw.pivot_tables, CATEGORIES[1].2),
            visualization: clamp_points(raw.visualization, CATEGORIES[2].2),
            data_organization: clamp_points(raw.data_organization, CATEGORIES[3].2),
            presentation: clamp_points(raw.presentation, CATEGORIES[4].2),
            grade: raw.grade.filter(|g| !g.trim().is_empty()),
            summary: raw.summary,
            feedback: raw.feedback,
            recommendations: raw.recommendations,
        };

        if record.score.is_none() {
            let total: u32 = record.category_scores().iter().map(|c| c.score).sum();
            record.score = Some(total.min(MAX_SCORE));
        }
        if record.grade.is_none() {
            record.grade = record.score.map(|s| grade_for(s).to_string());
        }
        record
    }
}

#[derive(Error, Debug)]
enum EvaluationError {
    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("model returned an empty evaluation")]
    EmptyContent,

    #[error("{0}")]
    Parse(#[from] serde_json::Error),
}

/// Issues structured-output evaluation requests and never fails outward:
/// every error path becomes a zero-score record.
#[derive(Clone)]
pub struct Evaluator {
    model: Arc<dyn ChatModel>,
    model_name: String,
}

impl Evaluator {
    pub fn new(model: Arc<dyn ChatModel>, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }

    /// Full rubric evaluation of an uploaded workbook. The model only sees
    /// the file's metadata, not its bytes.
    pub async fn evaluate_upload(&self, file: &UploadedFile, task_id: &str) -> EvaluationRecord {
        info!(filename = %file.filename, task_id, "Starting workbook evaluation");

        let messages = vec![
            ChatMessage::system(rubric_prompt(file, task_id)),
            ChatMessage::user(format!(
                "Please evaluate this Excel workbook and provide an evaluation framework. File: {} ({:.1} KB)",
                file.filename,
                file.size_kb()
            )),
        ];
        let request = ChatRequest::new(&self.model_name, messages, Sampling::DETERMINISTIC)
            .with_response_format(ResponseFormat::strict_schema(
                "excel_evaluation",
                evaluation_schema().clone(),
            ));

        match self.run(request).await {
            Ok(record) => record,
            Err(EvaluationError::Parse(e)) => {
                warn!(error = %e, "Workbook evaluation returned malformed JSON");
                EvaluationRecord::failure(
                    format!("JSON parsing error in evaluation. Error: {}", e),
                    UPLOAD_RETRY_HINT,
                )
            }
            Err(e) => {
                warn!(error = %e, "Workbook evaluation failed");
                EvaluationRecord::failure(
                    format!("Unable to evaluate the workbook at this time. Error: {}", e),
                    UPLOAD_RETRY_HINT,
                )
            }
        }
    }

    /// Evaluation from a free-text workbook summary, with pinned sampling.
    pub async fn evaluate_summary(&self, workbook_summary: &str) -> EvaluationRecord {
        info!(
            summary_chars = workbook_summary.chars().count(),
            "Starting streamlined evaluation"
        );

        let messages = vec![
            ChatMessage::system(
                "You are a strict but fair Excel interviewer. Given the workbook summary, evaluate the \
                 candidate's effort. Respond in JSON with an overall score (0-100), the five category \
                 scores, a grade, a short summary, qualitative feedback, and action recommendations \
                 as a list of strings.",
            ),
            ChatMessage::user(format!("Workbook Summary:\n{}", workbook_summary)),
        ];
        let request = ChatRequest::new(&self.model_name, messages, Sampling::REPRODUCIBLE)
            .with_response_format(ResponseFormat::strict_schema(
                "evaluation_feedback",
                evaluation_schema().clone(),
            ));

        match self.run(request).await {
            Ok(record) => record,
            Err(EvaluationError::Parse(e)) => {
                warn!(error = %e, "Streamlined evaluation returned malformed JSON");
                EvaluationRecord::failure(
                    format!("JSON parsing error in streamlined evaluation. Error: {}", e),
                    SUMMARY_RETRY_HINT,
                )
            }
            Err(e) => {
                warn!(error = %e, "Streamlined evaluation failed");
                EvaluationRecord::failure(
                    format!("Unable to evaluate the workbook summary. Error: {}", e),
                    SUMMARY_RETRY_HINT,
                )
            }
        }
    }

    async fn run(&self, request: ChatRequest) -> Result<EvaluationRecord, EvaluationError> {
        let reply = self.model.complete(request).await?;
        let content = reply.text().ok_or(EvaluationError::EmptyContent)?;
        let raw: RawEvaluation = serde_json::from_str(content)?;
        let record = EvaluationRecord::from(raw);
        info!(score = ?record.score, grade = ?record.grade, "Evaluation completed");
        Ok(record)
    }
}

fn rubric_prompt(file: &UploadedFile, task_id: &str) -> String {
    let mut rubric = String::new();
    for (index, (_, label, max)) in CATEGORIES.iter().enumerate() {
        rubric.push_str(&format!("{}. {} ({} points)\n", index + 1, label, max));
    }

    format!(
        "You are an Excel evaluation expert reviewing a candidate's submitted workbook.\n\n\
         Task context:\n\
         - Task ID: {task_id}\n\
         - Filename: {filename}\n\
         - File size: {size:.1} KB\n\n\
         Score the workbook against this rubric:\n{rubric}\n\
         Report each category score, the overall score out of {max_score} (the sum of the \
         categories), a grade, a short summary, specific feedback on what was done well and \
         what to improve, and actionable recommendations.\n\n\
         You cannot open the file itself. Give an evaluation framework based on the task, and \
         say where manual review is needed.",
        task_id = task_id,
        filename = file.filename,
        size = file.size_kb(),
        rubric = rubric,
        max_score = MAX_SCORE,
    )
}
