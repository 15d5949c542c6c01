use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use super::evaluation::{EvaluationRecord, Evaluator};
use super::report;
use super::tasks::{self, SAMPLE_FILE_NAME, TOTAL_STEPS};
use super::tools::{ToolError, ToolInvocation, ToolName};
use super::upload::UploadedFile;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentStarted {
    pub session_id: String,
    pub message: String,
    pub status: &'static str,
    pub next_step: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub session_id: String,
    pub question_number: u32,
    pub total_steps: u32,
    pub question_title: &'static str,
    pub question: &'static str,
    pub task: &'static str,
    pub expected_response: &'static str,
    pub sample_file: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentComplete {
    pub status: &'static str,
    pub message: &'static str,
    pub next_action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkbookEvaluation {
    Evaluated {
        session_id: String,
        task_id: String,
        filename: String,
        #[serde(flatten)]
        evaluation: EvaluationRecord,
    },
    NoFile {
        error: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamlinedEvaluation {
    pub evaluation_type: &'static str,
    pub workbook_summary: String,
    #[serde(flatten)]
    pub evaluation: EvaluationRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub session_id: String,
    pub evaluation: EvaluationRecord,
    pub pdf_report: String,
    pub summary_status: &'static str,
}

/// Result of one successful handler run; serializes to the tool message body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Started(AssessmentStarted),
    Task(TaskRecord),
    Complete(AssessmentComplete),
    Workbook(WorkbookEvaluation),
    Streamlined(StreamlinedEvaluation),
    Summary(SummaryReport),
}

impl ToolOutput {
    pub fn evaluation(&self) -> Option<&EvaluationRecord> {
        match self {
            ToolOutput::Workbook(WorkbookEvaluation::Evaluated { evaluation, .. }) => Some(evaluation),
            ToolOutput::Streamlined(streamlined) => Some(&streamlined.evaluation),
            ToolOutput::Summary(summary) => Some(&summary.evaluation),
            _ => None,
        }
    }

    /// Step number this output moves the interview to, if any.
    pub fn reached_step(&self) -> Option<u32> {
        match self {
            ToolOutput::Task(task) => Some(task.question_number),
            ToolOutput::Complete(_) => Some(TOTAL_STEPS),
            _ => None,
        }
    }
}

const NO_FILE_MESSAGE: &str = "No file uploaded. Please upload your Excel workbook first.";

/// The six tool handlers. Stateless apart from the evaluator and report directory.
#[derive(Clone)]
pub struct ToolHandlers {
    evaluator: Evaluator,
    report_dir: PathBuf,
}

impl ToolHandlers {
    pub fn new(evaluator: Evaluator, report_dir: PathBuf) -> Self {
        Self {
            evaluator,
            report_dir,
        }
    }

    pub async fn execute(
        &self,
        invocation: ToolInvocation,
        upload: Option<&UploadedFile>,
    ) -> Result<ToolOutput, ToolError> {
        let output = match invocation {
            ToolInvocation::StartExcelAssessment(args) => {
                ToolOutput::Started(start_excel_assessment(&args.candidate_name))
            }
            ToolInvocation::GenerateExcelTask(args) => {
                ToolOutput::Task(generate_excel_task(&args.session_id, args.question_number))
            }
            ToolInvocation::NextExcelQuestion(args) => {
                next_excel_question(&args.session_id, args.current_question)
            }
            ToolInvocation::EvaluateWorkbook(args) => ToolOutput::Workbook(
                self.evaluate_workbook(&args.session_id, &args.task_id, upload)
                    .await,
            ),
            ToolInvocation::SummarizeAssessment(args) => {
                ToolOutput::Summary(self.summarize_assessment(&args.session_id).await?)
            }
            ToolInvocation::LlmEvaluateExcel(args) => {
                ToolOutput::Streamlined(self.llm_evaluate_excel(&args.workbook_summary).await)
            }
        };
        Ok(output)
    }

    pub async fn evaluate_workbook(
        &self,
        session_id: &str,
        task_id: &str,
        upload: Option<&UploadedFile>,
    ) -> WorkbookEvaluation {
        let Some(file) = upload else {
            warn!(session_id, task_id, "No file data provided for workbook evaluation");
            return WorkbookEvaluation::NoFile {
                error: NO_FILE_MESSAGE,
            };
        };

        info!(session_id, task_id, filename = %file.filename, "Evaluating uploaded workbook");
        let evaluation = self.evaluator.evaluate_upload(file, task_id).await;
        WorkbookEvaluation::Evaluated {
            session_id: session_id.to_string(),
            task_id: task_id.to_string(),
            filename: file.filename.clone(),
            evaluation,
        }
    }

    pub async fn llm_evaluate_excel(&self, workbook_summary: &str) -> StreamlinedEvaluation {
        let evaluation = self.evaluator.evaluate_summary(workbook_summary).await;
        StreamlinedEvaluation {
            evaluation_type: "streamlined",
            workbook_summary: workbook_summary.to_string(),
            evaluation,
        }
    }

    pub async fn summarize_assessment(&self, session_id: &str) -> Result<SummaryReport, ToolError> {
        info!(session_id, "Summarizing assessment");
        let payload = json!({
            "session_id": session_id,
            "request_type": "final_summary",
        })
        .to_string();
        let evaluation = self.evaluator.evaluate_summary(&payload).await;

        let path = report::render_summary_report(&self.report_dir, session_id, &evaluation)
            .map_err(|e| ToolError::HandlerFailed {
                name: ToolName::SummarizeAssessment,
                detail: e.to_string(),
            })?;

        Ok(SummaryReport {
            session_id: session_id.to_string(),
            evaluation,
            pdf_report: path.display().to_string(),
            summary_status: "complete",
        })
    }
}

pub fn start_excel_assessment(candidate_name: &str) -> AssessmentStarted {
    let session_id = Uuid::new_v4().to_string();
    info!(%session_id, candidate = candidate_name, "Starting assessment");
    AssessmentStarted {
        session_id,
        message: format!(
            "Hello {}! I'm your Excel Interview Agent. Let's begin your Excel proficiency assessment.",
            candidate_name
        ),
        status: "assessment_started",
        next_step: "I will now give you the assessment tasks. You'll need to download a sample file to complete the exercises.",
    }
}

/// Builds the record for one step. Numbers outside 1..=6 resolve to step 1.
/// Out-of-range numbers, negatives included, fall back to the first step.
pub fn generate_excel_task(session_id: &str, question_number: i64) -> TaskRecord {
    let definition = tasks::lookup(question_number);
    let task_id = Uuid::new_v4().to_string();
    info!(
        session_id,
        requested = question_number,
        question_number = definition.number,
        %task_id,
        "Generated task"
    );

    TaskRecord {
        task_id,
        session_id: session_id.to_string(),
        question_number: definition.number,
        total_steps: TOTAL_STEPS,
        question_title: definition.title,
        question: definition.question,
        task: definition.task,
        expected_response: definition.expected_response,
        sample_file: (definition.number == 1).then_some(SAMPLE_FILE_NAME),
    }
}

pub fn next_excel_question(session_id: &str, current_question: i64) -> ToolOutput {
    let next = current_question.saturating_add(1);
    info!(session_id, from = current_question, to = next, "Advancing question");

    if next > i64::from(TOTAL_STEPS) {
        return ToolOutput::Complete(AssessmentComplete {
            status: "assessment_complete",
            message: "Congratulations! You've completed all the Excel assessment questions. Please upload your final Excel file for evaluation.",
            next_action: "upload_file",
        });
    }
    ToolOutput::Task(generate_excel_task(session_id, next))
}
