use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown function: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {name}: {detail}")]
    InvalidArguments { name: ToolName, detail: String },

    #[error("Tool function {name} failed: {detail}")]
    HandlerFailed { name: ToolName, detail: String },
}

/// Every function the interviewer model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    StartExcelAssessment,
    GenerateExcelTask,
    NextExcelQuestion,
    EvaluateWorkbook,
    SummarizeAssessment,
    LlmEvaluateExcel,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::StartExcelAssessment,
        ToolName::GenerateExcelTask,
        ToolName::NextExcelQuestion,
        ToolName::EvaluateWorkbook,
        ToolName::SummarizeAssessment,
        ToolName::LlmEvaluateExcel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::StartExcelAssessment => "start_excel_assessment",
            ToolName::GenerateExcelTask => "generate_excel_task",
            ToolName::NextExcelQuestion => "next_excel_question",
            ToolName::EvaluateWorkbook => "evaluate_workbook",
            ToolName::SummarizeAssessment => "summarize_assessment",
            ToolName::LlmEvaluateExcel => "llm_evaluate_excel",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ToolName::StartExcelAssessment => "Initialize a session for the Excel assessment",
            ToolName::GenerateExcelTask => "Assign an Excel assessment step to the candidate",
            ToolName::NextExcelQuestion => "Move to the next Excel assessment question",
            ToolName::EvaluateWorkbook => {
                "Evaluate the Excel workbook the candidate uploaded in this turn. The file is \
                 supplied by the interview shell; do not pass its contents."
            }
            ToolName::SummarizeAssessment => {
                "Generate a summary of the Excel assessment and write a PDF report"
            }
            ToolName::LlmEvaluateExcel => {
                "Evaluate the candidate's Excel workbook from a short summary and provide a score, \
                 feedback and recommendations"
            }
        }
    }

    fn parameters(&self) -> Value {
        match self {
            ToolName::StartExcelAssessment => json!({
                "type": "object",
                "properties": {"candidate_name": {"type": "string"}},
                "required": ["candidate_name"]
            }),
            ToolName::GenerateExcelTask => json!({
                "type": "object",
                "properties": {
                    "session_id": {"type": "string"},
                    "question_number": {"type": "integer", "description": "Step number (1-6)"}
                },
                "required": ["session_id"],
                "additionalProperties": false
            }),
            ToolName::NextExcelQuestion => json!({
                "type": "object",
                "properties": {
                    "session_id": {"type": "string"},
                    "current_question": {"type": "integer", "description": "Current step number"}
                },
                "required": ["session_id", "current_question"],
                "additionalProperties": false
            }),
            ToolName::EvaluateWorkbook => json!({
                "type": "object",
                "properties": {
                    "session_id": {"type": "string"},
                    "task_id": {"type": "string"}
                },
                "required": ["session_id", "task_id"],
                "additionalProperties": false
            }),
            ToolName::SummarizeAssessment => json!({
                "type": "object",
                "properties": {"session_id": {"type": "string"}},
                "required": ["session_id"]
            }),
            ToolName::LlmEvaluateExcel => json!({
                "type": "object",
                "properties": {
                    "workbook_summary": {
                        "type": "string",
                        "description": "A short JSON-style summary of the workbook's pivot tables, charts and regions"
                    }
                },
                "required": ["workbook_summary"],
                "additionalProperties": false
            }),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .iter()
            .copied()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }
}

static CATALOG: Lazy<Vec<Value>> = Lazy::new(|| {
    ToolName::ALL
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.as_str(),
                    "description": tool.description(),
                    "parameters": tool.parameters(),
                }
            })
        })
        .collect()
});

/// Function definitions sent with every conversational model call.
pub fn catalog() -> &'static [Value] {
    &CATALOG
}

fn first_step() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StartAssessmentArgs {
    pub candidate_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerateTaskArgs {
    pub session_id: String,
    #[serde(default = "first_step")]
    pub question_number: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NextQuestionArgs {
    pub session_id: String,
    #[serde(default = "first_step")]
    pub current_question: i64,
}

/// Unknown keys such as a stray `workbook_bytes` are ignored; the file comes
/// from the shell's upload context.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluateWorkbookArgs {
    pub session_id: String,
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SummarizeArgs {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkbookSummaryArgs {
    pub workbook_summary: String,
}

/// A tool call validated against its typed argument struct.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    StartExcelAssessment(StartAssessmentArgs),
    GenerateExcelTask(GenerateTaskArgs),
    NextExcelQuestion(NextQuestionArgs),
    EvaluateWorkbook(EvaluateWorkbookArgs),
    SummarizeAssessment(SummarizeArgs),
    LlmEvaluateExcel(WorkbookSummaryArgs),
}

impl ToolInvocation {
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolError> {
        let tool: ToolName = name.parse()?;
        let invocation = match tool {
            ToolName::StartExcelAssessment => {
                ToolInvocation::StartExcelAssessment(decode(tool, arguments)?)
            }
            ToolName::GenerateExcelTask => ToolInvocation::GenerateExcelTask(decode(tool, arguments)?),
            ToolName::NextExcelQuestion => ToolInvocation::NextExcelQuestion(decode(tool, arguments)?),
            ToolName::EvaluateWorkbook => ToolInvocation::EvaluateWorkbook(decode(tool, arguments)?),
            ToolName::SummarizeAssessment => {
                ToolInvocation::SummarizeAssessment(decode(tool, arguments)?)
            }
            ToolName::LlmEvaluateExcel => ToolInvocation::LlmEvaluateExcel(decode(tool, arguments)?),
        };
        Ok(invocation)
    }

    pub fn name(&self) -> ToolName {
        match self {
            ToolInvocation::StartExcelAssessment(_) => ToolName::StartExcelAssessment,
            ToolInvocation::GenerateExcelTask(_) => ToolName::GenerateExcelTask,
            ToolInvocation::NextExcelQuestion(_) => ToolName::NextExcelQuestion,
            ToolInvocation::EvaluateWorkbook(_) => ToolName::EvaluateWorkbook,
            ToolInvocation::SummarizeAssessment(_) => ToolName::SummarizeAssessment,
            ToolInvocation::LlmEvaluateExcel(_) => ToolName::LlmEvaluateExcel,
        }
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, arguments: &str) -> Result<T, ToolError> {
    // Some models send an empty string for calls without arguments.
    let raw = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
        name: tool,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lists_six_functions_in_order() {
        let names: Vec<&str> = catalog()
            .iter()
            .map(|entry| entry["function"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "start_excel_assessment",
                "generate_excel_task",
                "next_excel_question",
                "evaluate_workbook",
                "summarize_assessment",
                "llm_evaluate_excel",
            ]
        );
        assert!(catalog().iter().all(|entry| entry["type"] == "function"));
    }

    #[test]
    fn evaluate_workbook_does_not_declare_file_bytes() {
        let entry = catalog()
            .iter()
            .find(|entry| entry["function"]["name"] == "evaluate_workbook")
            .unwrap();
        let params = &entry["function"]["parameters"];
        assert!(params["properties"].get("workbook_bytes").is_none());
        assert_eq!(params["required"], json!(["session_id", "task_id"]));
    }

    #[test]
    fn optional_step_numbers_default_to_one() {
        let parsed = ToolInvocation::parse("generate_excel_task", r#"{"session_id":"s1"}"#).unwrap();
        assert_eq!(
            parsed,
            ToolInvocation::GenerateExcelTask(GenerateTaskArgs {
                session_id: "s1".to_string(),
                question_number: 1,
            })
        );

        let parsed = ToolInvocation::parse("next_excel_question", r#"{"session_id":"s1"}"#).unwrap();
        assert!(matches!(
            parsed,
            ToolInvocation::NextExcelQuestion(NextQuestionArgs { current_question: 1, .. })
        ));
    }

    #[test]
    fn stray_workbook_bytes_are_ignored() {
        let parsed = ToolInvocation::parse(
            "evaluate_workbook",
            r#"{"session_id":"s","task_id":"t","workbook_bytes":"AAAA"}"#,
        )
        .unwrap();
        assert_eq!(parsed.name(), ToolName::EvaluateWorkbook);
    }

    #[test]
    fn unknown_names_and_bad_payloads_are_typed_errors() {
        assert_eq!(
            ToolInvocation::parse("delete_everything", "{}").unwrap_err(),
            ToolError::UnknownTool("delete_everything".to_string())
        );

        let err = ToolInvocation::parse("summarize_assessment", "{not json").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Invalid arguments for summarize_assessment:"));

        let err = ToolInvocation::parse("start_excel_assessment", "").unwrap_err();
        assert!(err.to_string().contains("candidate_name"));

        let err =
            ToolInvocation::parse("next_excel_question", r#"{"session_id":"s","current_question":"two"}"#)
                .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { name: ToolName::NextExcelQuestion, .. }));
    }

    #[test]
    fn names_round_trip_through_display() {
        for tool in ToolName::ALL {
            assert_eq!(tool.to_string().parse::<ToolName>().unwrap(), tool);
        }
    }
}
