use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::dispatcher::{ToolDispatcher, ToolExecution};
use super::evaluation::{EvaluationRecord, Evaluator};
use super::handlers::{ToolHandlers, ToolOutput};
use super::prompt::INTERVIEWER_PROMPT;
use super::tasks::{self, DownloadHelp, TOTAL_STEPS};
use super::tools;
use super::upload::UploadedFile;
use crate::shared::config::Config;
use crate::shared::inference::{
    AssistantReply, ChatMessage, ChatModel, ChatRequest, ModelError, Sampling,
};

/// Follow-up rounds allowed per user turn; the turn makes at most one more
/// model call than this.
pub const MAX_TOOL_ROUNDS: usize = 2;

/// One interview: the transcript plus the little state the shells display.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: Uuid,
    transcript: Vec<ChatMessage>,
    upload: Option<UploadedFile>,
    current_question: u32,
    assessment_started: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub session_id: Uuid,
    pub current_question: u32,
    pub total_steps: u32,
    pub step_titles: Vec<&'static str>,
    pub uploaded_filename: Option<String>,
    pub assessment_started: bool,
    pub download_help: DownloadHelp,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            transcript: vec![ChatMessage::system(INTERVIEWER_PROMPT)],
            upload: None,
            current_question: 0,
            assessment_started: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn uploaded_file(&self) -> Option<&UploadedFile> {
        self.upload.as_ref()
    }

    /// Replaces any previously uploaded workbook.
    pub fn attach_upload(&mut self, file: UploadedFile) {
        info!(session = %self.id, filename = %file.filename, "Attached uploaded workbook");
        self.upload = Some(file);
    }

    pub fn current_question(&self) -> u32 {
        self.current_question
    }

    pub fn assessment_started(&self) -> bool {
        self.assessment_started
    }

    pub fn progress(&self) -> Progress {
        Progress {
            session_id: self.id,
            current_question: self.current_question,
            total_steps: TOTAL_STEPS,
            step_titles: tasks::step_titles(),
            uploaded_filename: self.upload.as_ref().map(|f| f.filename.clone()),
            assessment_started: self.assessment_started,
            download_help: tasks::download_help(),
        }
    }

    fn record_progress(&mut self, executions: &[ToolExecution]) {
        for output in executions.iter().filter_map(|e| e.output.as_ref()) {
            if let Some(step) = output.reached_step() {
                self.current_question = self.current_question.max(step);
                self.assessment_started = true;
            }
            if matches!(output, ToolOutput::Started(_)) {
                self.assessment_started = true;
            }
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// What one user turn produced.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    pub reply: Option<String>,
    pub executions: Vec<ToolExecution>,
    pub evaluations: Vec<EvaluationRecord>,
    pub tool_rounds: usize,
}

/// Runs user turns against the chat model and the tool dispatcher.
#[derive(Clone)]
pub struct ConversationDriver {
    model: Arc<dyn ChatModel>,
    model_name: String,
    dispatcher: ToolDispatcher,
}

impl ConversationDriver {
    pub fn new(model: Arc<dyn ChatModel>, model_name: &str, dispatcher: ToolDispatcher) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            dispatcher,
        }
    }

    /// Wires the evaluator, handlers and dispatcher around one shared model.
    pub fn from_config(config: &Config, model: Arc<dyn ChatModel>) -> Self {
        let evaluator = Evaluator::new(model.clone(), &config.model);
        let handlers = ToolHandlers::new(evaluator, config.report_dir.clone());
        Self::new(model, &config.model, ToolDispatcher::new(handlers))
    }

    pub async fn respond(
        &self,
        conversation: &mut Conversation,
        user_text: &str,
        upload: Option<UploadedFile>,
    ) -> Result<TurnOutcome, ModelError> {
        self.respond_with_progress(conversation, user_text, upload, |_| {})
            .await
    }

    /// Like [`respond`](Self::respond), calling `on_tool_round` with the round
    /// number before each batch of tool calls runs.
    ///
    /// A model failure rolls the transcript back to where it was before the
    /// turn so the user can retry. A workbook attached in the failed turn is
    /// detached again and any earlier upload restored.
    pub async fn respond_with_progress<F>(
        &self,
        conversation: &mut Conversation,
        user_text: &str,
        upload: Option<UploadedFile>,
        mut on_tool_round: F,
    ) -> Result<TurnOutcome, ModelError>
    where
        F: FnMut(usize) + Send,
    {
        let checkpoint = conversation.transcript.len();
        let content = match &upload {
            Some(file) => format!("{} [FILE UPLOADED: {}]", user_text, file.filename),
            None => user_text.to_string(),
        };
        let previous_upload = upload.map(|file| {
            let previous = conversation.upload.take();
            conversation.attach_upload(file);
            previous
        });

        conversation.transcript.push(ChatMessage::user(content));
        info!(
            session = %conversation.id,
            transcript_len = conversation.transcript.len(),
            "User turn"
        );

        match self.run_rounds(conversation, &mut on_tool_round).await {
            Ok(outcome) => {
                conversation.record_progress(&outcome.executions);
                Ok(outcome)
            }
            Err(e) => {
                warn!(session = %conversation.id, error = %e, "Turn failed; rolling back transcript");
                conversation.transcript.truncate(checkpoint);
                if let Some(previous) = previous_upload {
                    conversation.upload = previous;
                }
                Err(e)
            }
        }
    }

    async fn run_rounds<F>(
        &self,
        conversation: &mut Conversation,
        on_tool_round: &mut F,
    ) -> Result<TurnOutcome, ModelError>
    where
        F: FnMut(usize) + Send,
    {
        let mut outcome = TurnOutcome::default();

        loop {
            let reply = self.complete(conversation).await?;

            if !reply.has_tool_calls() || outcome.tool_rounds == MAX_TOOL_ROUNDS {
                if reply.has_tool_calls() {
                    warn!(
                        session = %conversation.id,
                        dropped = reply.tool_calls.len(),
                        "Tool round limit reached; dropping requested tool calls"
                    );
                }
                outcome.reply = reply.text().map(str::to_string);
                conversation
                    .transcript
                    .push(ChatMessage::assistant(reply.content));
                break;
            }

            outcome.tool_rounds += 1;
            info!(
                session = %conversation.id,
                round = outcome.tool_rounds,
                tool_calls = reply.tool_calls.len(),
                "Model requested tools"
            );
            on_tool_round(outcome.tool_rounds);

            let executions = self
                .dispatcher
                .dispatch(&reply.tool_calls, conversation.upload.as_ref())
                .await;
            conversation.transcript.push(ChatMessage::assistant_tool_calls(
                reply.content,
                reply.tool_calls,
            ));
            conversation
                .transcript
                .extend(executions.iter().map(ToolExecution::to_message));
            outcome.executions.extend(executions);
        }

        outcome.evaluations = outcome
            .executions
            .iter()
            .filter_map(|e| e.output.as_ref().and_then(|o| o.evaluation()).cloned())
            .collect();
        Ok(outcome)
    }

    async fn complete(&self, conversation: &Conversation) -> Result<AssistantReply, ModelError> {
        let request = ChatRequest::new(
            &self.model_name,
            conversation.transcript.clone(),
            Sampling::REPRODUCIBLE,
        )
        .with_tools(tools::catalog().to_vec());
        self.model.complete(request).await
    }
}
