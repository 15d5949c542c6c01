use serde_json::{json, Value};
use tracing::{info, warn};

use super::handlers::{ToolHandlers, ToolOutput};
use super::tools::{ToolError, ToolInvocation};
use super::upload::UploadedFile;
use crate::shared::inference::{ChatMessage, ToolCallRequest};

/// Outcome of one requested call, paired with the call id it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    pub call_id: String,
    pub function_name: String,
    pub output: Option<ToolOutput>,
    pub body: Value,
}

impl ToolExecution {
    fn failed(call: &ToolCallRequest, error: ToolError) -> Self {
        Self {
            call_id: call.id.clone(),
            function_name: call.function.name.clone(),
            output: None,
            body: json!({ "error": error.to_string() }),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.output.is_some()
    }

    /// Tool-role transcript message carrying the JSON body.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::tool(&self.call_id, self.body.to_string())
    }
}

#[derive(Clone)]
pub struct ToolDispatcher {
    handlers: ToolHandlers,
}

impl ToolDispatcher {
    pub fn new(handlers: ToolHandlers) -> Self {
        Self { handlers }
    }

    /// Runs every call in order and returns exactly one execution per call.
    pub async fn dispatch(
        &self,
        calls: &[ToolCallRequest],
        upload: Option<&UploadedFile>,
    ) -> Vec<ToolExecution> {
        let mut executions = Vec::with_capacity(calls.len());
        for call in calls {
            executions.push(self.dispatch_one(call, upload).await);
        }
        executions
    }

    async fn dispatch_one(
        &self,
        call: &ToolCallRequest,
        upload: Option<&UploadedFile>,
    ) -> ToolExecution {
        info!(
            call_id = %call.id,
            tool = %call.function.name,
            "Executing tool call"
        );

        let invocation = match ToolInvocation::parse(&call.function.name, &call.function.arguments) {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!(call_id = %call.id, error = %e, "Rejected tool call");
                return ToolExecution::failed(call, e);
            }
        };
        let tool = invocation.name();

        let output = match self.handlers.execute(invocation, upload).await {
            Ok(output) => output,
            Err(e) => {
                warn!(call_id = %call.id, %tool, error = %e, "Tool call failed");
                return ToolExecution::failed(call, e);
            }
        };

        match serde_json::to_value(&output) {
            Ok(body) => {
                info!(call_id = %call.id, %tool, "Tool call succeeded");
                ToolExecution {
                    call_id: call.id.clone(),
                    function_name: call.function.name.clone(),
                    output: Some(output),
                    body,
                }
            }
            Err(e) => ToolExecution::failed(
                call,
                ToolError::HandlerFailed {
                    name: tool,
                    detail: e.to_string(),
                },
            ),
        }
    }
}
