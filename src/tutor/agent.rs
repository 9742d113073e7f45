use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{
    state::SessionState,
    tool::{ToolDefinition, ToolManager},
    tools::{ExplainLiteratureTool, GetProgressTool, SolveMathTool, TranslateTextTool},
};
use crate::error::Result;

pub const AGENT_NAME: &str = "student_tutor_agent";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const DESCRIPTION: &str = "A multi-tool student tutor agent that helps with numerical and \
     literary learning, and can operate in multiple languages. Tools: solve_math, \
     explain_literature, translate_text, get_progress.";

const INSTRUCTION: &str = "You are a friendly student tutor. Use the tools when appropriate:\n\
     - solve_math(problem): evaluate or give step hints for numeric/algebra questions.\n\
     - explain_literature(prompt, level): explain literary texts at requested depth.\n\
     - translate_text(text, target_language): translate or switch the student's preferred \
     language.\n\
     - get_progress(): return session-level progress and recent topics.\n\n\
     Keep responses encouraging, adapt explanations to the user's level, and store light session \
     state like recent_topics and preferred_language.";

/// Registration payload for the hosted agent runtime.
pub struct AgentDescriptor {
    pub name: String,
    pub model: String,
    pub description: String,
    pub instruction: String,
    pub tools: ToolManager,
}

/// Serialisable view of an [`AgentDescriptor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AgentManifest {
    pub name: String,
    pub model: String,
    pub description: String,
    pub instruction: String,
    pub tools: Vec<ToolDefinition>,
}

impl AgentDescriptor {
    /// The tutor with its four tools, in the order the runtime should list them.
    pub fn student_tutor(model: impl Into<String>) -> Self {
        let mut tools = ToolManager::new();
        tools.add_tool(SolveMathTool);
        tools.add_tool(ExplainLiteratureTool);
        tools.add_tool(TranslateTextTool);
        tools.add_tool(GetProgressTool);
        Self {
            name: AGENT_NAME.to_string(),
            model: model.into(),
            description: DESCRIPTION.to_string(),
            instruction: INSTRUCTION.to_string(),
            tools,
        }
    }

    pub fn manifest(&self) -> AgentManifest {
        AgentManifest {
            name: self.name.clone(),
            model: self.model.clone(),
            description: self.description.clone(),
            instruction: self.instruction.clone(),
            tools: self.tools.get_tools(),
        }
    }

    pub fn call_tool(&self, name: &str, args: Value, state: &mut SessionState) -> Result<Value> {
        self.tools.call(name, args, state)
    }
}

impl Default for AgentDescriptor {
    fn default() -> Self {
        Self::student_tutor(DEFAULT_MODEL)
    }
}
