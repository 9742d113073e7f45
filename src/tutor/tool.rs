use schemars::{JsonSchema, r#gen::SchemaSettings};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::debug;
use utoipa::ToSchema;

use super::state::SessionState;
use crate::error::{Error, Result};

/// A callable the hosted agent may invoke by name with JSON arguments.
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + JsonSchema;
    type Output: Serialize;
    type Error: std::fmt::Display;

    fn name() -> String;
    fn description() -> Option<String>;
    fn call(
        &self,
        args: Self::Args,
        state: &mut SessionState,
    ) -> std::result::Result<Self::Output, Self::Error>;

    fn definition() -> ToolDefinition {
        let settings = SchemaSettings::draft07().with(|s| {
            s.option_add_null_type = false;
            s.inline_subschemas = true;
        });
        let schema = settings.into_generator().into_root_schema_for::<Self::Args>();
        ToolDefinition {
            name: Self::name(),
            description: Self::description(),
            parameters: json!(schema),
        }
    }
}

/// Function declaration handed to the agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema of the arguments object.
    #[schema(value_type = Object)]
    pub parameters: Value,
}

trait DynTool: Send + Sync {
    fn tool_name(&self) -> String;
    fn tool_definition(&self) -> ToolDefinition;
    fn call_json(&self, args: Value, state: &mut SessionState) -> Result<Value>;
}

impl<T: Tool> DynTool for T {
    fn tool_name(&self) -> String {
        T::name()
    }

    fn tool_definition(&self) -> ToolDefinition {
        T::definition()
    }

    fn call_json(&self, args: Value, state: &mut SessionState) -> Result<Value> {
        // tools without parameters may be called with no body at all
        let args = if args.is_null() { json!({}) } else { args };
        let args: T::Args = serde_json::from_value(args)
            .map_err(|e| Error::Tool(format!("invalid arguments for {}: {}", T::name(), e)))?;
        let output = self
            .call(args, state)
            .map_err(|e| Error::Tool(format!("{} failed: {}", T::name(), e)))?;
        serde_json::to_value(output).map_err(|e| Error::Internal(e.into()))
    }
}

/// Tools in registration order.
#[derive(Default)]
pub struct ToolManager {
    tools: Vec<Box<dyn DynTool>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool`; a tool with the same name replaces the earlier one in place.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = T::name();
        match self.tools.iter().position(|t| t.tool_name() == name) {
            Some(index) => self.tools[index] = Box::new(tool),
            None => self.tools.push(Box::new(tool)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.tool_name()).collect()
    }

    pub fn get_tools(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.tool_definition()).collect()
    }

    pub fn call(&self, name: &str, args: Value, state: &mut SessionState) -> Result<Value> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.tool_name() == name)
            .ok_or_else(|| Error::NotFound(format!("tool {name}")))?;
        debug!("calling tool {} with {}", name, args);
        tool.call_json(args, state)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        /// Text to echo back
        text: String,
    }

    struct Echo;

    impl Tool for Echo {
        type Args = EchoArgs;
        type Output = String;
        type Error = Infallible;
        fn name() -> String {
            "echo".to_string()
        }
        fn description() -> Option<String> {
            Some("Echo the text".to_string())
        }
        fn call(
            &self,
            args: EchoArgs,
            state: &mut SessionState,
        ) -> std::result::Result<String, Infallible> {
            state.record_topic(format!("echo:{}", args.text));
            Ok(args.text)
        }
    }

    #[test]
    fn definition_has_argument_schema() {
        let definition = Echo::definition();
        assert_eq!(definition.name, "echo");
        assert_eq!(definition.parameters["type"], "object");
        assert_eq!(definition.parameters["properties"]["text"]["type"], "string");
        assert_eq!(definition.parameters["required"], json!(["text"]));
    }

    #[test]
    fn dispatch_by_name() {
        let mut manager = ToolManager::new();
        manager.add_tool(Echo);
        let mut state = SessionState::default();
        let output = manager
            .call("echo", json!({ "text": "hi" }), &mut state)
            .unwrap();
        assert_eq!(output, json!("hi"));
        assert_eq!(state.recent_topics, ["echo:hi"]);
    }

    #[test]
    fn unknown_tool_and_bad_arguments() {
        let mut manager = ToolManager::new();
        manager.add_tool(Echo);
        let mut state = SessionState::default();
        assert!(matches!(
            manager.call("nope", json!({}), &mut state),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.call("echo", json!({ "text": 3 }), &mut state),
            Err(Error::Tool(_))
        ));
        assert!(state.recent_topics.is_empty());
    }

    #[test]
    fn re_registering_replaces() {
        let mut manager = ToolManager::new();
        manager.add_tool(Echo);
        manager.add_tool(Echo);
        assert_eq!(manager.names(), ["echo"]);
    }
}
