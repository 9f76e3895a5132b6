//! Content generation gateway
//!
//! The single boundary between the engine and the LLM. One logical call per
//! invocation: build a completion request that forces a `submit_{level}` tool
//! call whose input schema is the registry contract, normalize whatever shape
//! comes back into the canonical one, and validate it. Anything past this
//! point in the engine only ever sees canonical, schema-conformant values.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, ToolDefinition};
use crate::schema::{LevelKey, SchemaRegistry, Violation};

/// Default max tokens per generation call
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// A generation call failed or produced unusable content
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed generation output: {0}")]
    Malformed(String),

    #[error("Schema violation for {level}: {violation}")]
    Schema {
        level: &'static str,
        violation: Violation,
    },

    #[error("Instruction template error: {0}")]
    Template(String),
}

/// Gateway from level keys to validated level content
pub struct GenerationGateway {
    llm: Arc<dyn LlmClient>,
    registry: SchemaRegistry,
    max_tokens: u32,
}

impl GenerationGateway {
    /// Create a gateway over an LLM client
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            registry: SchemaRegistry::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Override the per-call token budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The schema registry this gateway validates against
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Generate content for a level
    ///
    /// `payload` is a read-only slice of the parent level's output;
    /// `instruction` is the rendered system prompt. Returns the canonical,
    /// validated value or a `GenerationError`. No retry here beyond the
    /// client's own transport retries - fallback policy lives in the engine.
    pub async fn generate(&self, level: LevelKey, payload: &Value, instruction: &str) -> Result<Value, GenerationError> {
        debug!(level = %level, "generate: called");
        let schema = self.registry.get(level);

        let tool = ToolDefinition::new(level.tool_name(), schema.description, schema.schema.clone());

        let user_text = serde_json::to_string_pretty(payload).map_err(LlmError::Json)?;

        let request = CompletionRequest {
            system_prompt: instruction.to_string(),
            messages: vec![Message::user(user_text)],
            tools: vec![tool],
            max_tokens: self.max_tokens,
        };

        let response = self.llm.complete(request).await?;
        debug!(
            level = %level,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "generate: response received"
        );

        let raw = extract_payload(&response, level)?;
        let value = canonical_shape(level, raw);

        schema.validate(&value).map_err(|violation| {
            warn!(level = %level, %violation, "generate: schema violation");
            GenerationError::Schema {
                level: level.as_str(),
                violation,
            }
        })?;

        Ok(value)
    }
}

/// Pull the structured payload out of a completion response
///
/// Prefers the forced tool call; falls back to parsing the text content as
/// JSON when the model answered inline instead of calling the tool.
fn extract_payload(response: &CompletionResponse, level: LevelKey) -> Result<Value, GenerationError> {
    for tool_call in &response.tool_calls {
        if tool_call.name == level.tool_name() {
            return Ok(tool_call.input.clone());
        }
    }

    if let Some(content) = &response.content
        && let Ok(value) = serde_json::from_str::<Value>(content)
    {
        debug!(level = %level, "extract_payload: parsed inline JSON content");
        return Ok(value);
    }

    Err(GenerationError::Malformed(format!(
        "no {} tool call and no parseable JSON content",
        level.tool_name()
    )))
}

/// Map accepted external shapes into the canonical one
///
/// Models sometimes return the collection as a bare array, or nested under
/// the level key instead of the collection key. Both are folded into the
/// canonical object here so the engine never sees variant shapes.
fn canonical_shape(level: LevelKey, value: Value) -> Value {
    let Some(collection_key) = level.collection_key() else {
        return value;
    };

    // Bare array at the top level
    if value.is_array() {
        return serde_json::json!({ collection_key: value });
    }

    if let Value::Object(mut obj) = value {
        // Collection nested under the level key, e.g. {"strategicBranches": [...]}
        if !obj.contains_key(collection_key)
            && obj.get(level.as_str()).map(Value::is_array).unwrap_or(false)
            && let Some(moved) = obj.remove(level.as_str())
        {
            obj.insert(collection_key.to_string(), moved);
        }
        return Value::Object(obj);
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{StopReason, TokenUsage, ToolCall};
    use serde_json::json;

    fn tool_response(name: &str, input: Value) -> CompletionResponse {
        CompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "toolu_1".to_string(),
                name: name.to_string(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }
    }

    fn text_response(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(content.to_string()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    #[tokio::test]
    async fn test_generate_via_tool_call() {
        let input = json!({
            "domain": "language-learning",
            "refinedGoal": "Hold a 10-minute conversation in Spanish",
            "successCriteria": ["order food", "ask directions"]
        });
        let client = MockLlmClient::new(vec![tool_response("submit_goal_context", input.clone())]);
        let gateway = GenerationGateway::new(Arc::new(client));

        let value = gateway
            .generate(LevelKey::GoalContext, &json!({"goal": "learn spanish"}), "instruction")
            .await
            .unwrap();

        assert_eq!(value, input);
    }

    #[tokio::test]
    async fn test_generate_inline_json_fallback() {
        let client = MockLlmClient::new(vec![text_response(
            r#"{"domain": "music", "refinedGoal": "play", "successCriteria": ["one song"]}"#,
        )]);
        let gateway = GenerationGateway::new(Arc::new(client));

        let value = gateway
            .generate(LevelKey::GoalContext, &json!({}), "instruction")
            .await
            .unwrap();

        assert_eq!(value["domain"], "music");
    }

    #[tokio::test]
    async fn test_generate_schema_violation() {
        // Missing required successCriteria
        let client = MockLlmClient::new(vec![tool_response(
            "submit_goal_context",
            json!({"domain": "music", "refinedGoal": "play"}),
        )]);
        let gateway = GenerationGateway::new(Arc::new(client));

        let result = gateway.generate(LevelKey::GoalContext, &json!({}), "instruction").await;
        assert!(matches!(result, Err(GenerationError::Schema { .. })));
    }

    #[tokio::test]
    async fn test_generate_malformed() {
        let client = MockLlmClient::new(vec![text_response("I cannot do that")]);
        let gateway = GenerationGateway::new(Arc::new(client));

        let result = gateway.generate(LevelKey::GoalContext, &json!({}), "instruction").await;
        assert!(matches!(result, Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_canonical_shape_bare_array() {
        let value = json!([
            {"description": "a"},
            {"description": "b"},
            {"description": "c"}
        ]);
        let canonical = canonical_shape(LevelKey::StrategicBranches, value);
        assert!(canonical["branches"].is_array());
        assert_eq!(canonical["branches"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_canonical_shape_level_key_nesting() {
        let value = json!({
            "strategicBranches": [
                {"description": "a"},
                {"description": "b"},
                {"description": "c"}
            ]
        });
        let canonical = canonical_shape(LevelKey::StrategicBranches, value);
        assert!(canonical["branches"].is_array());
        assert!(canonical.get("strategicBranches").is_none());
    }

    #[test]
    fn test_canonical_shape_passthrough() {
        let value = json!({
            "branches": [{"description": "a"}]
        });
        let canonical = canonical_shape(LevelKey::StrategicBranches, value.clone());
        assert_eq!(canonical, value);
    }
}
