//! Agent implementation - a single specialist worker

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{BrigadeError, Result};
use crate::knowledge::KnowledgeBase;
use crate::model::{ChatMessage, CompletionClient, CompletionRequest};
use crate::schema::ResponseSchema;
use crate::tools::{Tool, ToolRegistry};

/// Unique agent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Declarative description of an agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Stable name used for routing and context attribution
    pub name: String,
    /// One-line role statement, first line of the system prompt
    pub role: String,
    /// Behavioral instructions appended to the system prompt
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Topics this agent claims; drives keyword routing
    #[serde(default)]
    pub specialties: Vec<String>,
    /// Names of registry tools this agent may call
    #[serde(default)]
    pub tool_bindings: Vec<String>,
    /// Include the current date and time in the system prompt
    #[serde(default)]
    pub add_datetime: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            instructions: Vec::new(),
            specialties: Vec::new(),
            tool_bindings: Vec::new(),
            add_datetime: false,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions = instructions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_specialties<I, S>(mut self, specialties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specialties = specialties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tools<I, S>(mut self, tool_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_bindings = tool_names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_datetime(mut self) -> Self {
        self.add_datetime = true;
        self
    }
}

/// The reply an agent produces for one task.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub agent: String,
    pub content: String,
    /// Present when the agent has a response schema bound
    pub structured: Option<Value>,
}

/// How many tool calls one response may trigger before the agent answers
/// from what it has.
const MAX_TOOL_ROUNDS: usize = 4;

/// A single specialist worker
pub struct Agent {
    /// Unique identifier
    pub id: AgentId,
    /// Role description
    pub spec: AgentSpec,
    /// Completion backend
    client: Arc<dyn CompletionClient>,
    /// Tools resolved from the registry at construction
    tools: Vec<Arc<dyn Tool>>,
    /// Optional knowledge base searched per query
    knowledge: Option<Arc<KnowledgeBase>>,
    /// Optional structured-output contract
    schema: Option<Arc<dyn ResponseSchema>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent, resolving its tool bindings eagerly.
    ///
    /// An unknown tool name fails construction rather than the first run
    /// that happens to need it.
    pub fn new(
        spec: AgentSpec,
        client: Arc<dyn CompletionClient>,
        registry: &ToolRegistry,
    ) -> Result<Self> {
        let mut tools = Vec::with_capacity(spec.tool_bindings.len());
        for name in &spec.tool_bindings {
            tools.push(registry.resolve(name)?);
        }

        let id = AgentId::new();
        info!(
            agent_id = %id,
            name = %spec.name,
            tools = tools.len(),
            "Creating agent"
        );

        Ok(Self {
            id,
            spec,
            client,
            tools,
            knowledge: None,
            schema: None,
        })
    }

    pub fn with_knowledge(mut self, knowledge: Arc<KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_schema(mut self, schema: Arc<dyn ResponseSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn specialties(&self) -> &[String] {
        &self.spec.specialties
    }

    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    /// Describe this agent for a leader's routing or delegation prompt.
    pub fn summary(&self) -> String {
        if self.spec.specialties.is_empty() {
            format!("{}: {}", self.spec.name, self.spec.role)
        } else {
            format!(
                "{}: {} (specialties: {})",
                self.spec.name,
                self.spec.role,
                self.spec.specialties.join(", ")
            )
        }
    }

    async fn build_system_prompt(&self, query: &str, shared_context: Option<&str>) -> Result<String> {
        let mut sections = vec![self.spec.role.clone()];

        if !self.spec.instructions.is_empty() {
            sections.push(self.spec.instructions.join("\n"));
        }

        if self.spec.add_datetime {
            let now = chrono::Utc::now();
            sections.push(format!("Current date and time: {}", now.format("%Y-%m-%d %H:%M UTC")));
        }

        if let Some(ref knowledge) = self.knowledge {
            let hits = knowledge.search(query, None).await?;
            if !hits.is_empty() {
                sections.push(KnowledgeBase::format_references(&hits));
            }
        }

        if let Some(context) = shared_context {
            sections.push(context.to_string());
        }

        if !self.tools.is_empty() {
            let mut block = String::from(
                "You can call tools. To call one, respond with ONLY a JSON object \
                 {\"tool\": \"<name>\", \"input\": {...}} and nothing else. \
                 The result will be returned to you. Available tools:\n",
            );
            for tool in &self.tools {
                block.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
            sections.push(block.trim_end().to_string());
        }

        if let Some(ref schema) = self.schema {
            sections.push(schema.instruction().to_string());
        }

        Ok(sections.join("\n\n"))
    }

    /// Interpret a response as a tool call if it is exactly one.
    fn parse_tool_call(content: &str) -> Option<(String, Value)> {
        let value: Value = serde_json::from_str(content.trim()).ok()?;
        let name = value.get("tool")?.as_str()?.to_string();
        let input = value.get("input").cloned().unwrap_or(Value::Null);
        Some((name, input))
    }

    fn tool_by_name(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Answer one task, running tool calls as the model requests them.
    #[instrument(skip(self, query, shared_context), fields(agent = %self.spec.name))]
    pub async fn respond(&self, query: &str, shared_context: Option<&str>) -> Result<AgentReply> {
        if query.trim().is_empty() {
            return Err(BrigadeError::EmptyQuery);
        }

        let system_prompt = self.build_system_prompt(query, shared_context).await?;
        let mut messages = vec![ChatMessage::user(query)];

        let mut content = loop {
            let response = self
                .client
                .complete(CompletionRequest {
                    system_prompt: Some(system_prompt.clone()),
                    messages: messages.clone(),
                    temperature: self.spec.temperature,
                    max_tokens: self.spec.max_tokens,
                })
                .await?;
            let reply = response.content;

            let Some((tool_name, input)) = Self::parse_tool_call(&reply) else {
                break reply;
            };
            if messages.len() >= 1 + 2 * MAX_TOOL_ROUNDS {
                warn!(tool = %tool_name, "Tool round limit reached, asking for a final answer");
                messages.push(ChatMessage::assistant(reply));
                messages.push(ChatMessage::user(
                    "No more tool calls are available. Answer the request with what you have.",
                ));
                let last = self
                    .client
                    .complete(CompletionRequest {
                        system_prompt: Some(system_prompt.clone()),
                        messages: messages.clone(),
                        temperature: self.spec.temperature,
                        max_tokens: self.spec.max_tokens,
                    })
                    .await?;
                break last.content;
            }

            let Some(tool) = self.tool_by_name(&tool_name) else {
                // Model asked for something it was never offered
                messages.push(ChatMessage::assistant(reply));
                messages.push(ChatMessage::user(format!(
                    "Tool '{tool_name}' is not available. Answer with what you have."
                )));
                continue;
            };

            debug!(tool = %tool_name, "Invoking tool");
            messages.push(ChatMessage::assistant(reply));
            match tool.invoke(input).await {
                Ok(result) => messages.push(ChatMessage::user(format!(
                    "Result of {tool_name}: {result}"
                ))),
                Err(e) => messages.push(ChatMessage::user(format!(
                    "Tool {tool_name} failed: {e}. Answer with what you have."
                ))),
            }
        };

        let structured = match self.schema {
            Some(ref schema) => {
                let value = schema.validate_raw(&content)?;
                // Canonical JSON replaces whatever prose surrounded it
                content = serde_json::to_string(&value)?;
                Some(value)
            }
            None => None,
        };

        Ok(AgentReply {
            agent: self.spec.name.clone(),
            content,
            structured,
        })
    }
}

/// Handle to an agent for shared ownership across team tasks
#[derive(Clone)]
pub struct AgentHandle {
    inner: Arc<Agent>,
}

impl AgentHandle {
    pub fn new(agent: Agent) -> Self {
        Self {
            inner: Arc::new(agent),
        }
    }

    pub fn id(&self) -> AgentId {
        self.inner.id
    }

    pub fn inner(&self) -> &Agent {
        &self.inner
    }
}

impl std::ops::Deref for AgentHandle {
    type Target = Agent;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EventSearchResponse;
    use crate::testing::{RecordingTool, ScriptedClient};

    fn registry_with_recorder() -> (ToolRegistry, Arc<RecordingTool>) {
        let recorder = Arc::new(RecordingTool::new(
            "web_search",
            serde_json::json!({"result": "3 results"}),
        ));
        let mut registry = ToolRegistry::new();
        registry.register(recorder.clone());
        (registry, recorder)
    }

    #[test]
    fn unknown_tool_binding_fails_construction() {
        let spec = AgentSpec::new("scout", "Research scout").with_tools(["no_such_tool"]);
        let client = Arc::new(ScriptedClient::new(["hi"]));
        let err = Agent::new(spec, client, &ToolRegistry::new()).unwrap_err();
        assert!(matches!(err, BrigadeError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let spec = AgentSpec::new("scout", "Research scout");
        let client = Arc::new(ScriptedClient::new(["hi"]));
        let agent = Agent::new(spec, client, &ToolRegistry::new()).unwrap();
        let err = agent.respond("   ", None).await.unwrap_err();
        assert!(matches!(err, BrigadeError::EmptyQuery));
    }

    #[tokio::test]
    async fn plain_response_passes_through() {
        let spec = AgentSpec::new("scout", "Research scout");
        let client = Arc::new(ScriptedClient::new(["Bangkok has the best street food."]));
        let agent = Agent::new(spec, client, &ToolRegistry::new()).unwrap();

        let reply = agent.respond("Where is the best street food?", None).await.unwrap();
        assert_eq!(reply.agent, "scout");
        assert_eq!(reply.content, "Bangkok has the best street food.");
        assert!(reply.structured.is_none());
    }

    #[tokio::test]
    async fn tool_call_round_trips_through_the_tool() {
        let (registry, recorder) = registry_with_recorder();
        let spec = AgentSpec::new("scout", "Research scout").with_tools(["web_search"]);
        let client = Arc::new(ScriptedClient::new([
            r#"{"tool": "web_search", "input": {"query": "thai restaurants"}}"#,
            "Found three candidates.",
        ]));
        let agent = Agent::new(spec, client, &registry).unwrap();

        let reply = agent.respond("Research thai restaurants", None).await.unwrap();
        assert_eq!(reply.content, "Found three candidates.");
        assert_eq!(recorder.invocations().len(), 1);
        assert_eq!(recorder.invocations()[0]["query"], "thai restaurants");
    }

    #[tokio::test]
    async fn tool_budget_exhaustion_still_yields_an_answer() {
        let (registry, recorder) = registry_with_recorder();
        let spec = AgentSpec::new("scout", "Research scout").with_tools(["web_search"]);
        let call = r#"{"tool": "web_search", "input": {"query": "more results"}}"#;
        // One tool call past the budget, then the forced final answer
        let mut script: Vec<&str> = vec![call; MAX_TOOL_ROUNDS + 1];
        script.push("Best effort from what was gathered.");
        let client = Arc::new(ScriptedClient::new(script));
        let agent = Agent::new(spec, client, &registry).unwrap();

        let reply = agent.respond("Research exhaustively", None).await.unwrap();
        assert_eq!(reply.content, "Best effort from what was gathered.");
        assert_eq!(recorder.invocations().len(), MAX_TOOL_ROUNDS);
        // The caller never sees a raw tool request
        assert!(Agent::parse_tool_call(&reply.content).is_none());
    }

    #[tokio::test]
    async fn unoffered_tool_request_gets_a_correction() {
        let (registry, recorder) = registry_with_recorder();
        let spec = AgentSpec::new("scout", "Research scout").with_tools(["web_search"]);
        let client = Arc::new(ScriptedClient::new([
            r#"{"tool": "calculator", "input": {"op": "add", "a": 1, "b": 2}}"#,
            "Answering without the calculator.",
        ]));
        let agent = Agent::new(spec, client, &registry).unwrap();

        let reply = agent.respond("Add something", None).await.unwrap();
        assert_eq!(reply.content, "Answering without the calculator.");
        assert!(recorder.invocations().is_empty());
    }

    #[tokio::test]
    async fn schema_validation_failure_is_retryable() {
        let spec = AgentSpec::new("eventbrite_agent", "Eventbrite specialist");
        let client = Arc::new(ScriptedClient::new(["not json at all"]));
        let agent = Agent::new(spec, client, &ToolRegistry::new())
            .unwrap()
            .with_schema(Arc::new(EventSearchResponse::schema()));

        let err = agent.respond("find events", None).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn schema_output_is_canonicalized() {
        let spec = AgentSpec::new("eventbrite_agent", "Eventbrite specialist");
        let payload = r#"{"platform": "Eventbrite", "events_found": 0, "events": [], "summary": "none"}"#;
        let client = Arc::new(ScriptedClient::new([format!(
            "Here is the result:\n```json\n{payload}\n```"
        )]));
        let agent = Agent::new(spec, client, &ToolRegistry::new())
            .unwrap()
            .with_schema(Arc::new(EventSearchResponse::schema()));

        let reply = agent.respond("find events", None).await.unwrap();
        let structured = reply.structured.unwrap();
        assert_eq!(structured["platform"], "Eventbrite");
        // Content is replaced by the canonical JSON form
        assert!(serde_json::from_str::<Value>(&reply.content).is_ok());
    }

    #[test]
    fn summary_includes_specialties() {
        let spec = AgentSpec::new("curry_expert", "Thai curry specialist")
            .with_specialties(["curry", "spice pastes"]);
        let client = Arc::new(ScriptedClient::new(["x"]));
        let agent = Agent::new(spec, client, &ToolRegistry::new()).unwrap();
        assert_eq!(
            agent.summary(),
            "curry_expert: Thai curry specialist (specialties: curry, spice pastes)"
        );
    }
}
