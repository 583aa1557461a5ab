//! Tool bindings - pre-built capability modules attached to agent roles

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::{BrigadeError, Result};

/// A capability an agent can invoke during a response.
///
/// Tool side effects (file writes, email sends) are scoped to a single
/// member call; tools never share mutable state across members.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn invoke(&self, input: Value) -> Result<Value>;
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}

/// Name-indexed registry of tools shared by a deployment.
///
/// Agents declare bindings by name; resolution happens once, at agent
/// construction, so a dangling binding is a fatal configuration error
/// rather than a runtime surprise.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| BrigadeError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn input_str<'a>(input: &'a Value, field: &str) -> Result<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| BrigadeError::Tool(format!("missing string field '{field}'")))
}

/// Web search via an HTML search endpoint (DuckDuckGo-style).
pub struct WebSearchTool {
    http_client: reqwest::Client,
    endpoint: String,
    max_chars: usize,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::with_endpoint("https://html.duckduckgo.com/html/")
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            max_chars: 8000,
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Input: {\"query\": \"...\"}"
    }

    #[instrument(skip(self, input))]
    async fn invoke(&self, input: Value) -> Result<Value> {
        let query = input_str(&input, "query")?;
        debug!(query = %query, "Running web search");

        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| BrigadeError::Tool(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrigadeError::Tool(format!("search API error {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BrigadeError::Tool(format!("search body read failed: {e}")))?;
        let text = strip_tags(&body);
        let truncated: String = text.chars().take(self.max_chars).collect();

        Ok(json!({ "query": query, "results": truncated }))
    }
}

/// Fetch a web page and return its visible text.
pub struct WebsiteTool {
    http_client: reqwest::Client,
    max_chars: usize,
}

impl WebsiteTool {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            max_chars: 12000,
        }
    }
}

impl Default for WebsiteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebsiteTool {
    fn name(&self) -> &str {
        "website"
    }

    fn description(&self) -> &str {
        "Fetch a web page as text. Input: {\"url\": \"https://...\"}"
    }

    #[instrument(skip(self, input))]
    async fn invoke(&self, input: Value) -> Result<Value> {
        let url = input_str(&input, "url")?;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| BrigadeError::Tool(format!("page fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrigadeError::Tool(format!("page fetch error {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BrigadeError::Tool(format!("page body read failed: {e}")))?;
        let text = strip_tags(&body);
        let truncated: String = text.chars().take(self.max_chars).collect();

        Ok(json!({ "url": url, "content": truncated }))
    }
}

/// Public-market quote lookup.
pub struct FinanceTool {
    http_client: reqwest::Client,
    endpoint: String,
}

impl FinanceTool {
    pub fn new() -> Self {
        Self::with_endpoint("https://query1.finance.yahoo.com/v8/finance/chart")
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for FinanceTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FinanceTool {
    fn name(&self) -> &str {
        "finance"
    }

    fn description(&self) -> &str {
        "Look up market data for a ticker. Input: {\"symbol\": \"MCD\"}"
    }

    #[instrument(skip(self, input))]
    async fn invoke(&self, input: Value) -> Result<Value> {
        let symbol = input_str(&input, "symbol")?;
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), symbol);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrigadeError::Tool(format!("quote request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrigadeError::Tool(format!("quote API error {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BrigadeError::Tool(format!("quote parse failed: {e}")))?;

        Ok(json!({ "symbol": symbol, "data": body }))
    }
}

/// Read and write files under a fixed base directory.
pub struct FileTool {
    base_dir: PathBuf,
}

impl FileTool {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve_path(&self, relative: &str) -> Result<PathBuf> {
        let candidate = Path::new(relative);
        if candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(BrigadeError::Tool(format!(
                "path '{relative}' escapes the tool base directory"
            )));
        }
        Ok(self.base_dir.join(candidate))
    }
}

#[async_trait]
impl Tool for FileTool {
    fn name(&self) -> &str {
        "file"
    }

    fn description(&self) -> &str {
        "Read or write a file. Input: {\"action\": \"read\"|\"write\", \"path\": \"report.csv\", \"content\": \"...\"}"
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let action = input_str(&input, "action")?;
        let path = self.resolve_path(input_str(&input, "path")?)?;

        match action {
            "read" => {
                let content = tokio::fs::read_to_string(&path).await?;
                Ok(json!({ "path": path.display().to_string(), "content": content }))
            }
            "write" => {
                let content = input_str(&input, "content")?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, content).await?;
                Ok(json!({ "path": path.display().to_string(), "written": content.len() }))
            }
            other => Err(BrigadeError::Tool(format!("unknown file action '{other}'"))),
        }
    }
}

/// Send email through an HTTP email API.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub endpoint: String,
    pub api_key: String,
    pub from_address: String,
}

pub struct EmailTool {
    http_client: reqwest::Client,
    config: EmailConfig,
}

impl EmailTool {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Tool for EmailTool {
    fn name(&self) -> &str {
        "email"
    }

    fn description(&self) -> &str {
        "Send an email. Input: {\"to\": \"...\", \"subject\": \"...\", \"body\": \"...\"}"
    }

    #[instrument(skip(self, input))]
    async fn invoke(&self, input: Value) -> Result<Value> {
        let to = input_str(&input, "to")?;
        let subject = input_str(&input, "subject")?;
        let body = input_str(&input, "body")?;

        let payload = json!({
            "from": self.config.from_address,
            "to": to,
            "subject": subject,
            "text": body,
        });

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BrigadeError::Tool(format!("email send failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(BrigadeError::Tool(format!(
                "email API error {status}: {body_text}"
            )));
        }

        Ok(json!({ "sent": true, "to": to }))
    }
}

/// Local arithmetic, no network.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Arithmetic. Input: {\"op\": \"add\"|\"subtract\"|\"multiply\"|\"divide\", \"a\": 1, \"b\": 2}"
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let op = input_str(&input, "op")?;
        let a = input
            .get("a")
            .and_then(Value::as_f64)
            .ok_or_else(|| BrigadeError::Tool("missing numeric field 'a'".into()))?;
        let b = input
            .get("b")
            .and_then(Value::as_f64)
            .ok_or_else(|| BrigadeError::Tool("missing numeric field 'b'".into()))?;

        let result = match op {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return Err(BrigadeError::Tool("division by zero".into()));
                }
                a / b
            }
            other => return Err(BrigadeError::Tool(format!("unknown op '{other}'"))),
        };

        Ok(json!({ "result": result }))
    }
}

/// Drop markup, keep visible text. Good enough for feeding pages to a model.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut in_tag = false;
    let mut in_script = false;
    for (i, c) in html.char_indices() {
        if !in_tag && c == '<' {
            in_tag = true;
            let rest = &html[i..];
            if starts_with_ignore_case(rest, "<script") || starts_with_ignore_case(rest, "<style") {
                in_script = true;
            } else if starts_with_ignore_case(rest, "</script")
                || starts_with_ignore_case(rest, "</style")
            {
                in_script = false;
            }
        } else if in_tag && c == '>' {
            in_tag = false;
            out.push(' ');
        } else if !in_tag && !in_script {
            out.push(c);
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
