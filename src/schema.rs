//! Structured request/response schemas validated at the team boundary

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BrigadeError, Result};

/// A contract type that can check its own field-level invariants after
/// deserialization.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Schema attached to an agent role or a team boundary.
///
/// Validates raw model output; a failure is surfaced to the caller as a
/// retryable error, never silently coerced.
pub trait ResponseSchema: Send + Sync {
    fn name(&self) -> &str;

    /// Instruction line injected into the system prompt so the model knows
    /// what shape to produce.
    fn instruction(&self) -> &str;

    /// Parse and validate raw output, returning the canonical JSON value.
    fn validate_raw(&self, raw: &str) -> Result<Value>;
}

/// `ResponseSchema` implementation for any serde contract type.
pub struct TypedSchema<T> {
    name: String,
    instruction: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            _marker: PhantomData,
        }
    }
}

impl<T> ResponseSchema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + Validate + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn instruction(&self) -> &str {
        &self.instruction
    }

    fn validate_raw(&self, raw: &str) -> Result<Value> {
        let json_text = extract_json(raw).ok_or_else(|| {
            BrigadeError::SchemaValidation(format!("no JSON found in response for '{}'", self.name))
        })?;
        let parsed: T = serde_json::from_str(json_text)
            .map_err(|e| BrigadeError::SchemaValidation(format!("'{}': {e}", self.name)))?;
        parsed.validate()?;
        Ok(serde_json::to_value(&parsed)?)
    }
}

/// Pull the JSON object or array out of a model response, tolerating prose
/// and markdown code fences around it.
pub fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();

    let inner = if let Some(fence_start) = trimmed.find("```") {
        let after = &trimmed[fence_start + 3..];
        // Skip an optional language tag on the fence line
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        }
    } else {
        trimmed
    };

    let obj_start = inner.find('{');
    let arr_start = inner.find('[');
    let (start, close) = match (obj_start, arr_start) {
        (Some(o), Some(a)) if a < o => (a, ']'),
        (Some(o), _) => (o, '}'),
        (None, Some(a)) => (a, ']'),
        (None, None) => return None,
    };
    let end = inner.rfind(close)?;
    if end < start {
        return None;
    }
    Some(inner[start..=end].trim())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BrigadeError::SchemaValidation(format!(
            "required field '{field}' is empty"
        )));
    }
    Ok(())
}

/// One scraped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: String,
    pub location: String,
    #[serde(default)]
    pub organizer: String,
    #[serde(default)]
    pub category: String,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Validate for EventRecord {
    fn validate(&self) -> Result<()> {
        require("title", &self.title)?;
        require("date", &self.date)?;
        require("location", &self.location)?;
        require("platform", &self.platform)?;
        Ok(())
    }
}

/// Structured response contract for the event-search teams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSearchResponse {
    pub platform: String,
    pub events_found: usize,
    pub events: Vec<EventRecord>,
    #[serde(default)]
    pub summary: String,
}

impl Validate for EventSearchResponse {
    fn validate(&self) -> Result<()> {
        require("platform", &self.platform)?;
        for event in &self.events {
            event.validate()?;
        }
        Ok(())
    }
}

impl EventSearchResponse {
    /// Schema handle for binding to an agent or team.
    pub fn schema() -> TypedSchema<Self> {
        TypedSchema::new(
            "event_search_response",
            "Respond with a single JSON object: {\"platform\": string, \
             \"events_found\": number, \"events\": [{\"title\", \"description\", \
             \"date\", \"location\", \"organizer\", \"category\", \"platform\", \
             \"price\"?, \"url\"?}], \"summary\": string}. \
             title, date, location and platform are required for every event.",
        )
    }
}

fn default_max_events() -> usize {
    1
}

/// Structured request contract for the advanced event-search variant.
///
/// Validated before being handed to the routing logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSearchRequest {
    pub location: String,
    pub event_type: String,
    pub date_range: String,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Validate for EventSearchRequest {
    fn validate(&self) -> Result<()> {
        require("location", &self.location)?;
        require("event_type", &self.event_type)?;
        require("date_range", &self.date_range)?;
        if self.max_events == 0 {
            return Err(BrigadeError::SchemaValidation(
                "max_events must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl EventSearchRequest {
    /// Render the request into the routing message the team leader consumes.
    pub fn to_message(&self) -> String {
        let platform = self.platform_preference.as_deref().unwrap_or("none");
        let category = self.category.as_deref().unwrap_or("none");
        format!(
            "Find {} {} events in {} for {}. Platform preference: {}. Category: {}.",
            self.max_events, self.event_type, self.location, self.date_range, platform, category,
        )
    }
}
