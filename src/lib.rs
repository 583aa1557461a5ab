//! # Brigade
//!
//! Multi-agent team orchestration - a leader model directing a roster of
//! specialist agents.
//!
//! A team runs in one of three modes:
//!
//! ```text
//!   COORDINATE                COLLABORATE               ROUTE
//!
//!   ┌────────┐               ┌────────┐               ┌────────┐
//!   │ Leader │               │ Leader │               │ Leader │
//!   └───┬────┘               └───┬────┘               └───┬────┘
//!  plan │ synthesize    broadcast│ consensus         pick │ one
//!   ┌───┴─────┐          ┌───────┼───────┐               ▼
//!   ▼    ▼    ▼          ▼       ▼       ▼           ┌───────┐
//!  ┌──┐ ┌──┐ ┌──┐       ┌──┐   ┌──┐    ┌──┐          │Member │
//!  │M1│ │M2│ │M3│       │M1│   │M2│    │M3│          └───────┘
//!  └──┘ └──┘ └──┘       └──┘   └──┘    └──┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Agent**: A specialist worker with its own instructions, tools and
//!   optional knowledge base
//! - **Team**: A leader model plus a member roster and a coordination mode
//! - **Knowledge base**: A chunked, embedded source document behind a
//!   vector store (in-memory or pgvector)
//! - **Schema**: A structured-output contract validated at the boundary

pub mod agent;
pub mod bootstrap;
pub mod channel;
pub mod context;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod knowledge;
pub mod model;
pub mod pgvector;
pub mod presets;
pub mod schema;
pub mod team;
pub mod testing;
pub mod tools;

pub use agent::{Agent, AgentHandle, AgentId, AgentReply, AgentSpec};
pub use channel::{EventSink, TeamChannel, TeamEvent};
pub use embedding::{AzureEmbeddingClient, Embedder, EmbeddingConfig};
pub use error::{BrigadeError, Result};
pub use ingest::{DocumentFetcher, HttpFetcher};
pub use knowledge::{KnowledgeBase, KnowledgeRecord, MemoryVectorStore, ScoredRecord, VectorStore};
pub use model::{
    AzureOpenAiClient, ChatMessage, ChatRole, CompletionClient, CompletionRequest,
    CompletionResponse, ModelConfig,
};
pub use pgvector::PgVectorStore;
pub use schema::{
    EventRecord, EventSearchRequest, EventSearchResponse, ResponseSchema, TypedSchema, Validate,
};
pub use team::{LeaderConfig, MemberOutcome, Team, TeamBuilder, TeamMode, TeamReply};
pub use tools::{Tool, ToolRegistry};
