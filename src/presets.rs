//! Ready-made team configurations
//!
//! One preset per coordination mode: a knowledge-backed cuisine panel
//! (coordinate), a tool-heavy research group (collaborate) and a
//! platform-specialist event scraper roster (route).

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::{Agent, AgentHandle, AgentSpec};
use crate::error::Result;
use crate::knowledge::KnowledgeBase;
use crate::model::CompletionClient;
use crate::schema::EventSearchResponse;
use crate::team::{LeaderConfig, Team, TeamMode};
use crate::tools::{
    CalculatorTool, EmailConfig, EmailTool, FileTool, FinanceTool, ToolRegistry, WebSearchTool,
    WebsiteTool,
};

/// Source document for the Thai cuisine knowledge base.
pub const THAI_RECIPES_URL: &str =
    "https://agno-public.s3.amazonaws.com/recipes/ThaiRecipes.pdf";

/// Registry with every built-in tool.
///
/// The email tool is only registered when its delivery endpoint is
/// configured; file access is sandboxed under `base_dir`.
pub fn standard_registry(base_dir: impl Into<PathBuf>, email: Option<EmailConfig>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearchTool::new()));
    registry.register(Arc::new(WebsiteTool::new()));
    registry.register(Arc::new(FinanceTool::new()));
    registry.register(Arc::new(CalculatorTool));
    registry.register(Arc::new(FileTool::new(base_dir)));
    if let Some(config) = email {
        registry.register(Arc::new(EmailTool::new(config)));
    }
    registry
}

fn knowledge_member(
    name: &str,
    role: &str,
    specialties: &[&str],
    instructions: &[&str],
    client: Arc<dyn CompletionClient>,
    knowledge: Arc<KnowledgeBase>,
) -> Result<AgentHandle> {
    let spec = AgentSpec::new(name, role)
        .with_specialties(specialties.iter().copied())
        .with_instructions(instructions.iter().copied());
    let agent = Agent::new(spec, client, &ToolRegistry::new())?.with_knowledge(knowledge);
    Ok(AgentHandle::new(agent))
}

/// Five cuisine specialists sharing one recipe knowledge base, led in
/// coordinate mode.
pub fn thai_cuisine_team(
    client: Arc<dyn CompletionClient>,
    knowledge: Arc<KnowledgeBase>,
) -> Result<Team> {
    let members = [
        (
            "curry_expert",
            "Thai curry specialist covering pastes, coconut-based curries and regional styles",
            &["curry", "paste"][..],
            &["Ground every claim in the recipe references.", "Name exact ingredients and quantities where the references give them."][..],
        ),
        (
            "soup_expert",
            "Thai soup specialist covering tom yum, tom kha and broth technique",
            &["soup", "tom yum", "tom kha"],
            &["Ground every claim in the recipe references.", "Explain how aromatics are layered in the broth."],
        ),
        (
            "noodle_expert",
            "Thai noodle and stir-fry specialist covering pad thai, pad see ew and wok technique",
            &["noodle", "pad thai", "stir-fry"],
            &["Ground every claim in the recipe references.", "Call out wok heat and timing details."],
        ),
        (
            "dessert_expert",
            "Thai dessert specialist covering mango sticky rice, coconut sweets and palm sugar work",
            &["dessert", "sticky rice", "sweet"],
            &["Ground every claim in the recipe references."],
        ),
        (
            "culinary_historian",
            "Historian of Thai foodways covering regional origins and ingredient provenance",
            &["history", "origin", "region"],
            &["Keep historical claims conservative and note uncertainty."],
        ),
    ];

    let mut builder = Team::builder("thai_cuisine_experts", TeamMode::Coordinate)
        .leader(client.clone())
        .config(LeaderConfig {
            share_context: true,
            success_criteria: Some(
                "The answer cites concrete recipe details and covers every part of the question."
                    .to_string(),
            ),
            ..Default::default()
        });
    for (name, role, specialties, instructions) in members {
        builder = builder.member(knowledge_member(
            name,
            role,
            specialties,
            instructions,
            client.clone(),
            knowledge.clone(),
        )?);
    }
    builder.build()
}

/// Six tool-bound researchers working the same brief concurrently, led in
/// collaborate mode.
pub fn restaurant_research_team(
    client: Arc<dyn CompletionClient>,
    registry: &ToolRegistry,
) -> Result<Team> {
    let members: [(&str, &str, &[&str], &[&str]); 6] = [
        (
            "market_researcher",
            "Finds restaurant candidates and market context on the open web",
            &["web_search"],
            &["Search broadly before narrowing.", "Cite the sources you used."],
        ),
        (
            "menu_analyst",
            "Reads restaurant websites and evaluates menus and pricing",
            &["website"],
            &["Quote menu items and prices exactly as published."],
        ),
        (
            "finance_analyst",
            "Assesses the financial side of restaurant groups and chains",
            &["finance", "calculator"],
            &["Show the arithmetic behind every figure you derive."],
        ),
        (
            "location_scout",
            "Evaluates neighborhoods, foot traffic and competition",
            &["web_search", "website"],
            &["Compare at least two locations when the brief allows."],
        ),
        (
            "report_writer",
            "Maintains the running research report on disk",
            &["file"],
            &["Write findings to report.md and confirm what was saved."],
        ),
        (
            "outreach_coordinator",
            "Drafts and sends outreach to restaurant contacts",
            &["email"],
            &["Never send an email without an explicit recipient in the brief."],
        ),
    ];

    let mut builder = Team::builder("restaurant_researchers", TeamMode::Collaborate)
        .leader(client.clone())
        .config(LeaderConfig {
            show_member_responses: true,
            add_datetime: true,
            ..Default::default()
        });
    for (name, role, tools, instructions) in members {
        // Skip bindings the registry doesn't carry (email is optional)
        let bound: Vec<&str> = tools
            .iter()
            .copied()
            .filter(|t| registry.contains(t))
            .collect();
        let spec = AgentSpec::new(name, role)
            .with_tools(bound)
            .with_instructions(instructions.iter().copied())
            .with_datetime();
        builder = builder.member(AgentHandle::new(Agent::new(spec, client.clone(), registry)?));
    }
    builder.build()
}

/// Five platform specialists behind a router, each bound to the
/// event-search response contract.
pub fn event_scraping_team(
    client: Arc<dyn CompletionClient>,
    registry: &ToolRegistry,
) -> Result<Team> {
    let members: [(&str, &str, &[&str]); 5] = [
        (
            "eventbrite_agent",
            "Eventbrite specialist scraping listed events",
            &["eventbrite"],
        ),
        (
            "meetup_agent",
            "Meetup specialist covering groups and scheduled meetups",
            &["meetup"],
        ),
        (
            "facebook_agent",
            "Facebook Events specialist covering public event pages",
            &["facebook"],
        ),
        (
            "ticketmaster_agent",
            "Ticketmaster specialist covering ticketed concerts and shows",
            &["ticketmaster", "concert ticket"],
        ),
        (
            "web_agent",
            "Generalist that searches the open web when no platform fits",
            &[],
        ),
    ];

    let schema = Arc::new(EventSearchResponse::schema());
    let mut builder = Team::builder("event_scrapers", TeamMode::Route)
        .leader(client.clone())
        .config(LeaderConfig {
            add_datetime: true,
            ..Default::default()
        });
    for (name, role, specialties) in members {
        let bound: Vec<&str> = ["web_search", "website"]
            .into_iter()
            .filter(|t| registry.contains(t))
            .collect();
        let spec = AgentSpec::new(name, role)
            .with_specialties(specialties.iter().copied())
            .with_tools(bound)
            .with_datetime();
        let agent =
            Agent::new(spec, client.clone(), registry)?.with_schema(schema.clone());
        builder = builder.member(AgentHandle::new(agent));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::MemoryVectorStore;
    use crate::testing::{ScriptedClient, StaticEmbedder};

    fn scripted() -> Arc<ScriptedClient> {
        Arc::new(ScriptedClient::new::<[&str; 0], &str>([]))
    }

    #[test]
    fn standard_registry_without_email() {
        let registry = standard_registry("/tmp", None);
        assert!(registry.contains("web_search"));
        assert!(registry.contains("website"));
        assert!(registry.contains("finance"));
        assert!(registry.contains("calculator"));
        assert!(registry.contains("file"));
        assert!(!registry.contains("email"));
    }

    #[test]
    fn thai_team_is_coordinate_with_five_members() {
        let knowledge = Arc::new(KnowledgeBase::new(
            THAI_RECIPES_URL,
            Arc::new(StaticEmbedder::new(8)),
            Arc::new(MemoryVectorStore::new()),
        ));
        let team = thai_cuisine_team(scripted(), knowledge).unwrap();
        assert_eq!(team.mode(), TeamMode::Coordinate);
        assert_eq!(team.members().len(), 5);
    }

    #[test]
    fn research_team_skips_unregistered_email_binding() {
        let registry = standard_registry("/tmp", None);
        let team = restaurant_research_team(scripted(), &registry).unwrap();
        assert_eq!(team.mode(), TeamMode::Collaborate);
        assert_eq!(team.members().len(), 6);
    }

    #[test]
    fn event_team_members_carry_the_schema() {
        let registry = standard_registry("/tmp", None);
        let team = event_scraping_team(scripted(), &registry).unwrap();
        assert_eq!(team.mode(), TeamMode::Route);
        assert_eq!(team.members().len(), 5);
        assert!(team.members().iter().all(|m| m.has_schema()));
    }
}
