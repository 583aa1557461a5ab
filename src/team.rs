//! Team orchestration - coordinate, collaborate and route modes

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::agent::{AgentHandle, AgentReply};
use crate::channel::{EventSink, TeamChannel, TeamEvent};
use crate::context::SharedContext;
use crate::error::{BrigadeError, Result};
use crate::model::{ChatMessage, CompletionClient, CompletionRequest};
use crate::schema::{extract_json, EventSearchRequest, Validate};

/// How a team distributes work across its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamMode {
    /// The leader decomposes the query into member tasks and synthesizes
    /// the results. Members run in roster order and a member failure fails
    /// the run.
    Coordinate,
    /// Every member receives the full query concurrently; the leader builds
    /// a consensus answer. Member failures degrade to noted gaps.
    Collaborate,
    /// Exactly one member handles the query; its reply is the team's reply.
    Route,
}

impl std::fmt::Display for TeamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TeamMode::Coordinate => "coordinate",
            TeamMode::Collaborate => "collaborate",
            TeamMode::Route => "route",
        };
        f.write_str(s)
    }
}

/// Leader behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct LeaderConfig {
    /// Let later members see earlier members' findings (coordinate mode)
    pub share_context: bool,
    /// Append raw member responses after the synthesized answer
    pub show_member_responses: bool,
    /// Include the current date and time in leader prompts
    pub add_datetime: bool,
    /// Per-member deadline in collaborate mode; unlimited when unset
    pub member_timeout: Option<Duration>,
    /// Criteria the synthesized answer must satisfy
    pub success_criteria: Option<String>,
}

/// What one member contributed to a run.
#[derive(Debug, Clone)]
pub struct MemberOutcome {
    pub member: String,
    pub content: Option<String>,
    pub structured: Option<Value>,
    pub error: Option<String>,
}

impl MemberOutcome {
    fn success(reply: AgentReply) -> Self {
        Self {
            member: reply.agent,
            content: Some(reply.content),
            structured: reply.structured,
            error: None,
        }
    }

    fn failure(member: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            content: None,
            structured: None,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// The team's final answer for one run.
#[derive(Debug, Clone)]
pub struct TeamReply {
    pub content: String,
    /// Present when the answering agent has a response schema bound
    pub structured: Option<Value>,
    pub members: Vec<MemberOutcome>,
}

#[derive(Deserialize)]
struct Assignment {
    member: String,
    task: String,
}

#[derive(Deserialize)]
struct AssignmentPlan {
    assignments: Vec<Assignment>,
}

/// Builder for [`Team`]; validates the roster before a run can start.
pub struct TeamBuilder {
    name: String,
    mode: TeamMode,
    leader: Option<Arc<dyn CompletionClient>>,
    config: LeaderConfig,
    members: Vec<AgentHandle>,
}

impl TeamBuilder {
    pub fn new(name: impl Into<String>, mode: TeamMode) -> Self {
        Self {
            name: name.into(),
            mode,
            leader: None,
            config: LeaderConfig::default(),
            members: Vec::new(),
        }
    }

    pub fn leader(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.leader = Some(client);
        self
    }

    pub fn config(mut self, config: LeaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn member(mut self, member: AgentHandle) -> Self {
        self.members.push(member);
        self
    }

    pub fn build(self) -> Result<Team> {
        if self.members.is_empty() {
            return Err(BrigadeError::Config(format!(
                "team '{}' has no members",
                self.name
            )));
        }
        for (i, member) in self.members.iter().enumerate() {
            if self.members[..i].iter().any(|m| m.name() == member.name()) {
                return Err(BrigadeError::Config(format!(
                    "duplicate member name '{}' in team '{}'",
                    member.name(),
                    self.name
                )));
            }
        }
        let leader = self.leader.ok_or_else(|| {
            BrigadeError::Config(format!("team '{}' has no leader model", self.name))
        })?;

        info!(
            team = %self.name,
            mode = %self.mode,
            members = self.members.len(),
            "Team assembled"
        );

        Ok(Team {
            name: self.name,
            mode: self.mode,
            leader,
            config: self.config,
            members: self.members,
            sink: EventSink::disabled(),
        })
    }
}

/// A leader model plus a roster of member agents.
pub struct Team {
    name: String,
    mode: TeamMode,
    leader: Arc<dyn CompletionClient>,
    config: LeaderConfig,
    members: Vec<AgentHandle>,
    sink: EventSink,
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Team {
    pub fn builder(name: impl Into<String>, mode: TeamMode) -> TeamBuilder {
        TeamBuilder::new(name, mode)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> TeamMode {
        self.mode
    }

    pub fn members(&self) -> &[AgentHandle] {
        &self.members
    }

    /// Attach an event stream for this team's runs, replacing any previous
    /// subscriber.
    pub fn subscribe(&mut self) -> TeamChannel {
        let (sink, channel) = TeamChannel::pair();
        self.sink = sink;
        channel
    }

    fn member_by_name(&self, name: &str) -> Option<&AgentHandle> {
        self.members.iter().find(|m| m.name() == name)
    }

    fn roster_block(&self) -> String {
        self.members
            .iter()
            .map(|m| format!("- {}", m.summary()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn leader_system_prompt(&self, task: &str) -> String {
        let mut sections = vec![format!(
            "You lead the team '{}'. Team members:\n{}",
            self.name,
            self.roster_block()
        )];
        if self.config.add_datetime {
            let now = chrono::Utc::now();
            sections.push(format!(
                "Current date and time: {}",
                now.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        sections.push(task.to_string());
        sections.join("\n\n")
    }

    async fn leader_complete(&self, system: String, user: String) -> Result<String> {
        let response = self
            .leader
            .complete(CompletionRequest {
                system_prompt: Some(system),
                messages: vec![ChatMessage::user(user)],
                temperature: None,
                max_tokens: None,
            })
            .await?;
        Ok(response.content)
    }

    /// Run the team on a query.
    #[instrument(skip(self, query), fields(team = %self.name, mode = %self.mode))]
    pub async fn run(&self, query: &str) -> Result<TeamReply> {
        if query.trim().is_empty() {
            return Err(BrigadeError::EmptyQuery);
        }

        self.sink.emit(TeamEvent::RunStarted {
            team: self.name.clone(),
            mode: self.mode,
        });

        let reply = match self.mode {
            TeamMode::Coordinate => self.run_coordinate(query).await?,
            TeamMode::Collaborate => self.run_collaborate(query).await?,
            TeamMode::Route => self.run_route(query).await?,
        };

        self.sink.emit(TeamEvent::SynthesisReady {
            content: reply.content.clone(),
        });
        Ok(reply)
    }

    /// Run the team on a validated structured request.
    pub async fn run_structured(&self, request: &EventSearchRequest) -> Result<TeamReply> {
        request.validate()?;
        self.run(&request.to_message()).await
    }

    /// Ask the leader to split the query into per-member tasks.
    ///
    /// A plan that cannot be parsed, or that names members outside the
    /// roster, falls back to handing the full query to every member.
    async fn plan_assignments(&self, query: &str) -> Vec<(String, String)> {
        let instruction = "Split the user's request into one task per relevant team member. \
             Respond with ONLY a JSON object: \
             {\"assignments\": [{\"member\": \"<name>\", \"task\": \"<task>\"}]}. \
             Use only the member names listed above.";
        let raw = match self
            .leader_complete(self.leader_system_prompt(instruction), query.to_string())
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Leader decomposition failed, broadcasting full query");
                return self.full_query_plan(query);
            }
        };

        let plan: Option<AssignmentPlan> =
            extract_json(&raw).and_then(|json| serde_json::from_str(json).ok());
        match plan {
            Some(plan)
                if !plan.assignments.is_empty()
                    && plan
                        .assignments
                        .iter()
                        .all(|a| self.member_by_name(&a.member).is_some()) =>
            {
                plan.assignments
                    .into_iter()
                    .map(|a| (a.member, a.task))
                    .collect()
            }
            _ => {
                warn!("Unusable assignment plan, broadcasting full query");
                self.full_query_plan(query)
            }
        }
    }

    fn full_query_plan(&self, query: &str) -> Vec<(String, String)> {
        self.members
            .iter()
            .map(|m| (m.name().to_string(), query.to_string()))
            .collect()
    }

    async fn run_coordinate(&self, query: &str) -> Result<TeamReply> {
        let assignments = self.plan_assignments(query).await;
        let context = SharedContext::new();
        let mut outcomes = Vec::with_capacity(assignments.len());

        for (member_name, task) in assignments {
            // Roster membership was checked when the plan was accepted
            let member = self
                .member_by_name(&member_name)
                .ok_or_else(|| BrigadeError::MemberNotFound(member_name.clone()))?;

            self.sink.emit(TeamEvent::MemberStarted {
                member: member_name.clone(),
                task: task.clone(),
            });

            let shared = if self.config.share_context {
                context.render()
            } else {
                None
            };

            match member.respond(&task, shared.as_deref()).await {
                Ok(reply) => {
                    self.sink.emit(TeamEvent::MemberResponded {
                        member: member_name.clone(),
                        content: reply.content.clone(),
                    });
                    context.record(&member_name, &reply.content);
                    outcomes.push(MemberOutcome::success(reply));
                }
                Err(e) => {
                    self.sink.emit(TeamEvent::MemberFailed {
                        member: member_name.clone(),
                        reason: e.to_string(),
                    });
                    return Err(BrigadeError::MemberFailed {
                        member: member_name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let content = self.synthesize(query, &outcomes).await?;
        Ok(TeamReply {
            content,
            structured: None,
            members: outcomes,
        })
    }

    async fn run_collaborate(&self, query: &str) -> Result<TeamReply> {
        let mut set: JoinSet<(usize, std::result::Result<AgentReply, BrigadeError>)> =
            JoinSet::new();
        let timeout = self.config.member_timeout;

        for (index, member) in self.members.iter().enumerate() {
            self.sink.emit(TeamEvent::MemberStarted {
                member: member.name().to_string(),
                task: query.to_string(),
            });
            let handle = member.clone();
            let task = query.to_string();
            let member_name = member.name().to_string();
            set.spawn(async move {
                let work = handle.respond(&task, None);
                let result = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, work).await {
                        Ok(result) => result,
                        Err(_) => Err(BrigadeError::MemberTimeout {
                            member: member_name,
                        }),
                    },
                    None => work.await,
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<MemberOutcome>> = (0..self.members.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (index, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    // A panicked or cancelled task lost its index tag; its
                    // slot stays empty and is filled as a failure below.
                    warn!(error = %e, "Member task aborted, continuing without it");
                    continue;
                }
            };
            let member_name = self.members[index].name().to_string();
            let outcome = match result {
                Ok(reply) => {
                    self.sink.emit(TeamEvent::MemberResponded {
                        member: member_name,
                        content: reply.content.clone(),
                    });
                    MemberOutcome::success(reply)
                }
                Err(e) => {
                    warn!(member = %member_name, error = %e, "Member failed, continuing without it");
                    self.sink.emit(TeamEvent::MemberFailed {
                        member: member_name.clone(),
                        reason: e.to_string(),
                    });
                    MemberOutcome::failure(member_name, e.to_string())
                }
            };
            slots[index] = Some(outcome);
        }

        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                let member_name = self.members[index].name().to_string();
                self.sink.emit(TeamEvent::MemberFailed {
                    member: member_name.clone(),
                    reason: "member task aborted".to_string(),
                });
                *slot = Some(MemberOutcome::failure(member_name, "member task aborted"));
            }
        }

        let outcomes: Vec<MemberOutcome> = slots.into_iter().flatten().collect();
        if outcomes.iter().all(|o| !o.succeeded()) {
            return Err(BrigadeError::Infrastructure(format!(
                "all {} members of '{}' failed",
                outcomes.len(),
                self.name
            )));
        }

        let content = self.synthesize(query, &outcomes).await?;
        Ok(TeamReply {
            content,
            structured: None,
            members: outcomes,
        })
    }

    async fn run_route(&self, query: &str) -> Result<TeamReply> {
        let member = match self.keyword_route(query) {
            Some(member) => {
                self.sink.emit(TeamEvent::Routed {
                    member: member.name().to_string(),
                    reason: "specialty keyword match".to_string(),
                });
                member
            }
            None => {
                let chosen = self.model_route(query).await?;
                self.sink.emit(TeamEvent::Routed {
                    member: chosen.name().to_string(),
                    reason: "leader selection".to_string(),
                });
                chosen
            }
        };

        self.sink.emit(TeamEvent::MemberStarted {
            member: member.name().to_string(),
            task: query.to_string(),
        });

        match member.respond(query, None).await {
            Ok(reply) => {
                self.sink.emit(TeamEvent::MemberResponded {
                    member: reply.agent.clone(),
                    content: reply.content.clone(),
                });
                Ok(TeamReply {
                    content: reply.content.clone(),
                    structured: reply.structured.clone(),
                    members: vec![MemberOutcome::success(reply)],
                })
            }
            Err(e) => {
                self.sink.emit(TeamEvent::MemberFailed {
                    member: member.name().to_string(),
                    reason: e.to_string(),
                });
                Err(BrigadeError::MemberFailed {
                    member: member.name().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Route without a model call when exactly one member's specialty
    /// appears in the query.
    fn keyword_route(&self, query: &str) -> Option<&AgentHandle> {
        let query_lower = query.to_lowercase();
        let mut matched: Option<&AgentHandle> = None;
        for member in &self.members {
            let hits = member
                .specialties()
                .iter()
                .any(|s| query_lower.contains(&s.to_lowercase()));
            if hits {
                if matched.is_some() {
                    // Ambiguous, let the leader decide
                    return None;
                }
                matched = Some(member);
            }
        }
        matched
    }

    async fn model_route(&self, query: &str) -> Result<&AgentHandle> {
        let instruction = "Pick the single team member best suited to answer the user's \
             request. Respond with ONLY that member's name, exactly as listed.";
        let raw = self
            .leader_complete(self.leader_system_prompt(instruction), query.to_string())
            .await?;
        let choice = raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '.');

        debug!(choice = %choice, "Leader routing decision");
        self.member_by_name(choice)
            .ok_or_else(|| BrigadeError::MemberNotFound(choice.to_string()))
    }

    /// Leader pass that merges member contributions into one answer.
    async fn synthesize(&self, query: &str, outcomes: &[MemberOutcome]) -> Result<String> {
        let mut report = String::new();
        for outcome in outcomes {
            match (&outcome.content, &outcome.error) {
                (Some(content), _) => {
                    report.push_str(&format!("## {}\n{}\n\n", outcome.member, content));
                }
                (None, Some(error)) => {
                    report.push_str(&format!(
                        "## {}\nNo contribution - this member failed ({error}). \
                         Note the gap in your answer.\n\n",
                        outcome.member
                    ));
                }
                (None, None) => {}
            }
        }

        let mut instruction = String::from(
            "Synthesize the member contributions below into one coherent answer \
             to the user's request. Attribute nothing; answer as the team.",
        );
        if let Some(ref criteria) = self.config.success_criteria {
            instruction.push_str(&format!("\n\nThe answer must satisfy: {criteria}"));
        }

        let user = format!("Request: {query}\n\nMember contributions:\n\n{report}");
        let mut content = self
            .leader_complete(self.leader_system_prompt(&instruction), user)
            .await?;

        if content.trim().is_empty() {
            return Err(BrigadeError::Model(
                "leader produced an empty synthesis".to_string(),
            ));
        }

        if self.config.show_member_responses {
            content.push_str("\n\n---\nMember responses:\n\n");
            content.push_str(report.trim_end());
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentSpec};
    use crate::testing::{FailingClient, ScriptedClient};
    use crate::tools::ToolRegistry;

    fn member(name: &str, specialties: &[&str], responses: &[&str]) -> AgentHandle {
        let spec = AgentSpec::new(name, format!("{name} specialist"))
            .with_specialties(specialties.iter().copied());
        let client = Arc::new(ScriptedClient::new(responses.iter().copied()));
        AgentHandle::new(Agent::new(spec, client, &ToolRegistry::new()).unwrap())
    }

    fn failing_member(name: &str) -> AgentHandle {
        let spec = AgentSpec::new(name, format!("{name} specialist"));
        let client = Arc::new(FailingClient::new("backend down"));
        AgentHandle::new(Agent::new(spec, client, &ToolRegistry::new()).unwrap())
    }

    fn leader(responses: &[&str]) -> Arc<ScriptedClient> {
        Arc::new(ScriptedClient::new(responses.iter().copied()))
    }

    #[test]
    fn builder_rejects_empty_roster() {
        let err = Team::builder("empty", TeamMode::Route)
            .leader(leader(&[]))
            .build()
            .unwrap_err();
        assert!(matches!(err, BrigadeError::Config(_)));
    }

    #[test]
    fn builder_rejects_duplicate_member_names() {
        let err = Team::builder("dupes", TeamMode::Route)
            .leader(leader(&[]))
            .member(member("twin", &[], &[]))
            .member(member("twin", &[], &[]))
            .build()
            .unwrap_err();
        assert!(matches!(err, BrigadeError::Config(_)));
    }

    #[test]
    fn builder_requires_a_leader() {
        let err = Team::builder("leaderless", TeamMode::Coordinate)
            .member(member("solo", &[], &[]))
            .build()
            .unwrap_err();
        assert!(matches!(err, BrigadeError::Config(_)));
    }

    #[tokio::test]
    async fn blank_query_is_rejected_in_every_mode() {
        for mode in [TeamMode::Coordinate, TeamMode::Collaborate, TeamMode::Route] {
            let team = Team::builder("t", mode)
                .leader(leader(&[]))
                .member(member("solo", &[], &[]))
                .build()
                .unwrap();
            let err = team.run("  \n ").await.unwrap_err();
            assert!(matches!(err, BrigadeError::EmptyQuery), "mode {mode}");
        }
    }

    #[tokio::test]
    async fn coordinate_follows_the_leader_plan() {
        let team = Team::builder("thai_experts", TeamMode::Coordinate)
            .leader(leader(&[
                r#"{"assignments": [
                    {"member": "curry_expert", "task": "Describe green curry."},
                    {"member": "soup_expert", "task": "Describe tom yum."}
                ]}"#,
                "Green curry and tom yum are both classics.",
            ]))
            .member(member("curry_expert", &[], &["Green curry uses fresh paste."]))
            .member(member("soup_expert", &[], &["Tom yum is hot and sour."]))
            .build()
            .unwrap();

        let reply = team.run("Tell me about thai food").await.unwrap();
        assert_eq!(reply.content, "Green curry and tom yum are both classics.");
        assert_eq!(reply.members.len(), 2);
        assert!(reply.members.iter().all(MemberOutcome::succeeded));
    }

    #[tokio::test]
    async fn coordinate_falls_back_to_broadcast_on_bad_plan() {
        let team = Team::builder("thai_experts", TeamMode::Coordinate)
            .leader(leader(&[
                "I cannot produce JSON, sorry.",
                "Synthesis of both answers.",
            ]))
            .member(member("curry_expert", &[], &["Curry answer."]))
            .member(member("soup_expert", &[], &["Soup answer."]))
            .build()
            .unwrap();

        let reply = team.run("Tell me about thai food").await.unwrap();
        // Both members ran with the full query
        assert_eq!(reply.members.len(), 2);
        assert_eq!(reply.content, "Synthesis of both answers.");
    }

    #[tokio::test]
    async fn coordinate_member_failure_fails_the_run() {
        let team = Team::builder("thai_experts", TeamMode::Coordinate)
            .leader(leader(&[
                r#"{"assignments": [{"member": "broken", "task": "Do the thing."}]}"#,
            ]))
            .member(failing_member("broken"))
            .build()
            .unwrap();

        let err = team.run("Tell me about thai food").await.unwrap_err();
        assert!(matches!(err, BrigadeError::MemberFailed { .. }));
    }

    #[tokio::test]
    async fn coordinate_shares_context_between_members() {
        let config = LeaderConfig {
            share_context: true,
            ..Default::default()
        };
        let first_client = Arc::new(ScriptedClient::new(["First finding."]));
        let second_client = Arc::new(ScriptedClient::new(["Second finding."]));
        let first = AgentHandle::new(
            Agent::new(
                AgentSpec::new("first", "first specialist"),
                first_client,
                &ToolRegistry::new(),
            )
            .unwrap(),
        );
        let second_handle = AgentHandle::new(
            Agent::new(
                AgentSpec::new("second", "second specialist"),
                second_client.clone(),
                &ToolRegistry::new(),
            )
            .unwrap(),
        );

        let team = Team::builder("ctx", TeamMode::Coordinate)
            .leader(leader(&["unparseable plan", "Synthesis."]))
            .config(config)
            .member(first)
            .member(second_handle)
            .build()
            .unwrap();

        team.run("research this").await.unwrap();

        // The second member's system prompt carries the first one's finding
        let requests = second_client.requests();
        let system = requests[0].system_prompt.as_deref().unwrap();
        assert!(system.contains("First finding."));
    }

    #[tokio::test]
    async fn collaborate_survives_a_failing_member() {
        let team = Team::builder("researchers", TeamMode::Collaborate)
            .leader(leader(&["Consensus despite the gap."]))
            .member(member("scout", &[], &["Scout findings."]))
            .member(failing_member("broken"))
            .build()
            .unwrap();

        let reply = team.run("Research restaurants").await.unwrap();
        assert_eq!(reply.content, "Consensus despite the gap.");
        assert_eq!(reply.members.len(), 2);
        assert!(reply.members[0].succeeded());
        assert!(!reply.members[1].succeeded());
    }

    #[tokio::test]
    async fn collaborate_notes_gaps_in_the_synthesis_prompt() {
        let leader_client = leader(&["Consensus."]);
        let team = Team::builder("researchers", TeamMode::Collaborate)
            .leader(leader_client.clone())
            .member(member("scout", &[], &["Scout findings."]))
            .member(failing_member("broken"))
            .build()
            .unwrap();

        team.run("Research restaurants").await.unwrap();

        let requests = leader_client.requests();
        let synthesis_input = &requests[0].messages[0].content;
        assert!(synthesis_input.contains("Scout findings."));
        assert!(synthesis_input.contains("broken"));
        assert!(synthesis_input.contains("Note the gap"));
    }

    #[tokio::test]
    async fn collaborate_survives_a_panicking_member() {
        struct PanickingClient;

        #[async_trait::async_trait]
        impl crate::model::CompletionClient for PanickingClient {
            async fn complete(
                &self,
                _request: CompletionRequest,
            ) -> crate::error::Result<crate::model::CompletionResponse> {
                panic!("member blew up mid-response")
            }
            fn model_name(&self) -> &str {
                "panicking"
            }
        }

        let unstable = AgentHandle::new(
            Agent::new(
                AgentSpec::new("unstable", "unstable specialist"),
                Arc::new(PanickingClient),
                &ToolRegistry::new(),
            )
            .unwrap(),
        );

        let team = Team::builder("mixed", TeamMode::Collaborate)
            .leader(leader(&["Consensus despite the crash."]))
            .member(member("scout", &[], &["Scout findings."]))
            .member(unstable)
            .build()
            .unwrap();

        let reply = team.run("Research restaurants").await.unwrap();
        assert_eq!(reply.content, "Consensus despite the crash.");
        assert_eq!(reply.members.len(), 2);
        assert!(reply.members[0].succeeded());
        assert!(!reply.members[1].succeeded());
        assert_eq!(reply.members[1].member, "unstable");
    }

    #[tokio::test]
    async fn collaborate_fails_when_every_member_fails() {
        let team = Team::builder("researchers", TeamMode::Collaborate)
            .leader(leader(&[]))
            .member(failing_member("a"))
            .member(failing_member("b"))
            .build()
            .unwrap();

        let err = team.run("Research restaurants").await.unwrap_err();
        assert!(matches!(err, BrigadeError::Infrastructure(_)));
    }

    #[tokio::test]
    async fn route_prefers_a_unique_specialty_keyword() {
        // Leader is never consulted, so an empty script proves it
        let team = Team::builder("event_scrapers", TeamMode::Route)
            .leader(leader(&[]))
            .member(member("eventbrite_agent", &["eventbrite"], &["Eventbrite events."]))
            .member(member("meetup_agent", &["meetup"], &[]))
            .build()
            .unwrap();

        let reply = team.run("Find concerts on Eventbrite this weekend").await.unwrap();
        assert_eq!(reply.content, "Eventbrite events.");
        assert_eq!(reply.members[0].member, "eventbrite_agent");
    }

    #[tokio::test]
    async fn route_asks_the_leader_when_keywords_are_ambiguous() {
        let team = Team::builder("event_scrapers", TeamMode::Route)
            .leader(leader(&["meetup_agent"]))
            .member(member("eventbrite_agent", &["concert"], &[]))
            .member(member("meetup_agent", &["concert"], &["Meetup concerts."]))
            .build()
            .unwrap();

        let reply = team.run("Find a concert near me").await.unwrap();
        assert_eq!(reply.content, "Meetup concerts.");
    }

    #[tokio::test]
    async fn route_rejects_a_leader_choice_outside_the_roster() {
        let team = Team::builder("event_scrapers", TeamMode::Route)
            .leader(leader(&["some_other_agent"]))
            .member(member("eventbrite_agent", &[], &[]))
            .build()
            .unwrap();

        let err = team.run("Find events").await.unwrap_err();
        assert!(matches!(err, BrigadeError::MemberNotFound(_)));
    }

    #[tokio::test]
    async fn run_structured_validates_the_request() {
        let team = Team::builder("event_scrapers", TeamMode::Route)
            .leader(leader(&[]))
            .member(member("eventbrite_agent", &["eventbrite"], &[]))
            .build()
            .unwrap();

        let request = EventSearchRequest {
            location: "".into(),
            event_type: "tech".into(),
            date_range: "upcoming".into(),
            max_events: 1,
            platform_preference: None,
            category: None,
        };
        let err = team.run_structured(&request).await.unwrap_err();
        assert!(matches!(err, BrigadeError::SchemaValidation(_)));
    }

    #[tokio::test]
    async fn events_stream_in_dispatch_order() {
        let mut team = Team::builder("event_scrapers", TeamMode::Route)
            .leader(leader(&[]))
            .member(member("eventbrite_agent", &["eventbrite"], &["Events."]))
            .build()
            .unwrap();
        let mut channel = team.subscribe();

        team.run("eventbrite concerts").await.unwrap();

        assert!(matches!(channel.try_recv(), Some(TeamEvent::RunStarted { .. })));
        assert!(matches!(channel.try_recv(), Some(TeamEvent::Routed { .. })));
        assert!(matches!(channel.try_recv(), Some(TeamEvent::MemberStarted { .. })));
        assert!(matches!(channel.try_recv(), Some(TeamEvent::MemberResponded { .. })));
        assert!(matches!(channel.try_recv(), Some(TeamEvent::SynthesisReady { .. })));
        assert!(channel.try_recv().is_none());
    }

    #[tokio::test]
    async fn member_timeout_degrades_to_a_gap() {
        struct SlowClient;

        #[async_trait::async_trait]
        impl crate::model::CompletionClient for SlowClient {
            async fn complete(
                &self,
                _request: CompletionRequest,
            ) -> crate::error::Result<crate::model::CompletionResponse> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!("timeout should fire first")
            }
            fn model_name(&self) -> &str {
                "slow"
            }
        }

        let slow = AgentHandle::new(
            Agent::new(
                AgentSpec::new("slow", "slow specialist"),
                Arc::new(SlowClient),
                &ToolRegistry::new(),
            )
            .unwrap(),
        );

        let config = LeaderConfig {
            member_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let team = Team::builder("mixed", TeamMode::Collaborate)
            .leader(leader(&["Consensus without the slow member."]))
            .config(config)
            .member(member("fast", &[], &["Fast findings."]))
            .member(slow)
            .build()
            .unwrap();

        let reply = team.run("Research this").await.unwrap();
        assert!(reply.members[0].succeeded());
        assert!(!reply.members[1].succeeded());
        assert!(reply.members[1].error.as_deref().unwrap().contains("slow"));
    }

    #[tokio::test]
    async fn show_member_responses_appends_raw_contributions() {
        let config = LeaderConfig {
            show_member_responses: true,
            ..Default::default()
        };
        let team = Team::builder("researchers", TeamMode::Collaborate)
            .leader(leader(&["Consensus."]))
            .config(config)
            .member(member("scout", &[], &["Scout findings."]))
            .build()
            .unwrap();

        let reply = team.run("Research").await.unwrap();
        assert!(reply.content.starts_with("Consensus."));
        assert!(reply.content.contains("## scout\nScout findings."));
    }
}
