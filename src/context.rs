//! Shared context accumulated across members during a team run

use parking_lot::RwLock;

/// One member contribution recorded for later members and the leader.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub member: String,
    pub content: String,
}

/// Append-only record of member contributions within a single run.
///
/// Leaders share this with members when `share_context` is enabled, so a
/// member can see what teammates found before it.
#[derive(Default)]
pub struct SharedContext {
    entries: RwLock<Vec<ContextEntry>>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, member: impl Into<String>, content: impl Into<String>) {
        self.entries.write().push(ContextEntry {
            member: member.into(),
            content: content.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn entries(&self) -> Vec<ContextEntry> {
        self.entries.read().clone()
    }

    /// Render the accumulated contributions as a prompt block, or `None`
    /// when nothing has been recorded yet.
    pub fn render(&self) -> Option<String> {
        let entries = self.entries.read();
        if entries.is_empty() {
            return None;
        }
        let mut out = String::from("Findings from other team members so far:\n");
        for entry in entries.iter() {
            out.push_str(&format!("## {}\n{}\n\n", entry.member, entry.content));
        }
        Some(out.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_renders_nothing() {
        let context = SharedContext::new();
        assert!(context.is_empty());
        assert!(context.render().is_none());
    }

    #[test]
    fn entries_render_in_order() {
        let context = SharedContext::new();
        context.record("curry_expert", "Use fresh galangal.");
        context.record("soup_expert", "Tom yum needs lemongrass.");

        let rendered = context.render().unwrap();
        let curry = rendered.find("curry_expert").unwrap();
        let soup = rendered.find("soup_expert").unwrap();
        assert!(curry < soup);
        assert!(rendered.contains("## soup_expert\nTom yum needs lemongrass."));
    }
}
