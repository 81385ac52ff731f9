//! Chat session transcripts.
//!
//! A transcript is persisted as `sessions/<YYYY-MM-DD_HH-MM-SS>.md` with
//! `[[project]]` links to every project touched during the session.

use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Summary used when no summarizer is available.
pub const FALLBACK_SUMMARY: &str = "Session summary unavailable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Local>,
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Transcript {
    id: String,
    started_at: DateTime<Local>,
    projects: BTreeSet<String>,
    entries: Vec<TranscriptEntry>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    pub fn starting_at(started_at: DateTime<Local>) -> Self {
        Self {
            id: started_at.format("%Y-%m-%d_%H-%M-%S").to_string(),
            started_at,
            projects: BTreeSet::new(),
            entries: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Store path of the session document.
    pub fn path(&self) -> String {
        format!("sessions/{}.md", self.id)
    }

    pub fn record(&mut self, role: Role, content: &str) {
        self.entries.push(TranscriptEntry {
            timestamp: Local::now(),
            role,
            content: content.to_string(),
        });
    }

    pub fn touch(&mut self, project: &str) {
        self.projects.insert(project.to_string());
    }

    pub fn has_content(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Prompt asking for a two or three sentence summary.
    pub fn summary_prompt(&self) -> String {
        let mut prompt = String::from(
            "Summarize this conversation in 2-3 sentences. Focus on what was discussed and any key outcomes.\n\n",
        );
        for entry in &self.entries {
            let _ = write!(prompt, "{}: {}\n\n", entry.role.label(), entry.content);
        }
        prompt
    }

    /// Render the session document.
    pub fn render(&self, ended_at: DateTime<Local>, summary: &str) -> String {
        let projects = if self.projects.is_empty() {
            "(none)".to_string()
        } else {
            self.projects
                .iter()
                .map(|p| format!("[[{p}]]"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut doc = String::new();
        let _ = writeln!(doc, "# Chat Session - {}", self.started_at.format("%Y-%m-%d %H:%M"));
        let _ = writeln!(doc, "\n## Metadata");
        let _ = writeln!(doc, "- Projects: {projects}");
        let _ = writeln!(doc, "- Messages: {}", self.entries.len());
        let _ = writeln!(doc, "- Started: {}", self.started_at.format("%H:%M"));
        let _ = writeln!(doc, "- Ended: {}", ended_at.format("%H:%M"));
        let _ = writeln!(doc, "\n## Summary\n{}", summary.trim());
        let _ = writeln!(doc, "\n## Transcript");
        for entry in &self.entries {
            let _ = writeln!(
                doc,
                "### {} - {}\n{}\n",
                entry.timestamp.format("%H:%M"),
                entry.role.label(),
                entry.content.trim_end()
            );
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_start() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn test_transcript_path_uses_start_time() {
        let transcript = Transcript::starting_at(fixed_start());
        assert_eq!(transcript.id(), "2026-03-14_09-26-53");
        assert_eq!(transcript.path(), "sessions/2026-03-14_09-26-53.md");
    }

    #[test]
    fn test_render_links_touched_projects() {
        let mut transcript = Transcript::starting_at(fixed_start());
        transcript.record(Role::User, "/garden water tomatoes");
        transcript.record(Role::Assistant, "Updated **garden**");
        transcript.touch("garden");
        transcript.touch("attic");

        let doc = transcript.render(fixed_start(), "Watered the garden.");

        assert!(doc.starts_with("# Chat Session - 2026-03-14 09:26\n"));
        assert!(doc.contains("- Projects: [[attic]], [[garden]]"));
        assert!(doc.contains("- Messages: 2"));
        assert!(doc.contains("## Summary\nWatered the garden."));
        assert!(doc.contains("- User\n/garden water tomatoes"));
    }

    #[test]
    fn test_empty_transcript_has_no_content() {
        let transcript = Transcript::new();
        assert!(!transcript.has_content());
        assert!(transcript.render(Local::now(), FALLBACK_SUMMARY).contains("(none)"));
    }
}
