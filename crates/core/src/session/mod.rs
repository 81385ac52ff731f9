//! Chat session.
//!
//! A `Session` keeps the current project and the transcript of one chat.
//! Immediate commands and queued notes both lock the same session state,
//! so an immediate command never observes a note halfway through.

pub mod commands;
pub mod transcript;

pub use commands::{is_immediate, ChatCommand};
pub use transcript::{Role, Transcript};

use crate::agents::{AgentManager, ExecutionContext, SUMMARIZER};
use crate::engine::input::{project_path, validate_project_name};
use crate::engine::PipelineEngine;
use crate::state::MessageHandler;
use crate::store::StoreResult;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Local;
use nk_protocol::message_models::{MessageResult, UpdateDetails};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use transcript::FALLBACK_SUMMARY;

/// What an immediate command asks the front end to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Immediate {
    /// Show this reply.
    Reply(MessageResult),
    /// Show the queue status.
    Status,
    /// End the chat.
    Quit,
}

struct SessionState {
    current_project: Option<String>,
    transcript: Transcript,
}

pub struct Session {
    engine: Arc<PipelineEngine>,
    agents: Arc<AgentManager>,
    state: Mutex<SessionState>,
}

impl Session {
    /// # Arguments
    ///
    /// * `engine` - Pipeline used for notes
    /// * `agents` - Agents used to summarize the transcript
    pub fn new(engine: Arc<PipelineEngine>, agents: Arc<AgentManager>) -> Self {
        Self {
            engine,
            agents,
            state: Mutex::new(SessionState {
                current_project: None,
                transcript: Transcript::new(),
            }),
        }
    }

    pub async fn current_project(&self) -> Option<String> {
        self.state.lock().await.current_project.clone()
    }

    /// Run an immediate command.
    ///
    /// Returns `None` when `input` is not an immediate command and has to
    /// go through the queue instead.
    pub async fn handle_immediate(&self, input: &str) -> Option<Immediate> {
        let command = ChatCommand::parse(input);
        if !command.is_immediate() {
            return None;
        }

        match command {
            ChatCommand::Status => Some(Immediate::Status),
            ChatCommand::Quit => Some(Immediate::Quit),
            ChatCommand::Clear => {
                let saved = self.end_session().await;
                let response = match saved {
                    Ok(Some(path)) => format!("Session saved to {path}. Started a new session."),
                    Ok(None) => "Started a new session.".to_string(),
                    Err(e) => {
                        warn!(error = %e, "failed to save session");
                        format!("Could not save the session: {e}")
                    }
                };
                Some(Immediate::Reply(MessageResult::reply(response)))
            }
            command => {
                let mut state = self.state.lock().await;
                state.transcript.record(Role::User, input.trim());
                let response = self.run_immediate(&mut state, command).await;
                state.transcript.record(Role::Assistant, &response);
                Some(Immediate::Reply(MessageResult::reply(response)))
            }
        }
    }

    /// Handle one message: a note for a project, or any immediate command.
    ///
    /// # Errors
    ///
    /// The pipeline error of a note that could not be integrated, with its
    /// full detail.
    pub async fn send_message(&self, input: &str) -> anyhow::Result<MessageResult> {
        let command = ChatCommand::parse(input);
        let (project, note) = match command {
            ChatCommand::Note { project, note } => (project, note),
            ChatCommand::Plain(note) => {
                let current = self.state.lock().await.current_project.clone();
                match current {
                    Some(project) => (project, note),
                    None => {
                        let response = "No project selected. Use `/use project-name` first.";
                        let mut state = self.state.lock().await;
                        state.transcript.record(Role::User, input.trim());
                        state.transcript.record(Role::Assistant, response);
                        return Ok(MessageResult::reply(response));
                    }
                }
            }
            _ => {
                return Ok(match self.handle_immediate(input).await {
                    Some(Immediate::Reply(result)) => result,
                    Some(Immediate::Status) => MessageResult::reply("Queue status is shown by the chat prompt."),
                    Some(Immediate::Quit) => MessageResult::reply("Use /quit at the chat prompt to leave."),
                    None => MessageResult::reply(String::new()),
                })
            }
        };

        let mut state = self.state.lock().await;
        state.transcript.record(Role::User, input.trim());
        validate_project_name(&project)?;
        state.current_project = Some(project.clone());

        let run = self.engine.run(&format!("/{project} {note}")).await;

        if let Some(error) = run.error {
            let detail = error.detail();
            state.transcript.record(Role::Assistant, &format!("Error: {detail}"));
            return Err(anyhow!(detail));
        }

        let response = match &run.commit_id {
            Some(commit) => {
                state.transcript.touch(&project);
                let short: String = commit.chars().take(8).collect();
                format!("Updated **{project}** ({short})")
            }
            None => "No changes were made.".to_string(),
        };
        state.transcript.record(Role::Assistant, &response);

        let updated_docs = run.updated_docs();
        let update_details = run.commit_id.is_some().then(|| UpdateDetails {
            files: updated_docs.clone(),
            commit_message: run.commit_message.clone(),
            commit_id: run.commit_id.clone(),
        });

        Ok(MessageResult {
            response,
            updated_docs,
            update_details,
        })
    }

    /// Persist a non-empty transcript and start a new one.
    ///
    /// Returns the store path of the session document.
    pub async fn end_session(&self) -> StoreResult<Option<String>> {
        let mut state = self.state.lock().await;
        if !state.transcript.has_content() {
            return Ok(None);
        }

        let summary = if self.agents.has_agent(SUMMARIZER) {
            let context = ExecutionContext::new(state.transcript.summary_prompt());
            match self.agents.generate_text(SUMMARIZER, &context).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(error = %e, "session summary failed");
                    FALLBACK_SUMMARY.to_string()
                }
            }
        } else {
            FALLBACK_SUMMARY.to_string()
        };

        let path = state.transcript.path();
        let document = state.transcript.render(Local::now(), &summary);
        let store = self.engine.store();
        store.write(&path, &document).await?;
        store
            .commit(
                std::slice::from_ref(&path),
                &[],
                &format!("session: Add chat session {}", state.transcript.id()),
            )
            .await?;

        info!(path = %path, "session saved");
        state.transcript = Transcript::new();
        Ok(Some(path))
    }

    async fn run_immediate(&self, state: &mut SessionState, command: ChatCommand) -> String {
        match command {
            ChatCommand::List => self.list_projects(state).await,
            ChatCommand::Use(project) | ChatCommand::Switch(project) => {
                if project.is_empty() {
                    return "Usage: `/use project-name`".to_string();
                }
                if let Err(e) = validate_project_name(&project) {
                    return e.to_string();
                }
                let exists = matches!(self.engine.store().exists(&self.project_path(&project)).await, Ok(true));
                state.current_project = Some(project.clone());
                if exists {
                    format!("Switched to project: **{project}**")
                } else {
                    format!("Set project to: **{project}** (will be created on first note)")
                }
            }
            ChatCommand::Read(project) => {
                let Some(project) = project.or_else(|| state.current_project.clone()) else {
                    return "No project selected. Use `/read project-name` or `/use project-name` first."
                        .to_string();
                };
                if validate_project_name(&project).is_err() {
                    return format!("Project **{project}** not found.");
                }
                match self.engine.store().read(&self.project_path(&project)).await {
                    Ok(Some(content)) => content,
                    Ok(None) => format!("Project **{project}** not found."),
                    Err(e) => format!("Could not read **{project}**: {e}"),
                }
            }
            // Handled by the caller
            ChatCommand::Status | ChatCommand::Quit | ChatCommand::Clear => String::new(),
            ChatCommand::Note { .. } | ChatCommand::Plain(_) => String::new(),
        }
    }

    async fn list_projects(&self, state: &SessionState) -> String {
        let run = self.engine.run("/list").await;
        if let Some(error) = run.error {
            return format!("Could not list projects: {error}");
        }
        if run.listing.is_empty() {
            return "No projects yet. Use `/use project-name` to create one.".to_string();
        }

        let mut response = String::from("**Available projects:**");
        for path in &run.listing {
            let name = path
                .rsplit('/')
                .next()
                .unwrap_or(path)
                .trim_end_matches(".md");
            response.push_str(&format!("\n- {name}"));
        }
        if let Some(current) = &state.current_project {
            response.push_str(&format!("\n\n*Current: {current}*"));
        }
        response
    }

    fn project_path(&self, project: &str) -> String {
        project_path(&self.engine.settings().create_prefix, project)
    }
}

#[async_trait]
impl MessageHandler for Session {
    async fn handle(&self, content: &str) -> anyhow::Result<MessageResult> {
        self.send_message(content).await
    }
}
