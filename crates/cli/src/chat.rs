//! Interactive chat.
//!
//! Lines typed by the user and events from the message queue are handled
//! in one `tokio::select!` loop. Immediate commands are answered right
//! away, notes are queued and their outcome is printed when the queue
//! reports it.

use color_eyre::eyre::WrapErr;
use colored::Colorize;
use nk_core::session::{Immediate, Session};
use nk_core::state::{MessageQueue, QueueError, QueueSettings};
use nk_protocol::config_models::ConfirmationMode;
use nk_protocol::ipc::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::render;
use crate::workspace::Workspace;

const HELP: &str = "\
Commands:
  /<project> <note>  add a note to a project
  /use <project>     set the current project; plain text goes there
  /read [project]    show a project document
  /list              list projects
  /status            show the queue
  /clear             save this session and start a new one
  /quit              save and exit";

pub struct ChatApp {
    session: Arc<Session>,
    queue: MessageQueue,
    event_rx: UnboundedReceiver<Event>,
    shutdown_timeout: Duration,
    should_exit: bool,
}

impl ChatApp {
    /// Wire a session and its queue over the workspace.
    ///
    /// Chat runs never ask for confirmation: stdin belongs to the prompt.
    pub fn new(workspace: &Workspace) -> Self {
        let mut settings = workspace.settings();
        settings.confirmation = ConfirmationMode::Auto;
        let engine = Arc::new(workspace.engine(settings));
        let session = Arc::new(Session::new(engine, Arc::clone(&workspace.agents)));

        let (events_tx, event_rx) = mpsc::unbounded_channel();
        let queue = MessageQueue::new(
            session.clone(),
            events_tx,
            QueueSettings::from(&workspace.config.global),
        );

        println!("{} documents in {}", "notekit".bold(), workspace.data_dir.display());

        Self {
            session,
            queue,
            event_rx,
            shutdown_timeout: workspace.config.shutdown_timeout(),
            should_exit: false,
        }
    }

    /// Main loop. Returns after `/quit` or end of input.
    pub async fn run(mut self) -> color_eyre::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", "Type /help for commands.".dimmed());

        while !self.should_exit {
            select! {
                Some(event) = self.event_rx.recv() => self.handle_core_event(&event),
                line = lines.next_line() => match line.wrap_err("failed to read input")? {
                    Some(line) => self.handle_input(&line).await,
                    None => self.should_exit = true,
                },
            }
        }

        self.shutdown().await
    }

    fn handle_core_event(&self, event: &Event) {
        if let Some(line) = render::describe_event(event) {
            println!("{line}");
        }
    }

    async fn handle_input(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.eq_ignore_ascii_case("/help") {
            println!("{HELP}");
            return;
        }

        match self.session.handle_immediate(line).await {
            Some(Immediate::Reply(result)) => println!("{}", result.response),
            Some(Immediate::Status) => {
                let status = self.queue.queue_status().await;
                println!("{}", render::describe_status(&status));
            }
            Some(Immediate::Quit) => self.should_exit = true,
            None => {
                if let Err(e) = self.queue.enqueue(line).await {
                    println!("{} {e}", "✗".red());
                }
            }
        }
    }

    /// Let the running note finish, report what was left and save the
    /// session.
    async fn shutdown(mut self) -> color_eyre::Result<()> {
        let pending = self.queue.pending_count().await;
        if pending > 0 {
            println!("{}", format!("{pending} unfinished note(s), letting the current one finish...").dimmed());
        }

        let report = match self.queue.shutdown(self.shutdown_timeout).await {
            Ok(report) => report,
            Err(QueueError::Timeout { report }) => {
                println!("{}", "Timed out waiting for the current note.".yellow());
                report
            }
            Err(e) => return Err(e.into()),
        };

        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_core_event(&event);
        }
        if report.in_flight.is_some() {
            // The running note still holds the session
            return Ok(());
        }

        match self.session.end_session().await {
            Ok(Some(path)) => println!("Session saved to {path}"),
            Ok(None) => {}
            Err(e) => println!("{} could not save the session: {e}", "✗".red()),
        }
        Ok(())
    }
}
