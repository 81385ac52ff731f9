//! Integration tests for the message queue and the chat session it drives.

mod common;

use common::*;
use nk_core::agents::{AgentManager, MockAgent};
use nk_core::session::{Immediate, Session};
use nk_core::state::{MessageQueue, QueueError};
use nk_core::store::MemoryStore;
use nk_protocol::ipc::Event;
use nk_protocol::message_models::MessageStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Wait until the message is reported as Processing.
async fn wait_until_processing(rx: &mut mpsc::UnboundedReceiver<Event>, id: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            if let Event::MessageStatusUpdate {
                message_id,
                status: MessageStatus::Processing,
            } = event
            {
                if message_id == id {
                    return;
                }
            }
        }
    })
    .await
    .expect("message never started");
}

#[tokio::test]
async fn test_messages_are_processed_one_at_a_time_in_order() {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handler = Arc::new(RecordingHandler::with_delay(Duration::from_millis(20)));
    let queue = MessageQueue::new(handler.clone(), events_tx, fast_queue_settings());

    let mut ids = Vec::new();
    for content in ["first", "second", "please fail", "fourth"] {
        ids.push(queue.enqueue(content).await.unwrap());
    }
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let last = queue.wait_for(4).await.unwrap();
    assert_eq!(last.status, MessageStatus::Completed);

    assert_eq!(
        *handler.seen.lock().await,
        vec!["first", "second", "please fail", "fourth"]
    );
    assert_eq!(*handler.max_running.lock().await, 1);

    let failed = queue.message(3).await.unwrap();
    assert_eq!(failed.status, MessageStatus::Failed);
    assert_contains_ci(failed.error.as_deref().unwrap(), "could not handle");
    assert!(failed.finished_at.is_some());

    let events = drain_events(&mut events_rx);
    assert_eq!(processing_order(&events), vec![1, 2, 3, 4]);
    assert_eq!(
        status_sequence(&events, 1),
        vec![MessageStatus::Processing, MessageStatus::Completed]
    );
    assert_eq!(
        status_sequence(&events, 3),
        vec![MessageStatus::Processing, MessageStatus::Failed]
    );

    let status = queue.queue_status().await;
    assert_eq!(status.total, 4);
    assert_eq!(status.completed_count, 3);
    assert_eq!(status.failed_count, 1);
    assert!(status.queued.is_empty());
    assert_eq!(status.processing, None);
}

#[tokio::test]
async fn test_shutdown_leaves_unstarted_messages_queued() {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handler = Arc::new(RecordingHandler::with_delay(Duration::from_millis(100)));
    let queue = MessageQueue::new(handler.clone(), events_tx, fast_queue_settings());

    for content in ["one", "two", "three"] {
        queue.enqueue(content).await.unwrap();
    }
    wait_until_processing(&mut events_rx, 1).await;

    let report = queue.shutdown(Duration::from_secs(5)).await.unwrap();

    assert_eq!(report.abandoned, vec![2, 3]);
    assert_eq!(report.in_flight, None);
    assert_eq!(queue.status(1).await, Some(MessageStatus::Completed));
    assert_eq!(queue.status(2).await, Some(MessageStatus::Queued));
    assert_eq!(*handler.seen.lock().await, vec!["one"]);

    // Waiting on an abandoned message returns instead of hanging
    let abandoned = queue.wait_for(3).await.unwrap();
    assert_eq!(abandoned.status, MessageStatus::Queued);

    assert_eq!(queue.enqueue("late").await, Err(QueueError::ShuttingDown));

    let events = drain_events(&mut events_rx);
    assert!(events.contains(&Event::QueueShutdown { abandoned: vec![2, 3] }));
}

#[tokio::test]
async fn test_shutdown_timeout_lets_in_flight_message_finish() {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handler = Arc::new(RecordingHandler::with_delay(Duration::from_millis(300)));
    let queue = MessageQueue::new(handler, events_tx, fast_queue_settings());

    queue.enqueue("slow").await.unwrap();
    wait_until_processing(&mut events_rx, 1).await;

    let error = queue.shutdown(Duration::from_millis(20)).await.unwrap_err();
    match error {
        QueueError::Timeout { report } => {
            assert_eq!(report.in_flight, Some(1));
            assert!(report.abandoned.is_empty());
        }
        other => panic!("expected a timeout, got {other:?}"),
    }

    let finished = queue.wait_for(1).await.unwrap();
    assert_eq!(finished.status, MessageStatus::Completed);
}

#[tokio::test]
async fn test_acknowledge_only_removes_finished_messages() {
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let handler = Arc::new(RecordingHandler::default());
    let queue = MessageQueue::new(handler, events_tx, fast_queue_settings());

    let id = queue.enqueue("hello").await.unwrap();
    queue.wait_for(id).await.unwrap();

    let acknowledged = queue.acknowledge(id).await.unwrap();
    assert_eq!(acknowledged.result.unwrap().response, "handled hello");
    assert_eq!(queue.status(id).await, None);
    assert!(queue.wait_for(id).await.is_none());
    assert!(queue.acknowledge(99).await.is_none());
}

#[tokio::test]
async fn test_session_notes_go_through_queue() {
    let store = Arc::new(MemoryStore::new());
    let architect = MockAgent::responding(vec![
        create_answer("projects/garden.md", "# Garden\n- water tomatoes\n"),
        edit_answer("projects/garden.md", &[("", "- weed beds\n")], "garden: weeds"),
    ]);
    let engine = Arc::new(create_engine(&store, architect_only(&architect)));
    let session = Arc::new(Session::new(engine, Arc::new(AgentManager::default())));

    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let queue = MessageQueue::new(session.clone(), events_tx, fast_queue_settings());

    let first = queue.enqueue("/garden water tomatoes").await.unwrap();
    let second = queue.enqueue("weed the beds").await.unwrap();
    let unrouted = queue.wait_for(second).await.unwrap();
    let created = queue.message(first).await.unwrap();

    assert_eq!(created.status, MessageStatus::Completed);
    let result = created.result.unwrap();
    assert_eq!(result.updated_docs, vec!["projects/garden.md"]);
    assert!(result.response.contains("**garden**"));

    // The second note goes to the project selected by the first
    assert_eq!(unrouted.status, MessageStatus::Completed);
    assert_eq!(
        store.files().await["projects/garden.md"],
        "# Garden\n- water tomatoes\n- weed beds\n"
    );
    assert_eq!(session.current_project().await.as_deref(), Some("garden"));

    match session.handle_immediate("/list").await {
        Some(Immediate::Reply(reply)) => assert!(reply.response.contains("- garden")),
        other => panic!("expected a reply, got {other:?}"),
    }

    let saved = session.end_session().await.unwrap().unwrap();
    assert!(saved.starts_with("sessions/"));
    let commits = store.commits().await;
    assert_eq!(commits.len(), 3);
    assert!(commits[2].message.starts_with("session: Add chat session"));
    assert!(store.files().await[&saved].contains("garden"));
}

#[tokio::test]
async fn test_failed_note_marks_message_failed() {
    let store = Arc::new(MemoryStore::with_files([("projects/a.md", "# A\n")]));
    let architect = MockAgent::responding(vec![edit_answer("projects/a.md", &[("missing", "x")], "a")]);
    let engine = Arc::new(create_engine(&store, architect_only(&architect)));
    let session = Arc::new(Session::new(engine, Arc::new(AgentManager::default())));

    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let queue = MessageQueue::new(session, events_tx, fast_queue_settings());

    let id = queue.enqueue("/a add x").await.unwrap();
    let message = queue.wait_for(id).await.unwrap();

    assert_eq!(message.status, MessageStatus::Failed);
    assert_contains_ci(message.error.as_deref().unwrap(), "search text not found");
    assert!(store.commits().await.is_empty());
}
