//! Query pipeline over an indexed store with a scripted model.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use common::{ScriptedLlm, index, pipeline, sample_docs, write_files};
use docchat::config::Settings;
use docchat::documents::ChunkingConfig;
use docchat::llm::{LlmError, Role};
use docchat::logging::PipeFormat;
use docchat::logging::record::{self, LogMessage};
use docchat::query::{Conversation, NO_SOURCES_MARKER, QueryError};
use tempfile::TempDir;
use tracing_subscriber::layer::SubscriberExt;

struct Fixture {
    _docs: TempDir,
    store: TempDir,
}

fn indexed(files: &[(&str, &str)]) -> Fixture {
    let docs = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_files(docs.path(), files);
    index(docs.path(), store.path(), ChunkingConfig::default());
    Fixture { _docs: docs, store }
}

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Buffer {
    /// Messages of every captured line, in order.
    fn records(&self) -> Vec<record::LogRecord> {
        let output = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        output.lines().filter_map(record::parse_line).collect()
    }
}

/// Route this thread's events into a buffer in the canonical line format.
fn capture() -> (Buffer, tracing::subscriber::DefaultGuard) {
    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .event_format(PipeFormat)
            .with_writer(move || writer.clone()),
    );
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

fn settings(chain: &str, top_k: usize) -> Settings {
    let mut settings = Settings::default();
    settings.chain.kind = chain.to_string();
    settings.similarity_search.top_k = top_k;
    settings
}

#[tokio::test]
async fn test_retrieval_qa_answers_with_sources() {
    let fixture = indexed(&sample_docs());
    let llm = Arc::new(ScriptedLlm::new(vec![Ok("Two moons.".to_string())]));
    let pipeline = pipeline(&settings("retrieval_qa", 1), fixture.store.path(), llm.clone());
    let mut conversation = Conversation::new();

    let turn = pipeline
        .ask("How many moons does the planet Mars have?", &mut conversation)
        .await
        .unwrap();

    assert_eq!(turn.answer, "Two moons.");
    assert_eq!(turn.sources.len(), 1);
    assert!(turn.sources.iter().next().unwrap().ends_with("mars.md"));
    assert!(conversation.is_empty());

    let request = llm.last_request();
    assert_eq!(request.len(), 1);
    assert_eq!(request[0].role, Role::User);
    assert!(request[0].content.contains("fourth planet from the Sun"));
    assert!(request[0].content.contains("How many moons does the planet Mars have?"));

    let text = pipeline.render_answer(&turn);
    assert!(text.starts_with("Two moons.\n\nSources: "));
    assert!(text.ends_with("mars.md"));
}

#[tokio::test]
async fn test_retrieval_qa_is_stateless() {
    let fixture = indexed(&sample_docs());
    let llm = Arc::new(ScriptedLlm::default());
    let pipeline = pipeline(&settings("retrieval_qa", 2), fixture.store.path(), llm.clone());
    let mut conversation = Conversation::new();

    pipeline.ask("What is in bread?", &mut conversation).await.unwrap();
    pipeline.ask("And llamas?", &mut conversation).await.unwrap();

    assert_eq!(llm.request_count(), 2);
    assert_eq!(llm.last_request().len(), 1);
    assert!(conversation.is_empty());
}

#[tokio::test]
async fn test_conversational_sends_prior_turns() {
    let fixture = indexed(&sample_docs());
    let llm = Arc::new(ScriptedLlm::new(vec![
        Ok("Flour, water, yeast and salt.".to_string()),
        Ok("About an hour.".to_string()),
    ]));
    let pipeline = pipeline(&settings("conversational", 2), fixture.store.path(), llm.clone());
    let mut conversation = Conversation::new();

    pipeline
        .ask("What does bread dough need?", &mut conversation)
        .await
        .unwrap();
    pipeline
        .ask("How long should it bake?", &mut conversation)
        .await
        .unwrap();

    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.turns()[0].question, "What does bread dough need?");

    let request = llm.last_request();
    assert_eq!(request.len(), 3);
    assert_eq!(request[0].role, Role::User);
    assert_eq!(request[0].content, "What does bread dough need?");
    assert_eq!(request[1].role, Role::Assistant);
    assert_eq!(request[1].content, "Flour, water, yeast and salt.");
    assert_eq!(request[2].role, Role::User);
    assert!(request[2].content.contains("How long should it bake?"));
}

#[tokio::test]
async fn test_failed_turn_keeps_history_and_session_usable() {
    let fixture = indexed(&sample_docs());
    let llm = Arc::new(ScriptedLlm::new(vec![
        Ok("First.".to_string()),
        Err(LlmError::Timeout(std::time::Duration::from_secs(300))),
        Ok("Third.".to_string()),
    ]));
    let pipeline = pipeline(&settings("conversational", 1), fixture.store.path(), llm.clone());
    let mut conversation = Conversation::new();

    pipeline.ask("one", &mut conversation).await.unwrap();
    let err = pipeline.ask("two", &mut conversation).await.unwrap_err();
    assert!(matches!(err, QueryError::Llm(LlmError::Timeout(_))));
    assert_eq!(conversation.len(), 1);

    let turn = pipeline.ask("three", &mut conversation).await.unwrap();
    assert_eq!(turn.answer, "Third.");
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.turns()[1].question, "three");
    // The failed question never reached the history
    assert!(llm.last_request().iter().all(|m| m.content != "two"));
}

#[tokio::test]
async fn test_empty_store_answers_with_no_source_marker() {
    let fixture = indexed(&[]);
    let llm = Arc::new(ScriptedLlm::new(vec![Ok("I do not know.".to_string())]));
    let pipeline = pipeline(&settings("retrieval_qa", 3), fixture.store.path(), llm.clone());
    let mut conversation = Conversation::new();

    let turn = pipeline
        .ask("Who won the 1850 election?", &mut conversation)
        .await
        .unwrap();

    assert!(turn.sources.is_empty());
    assert_eq!(llm.request_count(), 1);
    assert_eq!(
        pipeline.render_answer(&turn),
        format!("I do not know.\n\n{NO_SOURCES_MARKER}")
    );
}

#[tokio::test]
async fn test_blank_question_is_rejected_without_inference() {
    let fixture = indexed(&sample_docs());
    let llm = Arc::new(ScriptedLlm::default());
    let pipeline = pipeline(&settings("retrieval_qa", 3), fixture.store.path(), llm.clone());
    let mut conversation = Conversation::new();

    let err = pipeline.ask("   ", &mut conversation).await.unwrap_err();
    assert!(matches!(err, QueryError::EmptyQuestion));
    assert_eq!(llm.request_count(), 0);
}

#[tokio::test]
async fn test_sources_hidden_when_disabled() {
    let fixture = indexed(&sample_docs());
    let llm = Arc::new(ScriptedLlm::new(vec![Ok("Camelids.".to_string())]));
    let mut config = settings("retrieval_qa", 1);
    config.metadata.show_source_in_response = false;
    let pipeline = pipeline(&config, fixture.store.path(), llm);
    let mut conversation = Conversation::new();

    let turn = pipeline
        .ask("What are llamas?", &mut conversation)
        .await
        .unwrap();
    assert_eq!(turn.sources.len(), 1);
    assert_eq!(pipeline.render_answer(&turn), "Camelids.");
}

#[tokio::test]
async fn test_history_and_context_stay_within_budget() {
    let fixture = indexed(&sample_docs());
    let mut config = settings("conversational", 3);
    let active = config.llm.active_model.clone();
    let model = config.llm.models.get_mut(&active).unwrap();
    model.context_size = 1024;
    model.max_tokens = 512;
    let budget = config.active_model().unwrap().context_budget_chars();

    let long_answer = "bread ".repeat(120);
    let llm = Arc::new(ScriptedLlm::new(
        (0..10).map(|_| Ok(long_answer.clone())).collect(),
    ));
    let pipeline = pipeline(&config, fixture.store.path(), llm.clone());
    let mut conversation = Conversation::new();

    for i in 0..10 {
        pipeline
            .ask(&format!("question {i} about bread dough"), &mut conversation)
            .await
            .unwrap();
    }
    assert_eq!(conversation.len(), 10);

    for request in llm.requests.lock().iter() {
        let total: usize = request.iter().map(|m| m.content.chars().count()).sum();
        assert!(total <= budget, "request of {total} chars over {budget}");
    }

    // The newest prior turn still fits, older ones were dropped
    let last = llm.last_request();
    assert_eq!(last.len(), 3);
    assert_eq!(last[0].content, "question 8 about bread dough");
}

#[tokio::test]
async fn test_empty_retrieval_is_logged_as_warning() {
    let fixture = indexed(&[]);
    let llm = Arc::new(ScriptedLlm::default());
    let pipeline = pipeline(&settings("retrieval_qa", 3), fixture.store.path(), llm);
    let mut conversation = Conversation::new();

    let (buffer, _guard) = capture();
    pipeline
        .ask("Who won the 1850 election?", &mut conversation)
        .await
        .unwrap();

    let records = buffer.records();
    let warning = records
        .iter()
        .find(|r| r.level == "WARN")
        .expect("no warning logged");
    assert_eq!(
        LogMessage::classify(&warning.message),
        LogMessage::NoSources("Who won the 1850 election?".to_string())
    );
    assert!(warning.message.starts_with(record::NO_SOURCES));
}

#[tokio::test]
async fn test_failed_turn_is_not_logged_as_inference_time() {
    let fixture = indexed(&sample_docs());
    let llm = Arc::new(ScriptedLlm::new(vec![
        Err(LlmError::Transport("connection refused".to_string())),
        Ok("Fine.".to_string()),
    ]));
    let pipeline = pipeline(&settings("retrieval_qa", 1), fixture.store.path(), llm);
    let mut conversation = Conversation::new();

    let (buffer, _guard) = capture();
    pipeline.ask("first", &mut conversation).await.unwrap_err();
    pipeline.ask("second", &mut conversation).await.unwrap();

    let kinds: Vec<LogMessage> = buffer
        .records()
        .iter()
        .map(|r| LogMessage::classify(&r.message))
        .collect();
    let inference = kinds
        .iter()
        .filter(|k| matches!(k, LogMessage::InferenceTime(_)))
        .count();
    let failed = kinds
        .iter()
        .filter(|k| matches!(k, LogMessage::FailedAfter(_)))
        .count();
    assert_eq!(inference, 1);
    assert_eq!(failed, 1);
}
