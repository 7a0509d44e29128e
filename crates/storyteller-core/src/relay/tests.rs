use super::*;
use crate::error::Upstream;
use crate::identity::MemoryIdentityStore;
use crate::summary::MemorySummaryStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

struct FakeSummarizer {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl FakeSummarizer {
    fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, _story: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| RelayError::provider(Upstream::Completion, "HTTP 500"))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create(String),
    Append(String, String),
    Converse(String, String),
}

/// Records every call; can see the identity store to check ordering.
struct FakeAgents {
    identity: Arc<MemoryIdentityStore>,
    calls: StdMutex<Vec<Call>>,
    created: AtomicUsize,
    /// Whether the conversing agent id was already persisted, per converse call.
    persisted_at_converse: StdMutex<Vec<bool>>,
    fail_append: bool,
}

impl FakeAgents {
    fn new(identity: Arc<MemoryIdentityStore>) -> Arc<Self> {
        Arc::new(Self {
            identity,
            calls: StdMutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            persisted_at_converse: StdMutex::new(Vec::new()),
            fail_append: false,
        })
    }

    fn failing_append(identity: Arc<MemoryIdentityStore>) -> Arc<Self> {
        Arc::new(Self {
            identity,
            calls: StdMutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            persisted_at_converse: StdMutex::new(Vec::new()),
            fail_append: true,
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(_)))
            .count()
    }
}

#[async_trait]
impl AgentService for FakeAgents {
    async fn create_agent(&self, seed_summary: &str) -> Result<AgentId> {
        // Widen the window for racing requests
        tokio::time::sleep(Duration::from_millis(20)).await;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls
            .lock()
            .unwrap()
            .push(Call::Create(seed_summary.to_string()));
        Ok(AgentId::parse(&format!("agent-{}", n)).unwrap())
    }

    async fn append_memory(&self, id: &AgentId, summary: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Append(id.to_string(), summary.to_string()));
        if self.fail_append {
            return Err(RelayError::provider(Upstream::AgentServer, "HTTP 404: agent not found"));
        }
        Ok(())
    }

    async fn converse(&self, id: &AgentId, message: &str) -> Result<String> {
        let persisted = self.identity.load().await?.as_ref() == Some(id);
        self.persisted_at_converse.lock().unwrap().push(persisted);
        self.calls
            .lock()
            .unwrap()
            .push(Call::Converse(id.to_string(), message.to_string()));
        Ok(format!("reply to {}", message))
    }
}

struct Harness {
    relay: Arc<Relay>,
    identity: Arc<MemoryIdentityStore>,
    summaries: Arc<MemorySummaryStore>,
    summarizer: Arc<FakeSummarizer>,
    agents: Arc<FakeAgents>,
}

fn harness_with(
    identity: MemoryIdentityStore,
    summarizer: Arc<FakeSummarizer>,
    failing_append: bool,
) -> Harness {
    let identity = Arc::new(identity);
    let summaries = Arc::new(MemorySummaryStore::new());
    let agents = if failing_append {
        FakeAgents::failing_append(identity.clone())
    } else {
        FakeAgents::new(identity.clone())
    };
    let relay = Arc::new(Relay::new(
        identity.clone(),
        summaries.clone(),
        summarizer.clone(),
        agents.clone(),
    ));
    Harness {
        relay,
        identity,
        summaries,
        summarizer,
        agents,
    }
}

fn harness() -> Harness {
    harness_with(
        MemoryIdentityStore::new(),
        FakeSummarizer::returning("A short tale."),
        false,
    )
}

fn existing(id: &str) -> MemoryIdentityStore {
    MemoryIdentityStore::with_agent(AgentId::parse(id).unwrap())
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_without_agent_or_summary_makes_no_agent_calls() {
    let h = harness();

    let err = h.relay.chat("Hello?").await.unwrap_err();
    assert!(matches!(err, RelayError::NoAgentAvailable));
    assert!(h.agents.calls().is_empty());
    assert_eq!(h.identity.load().await.unwrap(), None);
}

#[tokio::test]
async fn chat_seeds_new_agent_from_latest_summary() {
    let h = harness();
    h.summaries.append("Old tale.").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    h.summaries.append("Newest tale.").await.unwrap();

    let reply = h.relay.chat("Who is the hero?").await.unwrap();
    assert_eq!(reply, "reply to Who is the hero?");

    assert_eq!(
        h.agents.calls(),
        vec![
            Call::Create("Newest tale.".into()),
            Call::Converse("agent-1".into(), "Who is the hero?".into()),
        ]
    );
    assert_eq!(*h.agents.persisted_at_converse.lock().unwrap(), vec![true]);
    assert_eq!(
        h.identity.load().await.unwrap(),
        Some(AgentId::parse("agent-1").unwrap())
    );
}

#[tokio::test]
async fn chat_reuses_cached_agent() {
    let h = harness_with(
        existing("agent-cached"),
        FakeSummarizer::returning("unused"),
        false,
    );

    h.relay.chat("one").await.unwrap();
    h.relay.chat("two").await.unwrap();

    assert_eq!(h.agents.creates(), 0);
    assert_eq!(
        h.agents.calls(),
        vec![
            Call::Converse("agent-cached".into(), "one".into()),
            Call::Converse("agent-cached".into(), "two".into()),
        ]
    );
}

#[tokio::test]
async fn blank_message_is_rejected_before_any_upstream_call() {
    let h = harness();
    h.summaries.append("A tale.").await.unwrap();

    for message in ["", "   ", "\n\t"] {
        let err = h.relay.chat(message).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Validation error: Message is required");
    }
    assert!(h.agents.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_chats_create_one_agent() {
    let h = harness();
    h.summaries.append("Seed tale.").await.unwrap();

    let (a, b, c) = tokio::join!(
        h.relay.chat("a"),
        h.relay.chat("b"),
        h.relay.chat("c")
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(h.agents.creates(), 1);
}

// ── Add story ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_story_appends_to_existing_agent() {
    let h = harness_with(
        existing("agent-9"),
        FakeSummarizer::returning("A short tale."),
        false,
    );

    let receipt = h.relay.add_story("Once upon a time...").await.unwrap();

    let stored = h.summaries.entries().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text, "A short tale.");
    assert_eq!(receipt.summary_id, stored[0].key);
    assert_eq!(
        receipt.agent,
        AgentUpdate::Appended(AgentId::parse("agent-9").unwrap())
    );
    assert_eq!(
        h.agents.calls(),
        vec![Call::Append("agent-9".into(), "A short tale.".into())]
    );
}

#[tokio::test]
async fn add_story_without_agent_creates_one_seeded_with_new_summary() {
    let h = harness();
    h.summaries.append("Older tale.").await.unwrap();

    let receipt = h.relay.add_story("Once upon a time...").await.unwrap();

    assert_eq!(
        h.agents.calls(),
        vec![Call::Create("A short tale.".into())]
    );
    assert_eq!(
        receipt.agent,
        AgentUpdate::Created(AgentId::parse("agent-1").unwrap())
    );
    assert_eq!(
        h.identity.load().await.unwrap(),
        Some(receipt.agent.agent_id().clone())
    );
}

#[tokio::test]
async fn added_story_becomes_latest_summary() {
    let h = harness();
    h.summaries.append("Earlier tale.").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;

    let receipt = h.relay.add_story("A brand new story.").await.unwrap();

    let latest = h.summaries.latest().await.unwrap().unwrap();
    assert_eq!(latest.key, receipt.summary_id);
    assert!(!latest.text.is_empty());
}

#[tokio::test]
async fn blank_story_is_rejected_before_any_upstream_call() {
    let h = harness();

    let err = h.relay.add_story("  ").await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 0);
    assert!(h.summaries.entries().await.is_empty());
    assert!(h.agents.calls().is_empty());
}

#[tokio::test]
async fn summarizer_failure_stops_before_storing() {
    let h = harness_with(MemoryIdentityStore::new(), FakeSummarizer::failing(), false);

    let err = h.relay.add_story("A story").await.unwrap_err();
    match &err {
        RelayError::Story { step, source } => {
            assert_eq!(*step, StoryStep::Summarize);
            assert!(matches!(**source, RelayError::Provider { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.summaries.entries().await.is_empty());
    assert!(h.agents.calls().is_empty());
}

#[tokio::test]
async fn agent_failure_keeps_stored_summary() {
    let h = harness_with(
        existing("agent-stale"),
        FakeSummarizer::returning("A short tale."),
        true,
    );

    let err = h.relay.add_story("A story").await.unwrap_err();
    match &err {
        RelayError::Story { step, .. } => assert_eq!(*step, StoryStep::PropagateToAgent),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root(), RelayError::Provider { .. }));

    // No compensation: the summary written in the earlier step stays
    assert_eq!(h.summaries.entries().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_stories_create_exactly_one_agent() {
    let h = harness();

    let (a, b) = tokio::join!(
        h.relay.add_story("First story"),
        h.relay.add_story("Second story")
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(h.agents.creates(), 1);
    assert_eq!(a.agent.agent_id(), b.agent.agent_id());

    let created = [&a, &b]
        .iter()
        .filter(|r| matches!(r.agent, AgentUpdate::Created(_)))
        .count();
    assert_eq!(created, 1);
    assert_eq!(h.summaries.entries().await.len(), 2);
}

// ── Agent lifecycle ──────────────────────────────────────────────────────────

#[tokio::test]
async fn cleared_identity_makes_next_chat_recreate() {
    let h = harness_with(
        existing("agent-old"),
        FakeSummarizer::returning("unused"),
        false,
    );
    h.summaries.append("Replayed tale.").await.unwrap();

    assert_eq!(
        h.relay.current_agent().await.unwrap(),
        Some(AgentId::parse("agent-old").unwrap())
    );
    h.identity.clear().await.unwrap();
    assert_eq!(h.relay.current_agent().await.unwrap(), None);

    h.relay.chat("hello again").await.unwrap();
    assert_eq!(
        h.agents.calls(),
        vec![
            Call::Create("Replayed tale.".into()),
            Call::Converse("agent-1".into(), "hello again".into()),
        ]
    );
}

#[test]
fn story_steps_run_in_order() {
    let names: Vec<_> = StoryStep::ALL.iter().map(|s| s.as_str()).collect();
    assert_eq!(names, vec!["summarize", "store_summary", "propagate_to_agent"]);
}
