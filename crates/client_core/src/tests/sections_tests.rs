use super::*;
use crate::error::ClientError;
use async_trait::async_trait;
use serde_json::json;
use shared::protocol::{OutreachTarget, QuickWin, StrategicSummary};
use std::collections::{HashMap, VecDeque};
use storage::MemoryStore;

type Scripted = Result<SectionPayload, ClientError>;

#[derive(Default)]
struct ScriptedGenerator {
    responses: std::sync::Mutex<HashMap<SectionKind, VecDeque<Scripted>>>,
    calls: std::sync::Mutex<Vec<(SectionKind, bool)>>,
}

impl ScriptedGenerator {
    fn respond(self, kind: SectionKind, response: Scripted) -> Self {
        self.responses
            .lock()
            .expect("responses")
            .entry(kind)
            .or_default()
            .push_back(response);
        self
    }

    fn push(&self, kind: SectionKind, response: Scripted) {
        self.responses
            .lock()
            .expect("responses")
            .entry(kind)
            .or_default()
            .push_back(response);
    }

    fn calls(&self) -> Vec<(SectionKind, bool)> {
        self.calls.lock().expect("calls").clone()
    }
}

#[async_trait]
impl SectionGenerator for ScriptedGenerator {
    async fn generate_section(
        &self,
        _brand_id: &BrandId,
        section: SectionKind,
        force_refresh: bool,
    ) -> Result<SectionPayload, ClientError> {
        self.calls
            .lock()
            .expect("calls")
            .push((section, force_refresh));
        self.responses
            .lock()
            .expect("responses")
            .get_mut(&section)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(ClientError::Transport(format!("unscripted {section}"))))
    }
}

fn quick_wins(actions: &[&str]) -> SectionPayload {
    SectionPayload::QuickWins(
        actions
            .iter()
            .map(|action| QuickWin {
                action: action.to_string(),
                target_page: "/pricing".into(),
                expected_outcome: "cited in comparisons".into(),
                effort_hours: 2.0,
                steps: vec!["draft".into(), "publish".into()],
            })
            .collect(),
    )
}

fn outreach(name: &str) -> SectionPayload {
    SectionPayload::OutreachTargets(vec![OutreachTarget {
        name: name.into(),
        kind: "publication".into(),
        why: "high authority".into(),
        action: "pitch a guest post".into(),
    }])
}

fn summary(headline: &str) -> SectionPayload {
    SectionPayload::StrategicSummary(StrategicSummary {
        headline: headline.into(),
        key_insight: "comparison pages drive citations".into(),
        biggest_opportunity: "pricing content".into(),
        biggest_threat: "open-source positioning".into(),
        recommended_focus: "technical".into(),
    })
}

fn brand() -> BrandId {
    BrandId::new("wix")
}

fn cache_entry(payload: &SectionPayload) -> Value {
    json!({
        "payload": payload.to_value().expect("payload json"),
        "timestamp": "2020-01-05T10:00:00Z",
    })
}

async fn orchestrator(
    kinds: &[SectionKind],
    generator: &Arc<ScriptedGenerator>,
    store: &Arc<MemoryStore>,
) -> SectionOrchestrator {
    let generator: Arc<dyn SectionGenerator> = generator.clone();
    let store: Arc<dyn DocumentStore> = store.clone();
    SectionOrchestrator::restore(brand(), kinds, generator, store).await
}

fn cached_document(store: &MemoryStore) -> Map<String, Value> {
    match store.snapshot(&cache_document_name(&brand())) {
        Some(Value::Object(document)) => document,
        other => panic!("expected cache document, got {other:?}"),
    }
}

#[tokio::test]
async fn restores_cached_sections_without_network() {
    let cached = quick_wins(&["Add FAQ schema"]);
    let store = Arc::new(MemoryStore::new().with_document(
        &cache_document_name(&brand()),
        json!({ "quick_wins": cache_entry(&cached) }),
    ));
    let generator = Arc::new(ScriptedGenerator::default());

    let sections = orchestrator(
        &[SectionKind::QuickWins, SectionKind::OutreachTargets],
        &generator,
        &store,
    )
    .await;

    let restored = sections.state(SectionKind::QuickWins).expect("quick wins");
    assert_eq!(restored.status, QueryStatus::Success);
    assert_eq!(restored.data, Some(cached));
    assert_eq!(
        sections.state(SectionKind::OutreachTargets).expect("outreach").status,
        QueryStatus::Idle
    );
    assert!(generator.calls().is_empty());
    assert!(sections.has_any_data());
    assert_eq!(
        sections.generated_at(SectionKind::QuickWins).await.map(|ts| ts.to_rfc3339()),
        Some("2020-01-05T10:00:00+00:00".to_string())
    );
}

#[tokio::test]
async fn unreadable_cache_entries_leave_section_idle() {
    let store = Arc::new(MemoryStore::new().with_document(
        &cache_document_name(&brand()),
        json!({
            "quick_wins": { "payload": { "not": "a list" }, "timestamp": "2026-01-05T10:00:00Z" },
            "outreach_targets": { "payload": [] },
        }),
    ));
    let generator = Arc::new(ScriptedGenerator::default());

    let sections = orchestrator(
        &[SectionKind::QuickWins, SectionKind::OutreachTargets],
        &generator,
        &store,
    )
    .await;

    assert!(!sections.has_any_data());
    for (_, state) in sections.states() {
        assert_eq!(state.status, QueryStatus::Idle);
    }
}

#[tokio::test]
async fn failing_section_does_not_affect_others_and_retries_alone() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(
        ScriptedGenerator::default()
            .respond(SectionKind::QuickWins, Ok(quick_wins(&["Add llms.txt"])))
            .respond(
                SectionKind::OutreachTargets,
                Err(ClientError::api(503, "generation backend overloaded")),
            ),
    );
    let sections = orchestrator(
        &[SectionKind::QuickWins, SectionKind::OutreachTargets],
        &generator,
        &store,
    )
    .await;

    let results = sections.generate_all().await;
    assert_eq!(results.len(), 2);

    let wins = sections.state(SectionKind::QuickWins).expect("quick wins");
    assert_eq!(wins.status, QueryStatus::Success);
    let failed = sections.state(SectionKind::OutreachTargets).expect("outreach");
    assert_eq!(failed.status, QueryStatus::Error);
    assert_eq!(failed.error.as_deref(), Some("generation backend overloaded"));
    assert_eq!(sections.failed_sections(), vec![SectionKind::OutreachTargets]);

    let document = cached_document(&store);
    assert!(document.contains_key("quick_wins"));
    assert!(!document.contains_key("outreach_targets"));

    generator.push(SectionKind::OutreachTargets, Ok(outreach("Forbes")));
    let retried = sections
        .retry(SectionKind::OutreachTargets)
        .await
        .expect("managed section");
    assert_eq!(retried.applied().map(|s| s.status), Some(QueryStatus::Success));

    assert_eq!(sections.state(SectionKind::QuickWins), Some(wins));
    let calls = generator.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2], (SectionKind::OutreachTargets, false));
    assert!(sections.failed_sections().is_empty());
}

#[tokio::test]
async fn retry_of_unmanaged_section_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::default());
    let sections = orchestrator(&[SectionKind::QuickWins], &generator, &store).await;

    assert!(sections.retry(SectionKind::CompetitorGaps).await.is_none());
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn success_merges_into_existing_cache_document() {
    let cached_gaps = json!({
        "payload": [{
            "competitor": "Shopify",
            "gap_type": "features",
            "description": "SEO tooling",
            "evidence": "mentioned in 8/10 answers",
            "action_to_close": "publish SEO comparison",
            "urgency": "high"
        }],
        "timestamp": "2026-01-01T00:00:00Z"
    });
    let store = Arc::new(MemoryStore::new().with_document(
        &cache_document_name(&brand()),
        json!({ "competitor_gaps": cached_gaps.clone(), "legacy_widget": { "kept": true } }),
    ));
    let generator = Arc::new(
        ScriptedGenerator::default().respond(SectionKind::StrategicSummary, Ok(summary("Lead with answers"))),
    );
    let sections = orchestrator(
        &[SectionKind::StrategicSummary, SectionKind::CompetitorGaps],
        &generator,
        &store,
    )
    .await;

    sections.retry(SectionKind::StrategicSummary).await;

    let document = cached_document(&store);
    assert_eq!(document.get("competitor_gaps"), Some(&cached_gaps));
    assert_eq!(document.get("legacy_widget"), Some(&json!({ "kept": true })));
    let record: CacheRecord =
        serde_json::from_value(document["strategic_summary"].clone()).expect("record");
    assert_eq!(record.payload["headline"], json!("Lead with answers"));
}

#[tokio::test]
async fn regenerate_all_forces_network_and_overwrites_cache() {
    let old_wins = quick_wins(&["old win"]);
    let old_targets = outreach("Old Blog");
    let store = Arc::new(MemoryStore::new().with_document(
        &cache_document_name(&brand()),
        json!({
            "quick_wins": cache_entry(&old_wins),
            "outreach_targets": cache_entry(&old_targets),
        }),
    ));
    let new_wins = quick_wins(&["new win", "another"]);
    let new_targets = outreach("Hostinger");
    let generator = Arc::new(
        ScriptedGenerator::default()
            .respond(SectionKind::QuickWins, Ok(new_wins.clone()))
            .respond(SectionKind::OutreachTargets, Ok(new_targets.clone())),
    );
    let sections = orchestrator(
        &[SectionKind::QuickWins, SectionKind::OutreachTargets],
        &generator,
        &store,
    )
    .await;
    assert!(generator.calls().is_empty());

    sections.regenerate_all().await;

    let mut calls = generator.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec![(SectionKind::QuickWins, true), (SectionKind::OutreachTargets, true)]
    );
    assert_eq!(sections.state(SectionKind::QuickWins).and_then(|s| s.data), Some(new_wins.clone()));

    let document = cached_document(&store);
    let wins: CacheRecord = serde_json::from_value(document["quick_wins"].clone()).expect("wins");
    assert_eq!(wins.payload, new_wins.to_value().expect("json"));
    let old_timestamp: DateTime<Utc> = "2020-01-05T10:00:00Z".parse().expect("timestamp");
    assert!(wins.timestamp > old_timestamp);
    let targets: CacheRecord =
        serde_json::from_value(document["outreach_targets"].clone()).expect("targets");
    assert_eq!(targets.payload, new_targets.to_value().expect("json"));
}

#[tokio::test]
async fn failed_regeneration_keeps_cached_entry() {
    let old_wins = quick_wins(&["old win"]);
    let store = Arc::new(MemoryStore::new().with_document(
        &cache_document_name(&brand()),
        json!({ "quick_wins": cache_entry(&old_wins) }),
    ));
    let generator = Arc::new(
        ScriptedGenerator::default().respond(SectionKind::QuickWins, Err(ClientError::Transport("reset".into()))),
    );
    let sections = orchestrator(&[SectionKind::QuickWins], &generator, &store).await;

    sections.regenerate_all().await;

    let state = sections.state(SectionKind::QuickWins).expect("quick wins");
    assert_eq!(state.status, QueryStatus::Error);
    assert_eq!(state.error.as_deref(), Some("request failed: reset"));
    assert_eq!(state.data, Some(old_wins.clone()), "cached payload stays on screen");
    assert!(sections.has_any_data());
    assert_eq!(sections.failed_sections(), vec![SectionKind::QuickWins]);
    assert_eq!(generator.calls(), vec![(SectionKind::QuickWins, true)]);
    assert_eq!(store.write_count(), 0);
    assert_eq!(
        cached_document(&store).get("quick_wins"),
        Some(&cache_entry(&old_wins))
    );
}

#[tokio::test]
async fn failed_retry_of_cached_section_keeps_payload() {
    let cached = quick_wins(&["cached win"]);
    let store = Arc::new(MemoryStore::new().with_document(
        &cache_document_name(&brand()),
        json!({ "quick_wins": cache_entry(&cached) }),
    ));
    let generator = Arc::new(ScriptedGenerator::default().respond(
        SectionKind::QuickWins,
        Err(ClientError::api(503, "LLM quota exhausted")),
    ));
    let sections = orchestrator(&[SectionKind::QuickWins], &generator, &store).await;

    let settled = sections
        .retry(SectionKind::QuickWins)
        .await
        .expect("managed section");

    assert_eq!(
        settled,
        Settled::Applied(QueryState::failed("LLM quota exhausted", Some(cached.clone())))
    );
    assert_eq!(generator.calls(), vec![(SectionKind::QuickWins, false)]);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn generate_missing_skips_sections_with_data() {
    let store = Arc::new(MemoryStore::new().with_document(
        &cache_document_name(&brand()),
        json!({ "quick_wins": cache_entry(&quick_wins(&["cached"])) }),
    ));
    let generator = Arc::new(
        ScriptedGenerator::default().respond(SectionKind::OutreachTargets, Ok(outreach("Reddit"))),
    );
    let sections = orchestrator(
        &[SectionKind::QuickWins, SectionKind::OutreachTargets],
        &generator,
        &store,
    )
    .await;

    let results = sections.generate_missing().await;
    assert_eq!(results.len(), 1);
    assert_eq!(generator.calls(), vec![(SectionKind::OutreachTargets, false)]);

    assert!(sections.generate_missing().await.is_empty());
    assert_eq!(generator.calls().len(), 1);
}

#[tokio::test]
async fn cache_write_failure_does_not_change_section_state() {
    let store = Arc::new(MemoryStore::new());
    store.set_fail_writes(true);
    let generator = Arc::new(
        ScriptedGenerator::default().respond(SectionKind::QuickWins, Ok(quick_wins(&["win"]))),
    );
    let sections = orchestrator(&[SectionKind::QuickWins], &generator, &store).await;

    sections.generate_all().await;

    assert_eq!(sections.state(SectionKind::QuickWins).map(|s| s.status), Some(QueryStatus::Success));
    assert!(store.snapshot(&cache_document_name(&brand())).is_none());
    assert!(sections.generated_at(SectionKind::QuickWins).await.is_none());
}

#[tokio::test]
async fn cached_data_survives_restart() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(
        ScriptedGenerator::default().respond(SectionKind::QuickWins, Ok(quick_wins(&["persisted"]))),
    );
    let first = orchestrator(&[SectionKind::QuickWins], &generator, &store).await;
    first.generate_all().await;
    drop(first);

    let restarted = orchestrator(&[SectionKind::QuickWins], &generator, &store).await;
    assert_eq!(
        restarted.state(SectionKind::QuickWins).and_then(|s| s.data),
        Some(quick_wins(&["persisted"]))
    );
    assert_eq!(generator.calls().len(), 1);
}
