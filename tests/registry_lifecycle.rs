//! Crate-level integration tests for the research loop registry: the
//! cross-module properties and literal end-to-end scenarios the registry's
//! operation contract is built against.

use std::sync::Arc;

use research_loop_registry::params::{
    CheckpointParams, CloseParams, ContinueParams, ListParams, StartParams, StatusParams,
};
use research_loop_registry::response::OkPayload;
use research_loop_registry::triage::ListView;
use research_loop_registry::{Envelope, Params, Priority, Recommendation, RegistryService};

use research_loop_registry::ids::UuidGenerator;
use research_loop_registry::session::Sha256SessionResolver;
use research_loop_registry::time::SystemClock;

fn service(store_path: &std::path::Path, session_key: &str) -> RegistryService {
    RegistryService::with_dependencies(
        session_key,
        store_path.to_path_buf(),
        Arc::new(SystemClock),
        Arc::new(UuidGenerator),
        Arc::new(Sha256SessionResolver),
    )
}

async fn start(svc: &RegistryService, topic: &str, max_rounds: Option<f64>) -> String {
    let envelope = svc
        .execute(
            "tc".to_string(),
            Params::Start(StartParams {
                topic: topic.to_string(),
                priority: None,
                max_rounds,
            }),
        )
        .await;
    match envelope {
        Envelope::Started { loop_view, .. } => loop_view.loop_id,
        other => panic!("expected Started, got {other:?}"),
    }
}

fn checkpoint_params(loop_id: &str, summary: &str) -> CheckpointParams {
    CheckpointParams {
        loop_id: loop_id.to_string(),
        summary: summary.to_string(),
        recommendation: Some(Recommendation::Continue),
        ..Default::default()
    }
}

#[tokio::test]
async fn scenario_1_lifecycle_cap() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(&dir.path().join("loops.json"), "sess-1");

    let loop_id = start(&svc, "M", Some(2.0)).await;

    let checkpointed = svc
        .execute(
            "tc".to_string(),
            Params::Checkpoint(checkpoint_params(&loop_id, "s1")),
        )
        .await;
    match checkpointed {
        Envelope::Checkpointed {
            can_continue,
            loop_view,
            ..
        } => {
            assert!(can_continue);
            assert_eq!(loop_view.current_round, 1);
        }
        other => panic!("expected Checkpointed, got {other:?}"),
    }

    let continued = svc
        .execute(
            "tc".to_string(),
            Params::Continue(ContinueParams {
                loop_id: loop_id.clone(),
                reason: None,
            }),
        )
        .await;
    match continued {
        Envelope::Continued { loop_view, .. } => assert_eq!(loop_view.current_round, 2),
        other => panic!("expected Continued, got {other:?}"),
    }

    let checkpointed_2 = svc
        .execute(
            "tc".to_string(),
            Params::Checkpoint(checkpoint_params(&loop_id, "s2")),
        )
        .await;
    match checkpointed_2 {
        Envelope::Checkpointed { can_continue, .. } => assert!(!can_continue),
        other => panic!("expected Checkpointed, got {other:?}"),
    }

    let continue_again = svc
        .execute(
            "tc".to_string(),
            Params::Continue(ContinueParams {
                loop_id: loop_id.clone(),
                reason: None,
            }),
        )
        .await;
    match continue_again {
        Envelope::Error { error, .. } => assert!(error.contains("max rounds reached (2)")),
        other => panic!("expected Error, got {other:?}"),
    }

    let closed = svc
        .execute(
            "tc".to_string(),
            Params::Close(CloseParams {
                loop_id: loop_id.clone(),
                reason: Some("done".to_string()),
            }),
        )
        .await;
    match closed {
        Envelope::Closed { loop_view, .. } => {
            assert_eq!(format!("{:?}", loop_view.state), "Closed")
        }
        other => panic!("expected Closed, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_2_hot_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(&dir.path().join("loops.json"), "sess-1");

    let inputs = [(5.0, 5.0), (3.0, 3.0), (1.0, 4.0)];
    for (importance, urgency) in inputs {
        let loop_id = start(&svc, "topic", None).await;
        let mut params = checkpoint_params(&loop_id, &"x".repeat(40));
        params.importance = Some(importance);
        params.urgency = Some(urgency);
        svc.execute("tc".to_string(), Params::Checkpoint(params)).await;
    }

    let listed = svc
        .execute(
            "tc".to_string(),
            Params::List(ListParams {
                state: None,
                view: Some(ListView::Hot),
                stale_hours: None,
                limit: None,
            }),
        )
        .await;
    match listed {
        Envelope::Ok {
            payload: OkPayload::List { loops },
            ..
        } => {
            let scores: Vec<Option<u32>> = loops.iter().map(|l| l.last_priority_score).collect();
            assert_eq!(scores, vec![Some(25), Some(9), Some(4)]);
        }
        other => panic!("expected Ok(List), got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_3_agent_isolation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loops.json");
    let alpha = service(&path, "sess-alpha");
    let beta = service(&path, "sess-beta");

    let loop_id = start(&alpha, "alpha's topic", None).await;

    let status = beta
        .execute(
            "tc".to_string(),
            Params::Status(StatusParams {
                loop_id: loop_id.clone(),
            }),
        )
        .await;
    match status {
        Envelope::Error { error, .. } => assert!(error.contains("not accessible")),
        other => panic!("expected Error, got {other:?}"),
    }

    let beta_list = beta
        .execute("tc".to_string(), Params::List(ListParams::default()))
        .await;
    match beta_list {
        Envelope::Ok {
            payload: OkPayload::List { loops },
            ..
        } => assert!(loops.iter().all(|l| l.loop_id != loop_id)),
        other => panic!("expected Ok(List), got {other:?}"),
    }

    let alpha_list = alpha
        .execute("tc".to_string(), Params::List(ListParams::default()))
        .await;
    match alpha_list {
        Envelope::Ok {
            payload: OkPayload::List { loops },
            ..
        } => assert!(loops.iter().any(|l| l.loop_id == loop_id)),
        other => panic!("expected Ok(List), got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_4_needs_review() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(&dir.path().join("loops.json"), "sess-1");

    let weak_loop = start(&svc, "weak", None).await;
    let mut weak_params = checkpoint_params(&weak_loop, "short");
    weak_params.recommendation = Some(Recommendation::NeedsInput);
    svc.execute("tc".to_string(), Params::Checkpoint(weak_params)).await;

    let strong_loop = start(&svc, "strong", None).await;
    let mut strong_params = checkpoint_params(&strong_loop, &"a".repeat(200));
    strong_params.critique = Some("thorough critique of the evidence".to_string());
    strong_params.citation_links = vec!["c1".into(), "c2".into(), "c3".into()];
    strong_params.recommendation = Some(Recommendation::NeedsInput);
    svc.execute("tc".to_string(), Params::Checkpoint(strong_params))
        .await;

    let listed = svc
        .execute(
            "tc".to_string(),
            Params::List(ListParams {
                state: None,
                view: Some(ListView::NeedsReview),
                stale_hours: None,
                limit: None,
            }),
        )
        .await;
    match listed {
        Envelope::Ok {
            payload: OkPayload::List { loops },
            ..
        } => {
            assert!(loops.iter().any(|l| l.loop_id == weak_loop));
            assert!(loops.iter().all(|l| l.loop_id != strong_loop));
        }
        other => panic!("expected Ok(List), got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_5_spawn_advice() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(&dir.path().join("loops.json"), "sess-1");

    let loop_id = start(&svc, "topic", Some(3.0)).await;
    let mut params = checkpoint_params(&loop_id, &"a".repeat(60));
    params.importance = Some(5.0);
    params.urgency = Some(5.0);
    params.confidence = Some(3.0);
    params.evidence_quality = Some(4.0);
    params.critique = Some("critique".to_string());
    params.counterpoints = vec!["c1".into(), "c2".into()];
    params.citation_links = vec!["l1".into(), "l2".into()];
    params.proposed_tasks = vec!["delegate-me".into(), "second".into()];

    let checkpointed = svc
        .execute("tc".to_string(), Params::Checkpoint(params.clone()))
        .await;
    match checkpointed {
        Envelope::Checkpointed {
            can_continue,
            spawn_advice,
            ..
        } => {
            assert!(can_continue);
            assert!(spawn_advice.should_spawn);
            assert_eq!(spawn_advice.suggested_task, Some("delegate-me".to_string()));
        }
        other => panic!("expected Checkpointed, got {other:?}"),
    }

    // Same inputs but high confidence disables the advice.
    let loop_id_2 = start(&svc, "topic-2", Some(3.0)).await;
    let mut params_2 = params;
    params_2.loop_id = loop_id_2;
    params_2.confidence = Some(4.0);
    let checkpointed_2 = svc.execute("tc".to_string(), Params::Checkpoint(params_2)).await;
    match checkpointed_2 {
        Envelope::Checkpointed { spawn_advice, .. } => {
            assert!(!spawn_advice.should_spawn);
            assert!(spawn_advice.reason.contains("confidence"));
        }
        other => panic!("expected Checkpointed, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_6_stress_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(&dir.path().join("loops.json"), "sess-1");

    for i in 0..40 {
        let loop_id = start(&svc, &format!("topic-{i}"), None).await;
        let mut params = checkpoint_params(&loop_id, &"a".repeat(40));
        params.recommendation = Some(Recommendation::NeedsInput);
        params.importance = Some(((i % 5) + 1) as f64);
        params.urgency = Some((((i + 2) % 5) + 1) as f64);
        svc.execute("tc".to_string(), Params::Checkpoint(params)).await;
    }

    let needs_decision = svc
        .execute(
            "tc".to_string(),
            Params::List(ListParams {
                state: None,
                view: Some(ListView::NeedsDecision),
                stale_hours: None,
                limit: Some(100),
            }),
        )
        .await;
    let entries = match needs_decision {
        Envelope::Ok {
            payload: OkPayload::List { loops },
            ..
        } => loops,
        other => panic!("expected Ok(List), got {other:?}"),
    };
    assert_eq!(entries.len(), 40);
    assert!(entries
        .iter()
        .all(|l| format!("{:?}", l.state) == "AwaitingDecision"));

    let hot = svc
        .execute(
            "tc".to_string(),
            Params::List(ListParams {
                state: None,
                view: Some(ListView::Hot),
                stale_hours: None,
                limit: Some(100),
            }),
        )
        .await;
    match hot {
        Envelope::Ok {
            payload: OkPayload::List { loops },
            ..
        } => {
            let scores: Vec<u32> = loops
                .iter()
                .map(|l| l.last_priority_score.unwrap_or(0))
                .collect();
            let mut sorted = scores.clone();
            sorted.sort_by(|a, b| b.cmp(a));
            assert_eq!(scores, sorted);
        }
        other => panic!("expected Ok(List), got {other:?}"),
    }
}

#[tokio::test]
async fn round_trip_after_reload_matches_in_memory_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loops.json");
    let svc = service(&path, "sess-1");

    let loop_id = start(&svc, "reload me", Some(4.0)).await;
    svc.execute(
        "tc".to_string(),
        Params::Checkpoint(checkpoint_params(&loop_id, &"a".repeat(50))),
    )
    .await;

    // A freshly constructed service re-reads the same store path from disk.
    let reloaded = service(&path, "sess-1");
    let status = reloaded
        .execute(
            "tc".to_string(),
            Params::Status(StatusParams {
                loop_id: loop_id.clone(),
            }),
        )
        .await;
    match status {
        Envelope::Ok {
            payload: OkPayload::Loop { loop_view },
            ..
        } => {
            assert_eq!(loop_view.loop_id, loop_id);
            assert_eq!(loop_view.checkpoints.len(), 1);
            assert_eq!(format!("{:?}", loop_view.state), "AwaitingDecision");
        }
        other => panic!("expected Ok(Loop), got {other:?}"),
    }
}

#[tokio::test]
async fn state_machine_rejects_operations_from_the_wrong_state() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(&dir.path().join("loops.json"), "sess-1");

    let loop_id = start(&svc, "topic", Some(2.0)).await;

    // active: continue is rejected.
    let continue_while_active = svc
        .execute(
            "tc".to_string(),
            Params::Continue(ContinueParams {
                loop_id: loop_id.clone(),
                reason: None,
            }),
        )
        .await;
    assert!(matches!(continue_while_active, Envelope::Error { .. }));

    svc.execute(
        "tc".to_string(),
        Params::Checkpoint(checkpoint_params(&loop_id, &"a".repeat(30))),
    )
    .await;

    // awaiting_decision: checkpoint is rejected.
    let checkpoint_while_awaiting = svc
        .execute(
            "tc".to_string(),
            Params::Checkpoint(checkpoint_params(&loop_id, &"a".repeat(30))),
        )
        .await;
    match checkpoint_while_awaiting {
        Envelope::Error { error, .. } => assert!(error.contains("must be active")),
        other => panic!("expected Error, got {other:?}"),
    }

    svc.execute(
        "tc".to_string(),
        Params::Close(CloseParams {
            loop_id: loop_id.clone(),
            reason: Some("wrapping up".to_string()),
        }),
    )
    .await;

    // closed: close is idempotent, continue is rejected.
    let close_again = svc
        .execute(
            "tc".to_string(),
            Params::Close(CloseParams {
                loop_id: loop_id.clone(),
                reason: Some("again".to_string()),
            }),
        )
        .await;
    assert!(matches!(close_again, Envelope::Closed { .. }));

    let continue_after_close = svc
        .execute(
            "tc".to_string(),
            Params::Continue(ContinueParams {
                loop_id: loop_id.clone(),
                reason: None,
            }),
        )
        .await;
    assert!(matches!(continue_after_close, Envelope::Error { .. }));
}

#[tokio::test]
async fn concurrent_starts_from_same_agent_never_drop_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loops.json");
    let svc = Arc::new(service(&path, "sess-1"));

    let mut handles = Vec::new();
    for i in 0..16 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.execute(
                format!("tc-{i}"),
                Params::Start(StartParams {
                    topic: format!("topic-{i}"),
                    priority: Some(Priority::Normal),
                    max_rounds: None,
                }),
            )
            .await
        }));
    }
    for h in handles {
        assert!(matches!(h.await.unwrap(), Envelope::Started { .. }));
    }

    let listed = svc
        .execute(
            "tc-final".to_string(),
            Params::List(ListParams {
                state: None,
                view: None,
                stale_hours: None,
                limit: Some(100),
            }),
        )
        .await;
    match listed {
        Envelope::Ok {
            payload: OkPayload::List { loops },
            ..
        } => assert_eq!(loops.len(), 16),
        other => panic!("expected Ok(List), got {other:?}"),
    }
}
