//! Team orchestration scenarios
//!
//! Supervisor routing over nested teams, suspension inside a nested member,
//! flow-level pauses, and checkpoint/resume of the whole tree.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use agentloop::hitl::{Decision, Hitl, HitlGate, MemoryPendingTaskStore, PauseBefore, PendingTaskStore};
use agentloop::session::{AgentSession, InMemorySession, Snapshot};
use agentloop::testing::{FnTool, ScriptedModel};
use agentloop::trace::{SuspensionKind, TraceStatus};
use agentloop::types::{Message, ToolCall};
use agentloop::{Agent, ReActAgent, Team};
use serde_json::json;

struct Scripts {
    org: Vec<Message>,
    release: Vec<Message>,
    deployer: Vec<Message>,
    writer: Vec<Message>,
}

struct Org {
    team: Team,
    release_supervisor: Arc<ScriptedModel>,
    writer_model: Arc<ScriptedModel>,
    deploys: Arc<AtomicUsize>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn say(text: &str) -> Message {
    Message::assistant(text)
}

/// org -> [release -> [deployer], writer]; every deploy needs approval.
fn org(scripts: Scripts, store: Arc<dyn PendingTaskStore>) -> Org {
    let deploy = FnTool::new("deploy", |args| {
        Ok(format!("deployed {}", args["version"].as_str().unwrap_or("?")).into())
    });
    let deploys = deploy.call_counter();
    let deployer = ReActAgent::builder("deployer")
        .description("Deploys releases")
        .model(Arc::new(ScriptedModel::new(scripts.deployer)))
        .tool(deploy)
        .gate(HitlGate::new(store.clone()).always("deploy", "production deploy"))
        .build()
        .unwrap();

    let release_supervisor = Arc::new(ScriptedModel::new(scripts.release));
    let release = Team::builder("release")
        .description("Runs a release")
        .supervisor(release_supervisor.clone())
        .member(Arc::new(deployer))
        .pending_store(store.clone())
        .build()
        .unwrap();

    let writer_model = Arc::new(ScriptedModel::new(scripts.writer));
    let writer = ReActAgent::builder("writer")
        .description("Writes release notes")
        .model(writer_model.clone())
        .build()
        .unwrap();

    let team = Team::builder("org")
        .supervisor(Arc::new(ScriptedModel::new(scripts.org)))
        .member(Arc::new(release))
        .member(Arc::new(writer))
        .pending_store(store)
        .build()
        .unwrap();

    Org {
        team,
        release_supervisor,
        writer_model,
        deploys,
    }
}

fn first_leg() -> Scripts {
    Scripts {
        org: vec![say("release")],
        release: vec![say("deployer")],
        deployer: vec![Message::assistant_with_tools(
            "",
            vec![ToolCall::new("d1", "deploy", json!({"version": "v2"}))],
        )],
        writer: vec![],
    }
}

fn second_leg() -> Scripts {
    Scripts {
        org: vec![say("writer"), say("[FINISH] v2 shipped with notes")],
        release: vec![say("[FINISH] release done")],
        deployer: vec![say("[FINISH] deployed v2")],
        writer: vec![say("[FINISH] notes written")],
    }
}

mod nested_team_tests {
    use super::*;

    #[tokio::test]
    async fn test_nested_suspension_surfaces_at_top() {
        init_tracing();
        let store: Arc<dyn PendingTaskStore> = Arc::new(MemoryPendingTaskStore::new());
        let org = org(first_leg(), store.clone());
        let session = InMemorySession::new("s1");

        let outcome = org.team.call(Some("Ship v2"), &session).await.unwrap();

        assert!(outcome.is_pending());
        assert_eq!(outcome.pending.unwrap().tool_name, "deploy");
        assert_eq!(org.deploys.load(Ordering::SeqCst), 0);
        assert_eq!(Hitl::new(store).pending_task("s1").unwrap().tool_name, "deploy");

        let snapshot = session.snapshot().await;
        let top = snapshot.trace("org").unwrap();
        assert!(matches!(
            &top.suspension.as_ref().unwrap().kind,
            SuspensionKind::Member { name } if name == "release"
        ));
        assert_eq!(top.route.as_deref(), Some("release"));
        assert!(snapshot.trace("release").unwrap().is_pending());
        assert!(snapshot.trace("deployer").unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_full_run_after_approval() {
        let store: Arc<dyn PendingTaskStore> = Arc::new(MemoryPendingTaskStore::new());
        let session = InMemorySession::new("s1");
        org(first_leg(), store.clone())
            .team
            .call(Some("Ship v2"), &session)
            .await
            .unwrap();

        Hitl::new(store.clone())
            .submit(&session, "deploy", Decision::approve())
            .await
            .unwrap();

        let org = org(second_leg(), store);
        let outcome = org.team.call(None, &session).await.unwrap();

        assert!(outcome.is_finished());
        assert_eq!(outcome.text(), "v2 shipped with notes");
        assert_eq!(org.deploys.load(Ordering::SeqCst), 1);
        assert_eq!(org.release_supervisor.call_count(), 1);
        assert_eq!(org.writer_model.call_count(), 1);

        let transcript = org.team.transcript(&session).await;
        assert!(transcript.contains("[release] release done"));
        assert!(transcript.contains("[writer] notes written"));

        let writer_task = &org.writer_model.requests()[0];
        assert!(writer_task.iter().any(|m| m.content.contains("[release] release done")));
    }

    #[tokio::test]
    async fn test_round_trip_resume_matches_in_memory_resume() {
        init_tracing();
        let store: Arc<dyn PendingTaskStore> = Arc::new(MemoryPendingTaskStore::new());
        let original = InMemorySession::new("s1");
        org(first_leg(), store.clone())
            .team
            .call(Some("Ship v2"), &original)
            .await
            .unwrap();

        let opaque = original.snapshot().await.to_opaque().unwrap();
        let restored = InMemorySession::from_snapshot("s1", Snapshot::from_opaque(&opaque).unwrap());

        let restored_store: Arc<dyn PendingTaskStore> = Arc::new(MemoryPendingTaskStore::new());
        let restored_hitl = Hitl::new(restored_store.clone());
        assert_eq!(restored_hitl.restore(&restored).await, 1);
        assert_eq!(restored_hitl.pending_task("s1").unwrap().tool_name, "deploy");

        Hitl::new(store.clone())
            .submit(&original, "deploy", Decision::approve())
            .await
            .unwrap();
        restored_hitl
            .submit(&restored, "deploy", Decision::approve())
            .await
            .unwrap();

        let a = org(second_leg(), store);
        let b = org(second_leg(), restored_store);
        let outcome_a = a.team.call(None, &original).await.unwrap();
        let outcome_b = b.team.call(None, &restored).await.unwrap();

        assert_eq!(outcome_a.text(), outcome_b.text());
        assert_eq!(a.deploys.load(Ordering::SeqCst), 1);
        assert_eq!(b.deploys.load(Ordering::SeqCst), 1);
        assert_eq!(
            a.team.transcript(&original).await,
            b.team.transcript(&restored).await
        );
        assert_eq!(
            original.load_trace("deployer").await.unwrap(),
            restored.load_trace("deployer").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_new_prompt_abandons_suspended_member_chain() {
        let store: Arc<dyn PendingTaskStore> = Arc::new(MemoryPendingTaskStore::new());
        let session = InMemorySession::new("s1");
        org(first_leg(), store.clone())
            .team
            .call(Some("Ship v2"), &session)
            .await
            .unwrap();
        assert!(Hitl::new(store.clone()).pending_task("s1").is_some());

        let next = org(
            Scripts {
                org: vec![say("[FINISH] nothing to ship")],
                release: vec![],
                deployer: vec![],
                writer: vec![],
            },
            store.clone(),
        );
        let outcome = next.team.call(Some("Status report"), &session).await.unwrap();

        assert!(outcome.is_finished());
        assert_eq!(outcome.text(), "nothing to ship");
        assert_eq!(next.deploys.load(Ordering::SeqCst), 0);

        let hitl = Hitl::new(store);
        assert!(hitl.pending_task("s1").is_none());
        assert_eq!(hitl.restore(&session).await, 0);

        let snapshot = session.snapshot().await;
        for name in ["org", "release", "deployer"] {
            let trace = snapshot.trace(name).unwrap();
            assert!(!trace.is_pending(), "{} still pending", name);
            assert!(trace.suspension.is_none());
        }
    }

    #[tokio::test]
    async fn test_finished_child_is_not_rerun() {
        let store: Arc<dyn PendingTaskStore> = Arc::new(MemoryPendingTaskStore::new());
        let session = InMemorySession::new("s1");
        org(first_leg(), store.clone())
            .team
            .call(Some("Ship v2"), &session)
            .await
            .unwrap();
        Hitl::new(store.clone())
            .submit(&session, "deploy", Decision::approve())
            .await
            .unwrap();
        org(second_leg(), store.clone())
            .team
            .call(None, &session)
            .await
            .unwrap();

        // Rewind the parent to "release is running", as if it stopped right
        // after the child finished.
        let mut snapshot = session.snapshot().await;
        let top = snapshot.trace_mut("org").unwrap();
        top.status = TraceStatus::Running;
        top.final_answer = None;
        top.route = Some("release".into());
        top.records.truncate(1);
        top.iteration_count = 1;
        assert_eq!(top.records[0].content, "Route to release");
        session.update_snapshot(snapshot).await.unwrap();

        let replay = org(
            Scripts {
                org: vec![say("[FINISH] resumed")],
                release: vec![],
                deployer: vec![],
                writer: vec![],
            },
            store,
        );
        let outcome = replay.team.call(None, &session).await.unwrap();

        assert_eq!(outcome.text(), "resumed");
        assert_eq!(replay.release_supervisor.call_count(), 0);
        assert_eq!(replay.deploys.load(Ordering::SeqCst), 0);
        assert!(
            replay
                .team
                .transcript(&session)
                .await
                .ends_with("[supervisor] Finished: resumed")
        );
    }
}

mod flow_tests {
    use super::*;

    fn simple_team(
        supervisor: Vec<Message>,
        writer: Vec<Message>,
        store: Arc<dyn PendingTaskStore>,
    ) -> (Team, Arc<ScriptedModel>) {
        let writer_model = Arc::new(ScriptedModel::new(writer));
        let writer = ReActAgent::builder("writer")
            .model(writer_model.clone())
            .build()
            .unwrap();
        let team = Team::builder("desk")
            .supervisor(Arc::new(ScriptedModel::new(supervisor)))
            .member(Arc::new(writer))
            .flow(PauseBefore::new(["writer"]))
            .pending_store(store)
            .build()
            .unwrap();
        (team, writer_model)
    }

    #[tokio::test]
    async fn test_pause_before_then_approve() {
        let store: Arc<dyn PendingTaskStore> = Arc::new(MemoryPendingTaskStore::new());
        let (team, writer_model) = simple_team(
            vec![say("writer"), say("[FINISH] published")],
            vec![say("[FINISH] draft")],
            store.clone(),
        );
        let session = InMemorySession::new("s1");

        let outcome = team.call(Some("Write a post"), &session).await.unwrap();
        assert!(outcome.is_pending());
        assert_eq!(outcome.pending.unwrap().tool_name, "writer");
        assert_eq!(writer_model.call_count(), 0);

        Hitl::new(store)
            .submit(&session, "writer", Decision::approve())
            .await
            .unwrap();
        let outcome = team.call(None, &session).await.unwrap();

        assert_eq!(outcome.text(), "published");
        assert_eq!(writer_model.call_count(), 1);
        assert_eq!(team.final_answer(&session).await.as_deref(), Some("published"));
    }

    #[tokio::test]
    async fn test_pause_before_then_reject() {
        let store: Arc<dyn PendingTaskStore> = Arc::new(MemoryPendingTaskStore::new());
        let (team, writer_model) = simple_team(
            vec![say("writer"), say("[FINISH] skipped")],
            vec![],
            store.clone(),
        );
        let session = InMemorySession::new("s1");

        team.call(Some("Write a post"), &session).await.unwrap();
        Hitl::new(store)
            .submit(&session, "writer", Decision::reject().with_comment("no posts today"))
            .await
            .unwrap();
        let outcome = team.call(None, &session).await.unwrap();

        assert_eq!(outcome.text(), "skipped");
        assert_eq!(writer_model.call_count(), 0);
        assert!(team.transcript(&session).await.contains("no posts today"));
    }
}
