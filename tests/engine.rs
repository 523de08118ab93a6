// tests/engine.rs
//! End-to-end tests over the scheduler, router, port pool, and analytics.
//!
//! The persistent path runs against a real local HTTP server; the dynamic
//! path substitutes a scripted worker lifecycle so no worker binaries are
//! required.

use agenthub_engine::executor::{
    AnalyticsAggregator, ExecutionRouter, Scheduler, SchedulerConfig, TaskStatus, TaskStore,
};
use agenthub_engine::registry::{
    AgentDescriptor, AgentRegistry, AgentState, Deployment, InMemoryRegistry, RouteSpec,
    WorkerArchetype, WorkerConfig,
};
use agenthub_engine::runtime::{PortAllocator, ResourceLimits, WorkerHandle, WorkerLifecycle};
use agenthub_engine::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Local HTTP agent server for the persistent path

async fn handle(req: Request<Incoming>) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };

    let response = match path.as_str() {
        "/translate" => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(format!(
                "{{\"echo\":{}}}",
                String::from_utf8_lossy(&body)
            ))))
            .unwrap(),
        "/fail" => Response::builder()
            .status(StatusCode::BAD_GATEWAY)
            .body(Full::new(Bytes::from_static(b"upstream exploded")))
            .unwrap(),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Response::new(Full::new(Bytes::from_static(b"\"late\"")))
        }
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from_static(b"no such route")))
            .unwrap(),
    };

    Ok(response)
}

async fn spawn_agent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service_fn(handle))
                    .await;
            });
        }
    });

    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Scripted worker lifecycle for the dynamic path

enum Script {
    Respond(Value, Duration),
    Hang,
}

struct ScriptedWorkers {
    script: Script,
    spawned: AtomicUsize,
    terminated: AtomicUsize,
}

impl ScriptedWorkers {
    fn new(script: Script) -> Self {
        Self {
            script,
            spawned: AtomicUsize::new(0),
            terminated: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WorkerLifecycle for ScriptedWorkers {
    async fn spawn(&self, _agent_id: &str, _config: &WorkerConfig, port: u16) -> Result<WorkerHandle> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(WorkerHandle {
            pid: None,
            port,
            url: format!("http://127.0.0.1:{port}"),
            child: None,
            spawned_at: Instant::now(),
        })
    }

    async fn send(&self, _handle: &WorkerHandle, payload: &Value) -> Result<Value> {
        match &self.script {
            Script::Respond(value, delay) => {
                tokio::time::sleep(*delay).await;
                let mut response = value.clone();
                if let Value::Object(ref mut map) = response {
                    map.insert("input".to_string(), payload.clone());
                }
                Ok(response)
            }
            Script::Hang => {
                futures::future::pending::<()>().await;
                Err(EngineError::Comm("unreachable".to_string()))
            }
        }
    }

    async fn terminate(&self, _handle: WorkerHandle) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Harness

fn persistent_agent(id: &str, base_url: &str) -> AgentDescriptor {
    AgentDescriptor {
        id: id.to_string(),
        name: format!("agent {id}"),
        description: "test persistent agent".to_string(),
        deployment: Deployment::Persistent {
            base_url: base_url.to_string(),
            routes: vec![RouteSpec {
                path: "/translate".to_string(),
                method: "POST".to_string(),
                description: String::new(),
            }],
        },
        status: AgentState::Active,
        last_seen: Utc::now(),
    }
}

fn dynamic_agent(id: &str) -> AgentDescriptor {
    AgentDescriptor {
        id: id.to_string(),
        name: format!("agent {id}"),
        description: "test dynamic agent".to_string(),
        deployment: Deployment::Dynamic(WorkerConfig {
            archetype: WorkerArchetype::Llm,
            model_id: "openai/gpt-4".to_string(),
            tools: vec!["search".to_string()],
            system_prompt: Some("You are helpful.".to_string()),
            limits: ResourceLimits::default(),
        }),
        status: AgentState::Active,
        last_seen: Utc::now(),
    }
}

struct Engine {
    scheduler: Scheduler,
    store: Arc<TaskStore>,
    ports: PortAllocator,
    workers: Arc<ScriptedWorkers>,
}

fn engine(script: Script, pool: (u16, u16), registry: Arc<InMemoryRegistry>) -> Engine {
    let store = Arc::new(TaskStore::new());
    let ports = PortAllocator::new(pool.0, pool.1);
    let workers = Arc::new(ScriptedWorkers::new(script));

    let router = Arc::new(ExecutionRouter::new(
        Arc::clone(&store),
        Arc::clone(&registry) as Arc<dyn AgentRegistry>,
        ports.clone(),
        Arc::clone(&workers) as Arc<dyn WorkerLifecycle>,
    ));

    let scheduler = Scheduler::new(
        Arc::clone(&store),
        registry as Arc<dyn AgentRegistry>,
        router,
        SchedulerConfig {
            queue_depth: 32,
            dynamic_concurrency: ports.capacity(),
            persistent_concurrency: 8,
            default_timeout_ms: 5000,
        },
    );

    Engine {
        scheduler,
        store,
        ports,
        workers,
    }
}

async fn wait_terminal(scheduler: &Scheduler, task_id: &str) -> TaskStatus {
    for _ in 0..300 {
        let record = scheduler.status(task_id).unwrap();
        if record.status.is_terminal() {
            return record.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} never reached a terminal state");
}

// ---------------------------------------------------------------------------
// Persistent path

#[tokio::test]
async fn persistent_agent_task_completes_with_response_body() {
    let base_url = spawn_agent_server().await;
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(persistent_agent("translator", &base_url));

    let e = engine(Script::Hang, (9100, 9101), registry);

    let task_id = e
        .scheduler
        .submit("translator", "/translate", json!({"text": "bonjour"}), Some(2000))
        .await
        .unwrap();

    assert_eq!(wait_terminal(&e.scheduler, &task_id).await, TaskStatus::Completed);

    let record = e.scheduler.status(&task_id).unwrap();
    let result = record.result.unwrap();
    assert_eq!(result["echo"]["text"], "bonjour");
    assert!(record.started_at.unwrap() <= record.finished_at.unwrap());

    // Persistent execution never touches the port pool
    assert_eq!(e.ports.available(), 2);
    assert_eq!(e.workers.spawned.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn persistent_agent_upstream_error_fails_task() {
    let base_url = spawn_agent_server().await;
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(persistent_agent("flaky", &base_url));

    let e = engine(Script::Hang, (9102, 9102), registry);

    let task_id = e
        .scheduler
        .submit("flaky", "/fail", json!({}), Some(2000))
        .await
        .unwrap();

    assert_eq!(wait_terminal(&e.scheduler, &task_id).await, TaskStatus::Failed);

    let record = e.scheduler.status(&task_id).unwrap();
    let error = record.error.unwrap();
    assert!(error.detail.contains("502"), "{}", error.detail);
    assert!(error.detail.contains("upstream exploded"), "{}", error.detail);
}

#[tokio::test]
async fn persistent_agent_stalled_upstream_times_out() {
    let base_url = spawn_agent_server().await;
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(persistent_agent("sloth", &base_url));

    let e = engine(Script::Hang, (9103, 9103), registry);

    let task_id = e
        .scheduler
        .submit("sloth", "/slow", json!({}), Some(150))
        .await
        .unwrap();

    assert_eq!(wait_terminal(&e.scheduler, &task_id).await, TaskStatus::TimedOut);

    let record = e.scheduler.status(&task_id).unwrap();
    assert!(record.result.is_none());
    assert!(record.error.is_none());
    // finished - started respects the declared deadline plus overhead
    let elapsed = (record.finished_at.unwrap() - record.started_at.unwrap())
        .num_milliseconds();
    assert!(elapsed >= 150 && elapsed < 2000, "elapsed {elapsed}ms");
}

// ---------------------------------------------------------------------------
// Dynamic path

#[tokio::test]
async fn dynamic_agent_task_completes_and_port_is_reusable() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(dynamic_agent("summarizer"));

    let e = engine(
        Script::Respond(json!({"summary": "short"}), Duration::from_millis(20)),
        (9200, 9200),
        registry,
    );

    let first = e
        .scheduler
        .submit("summarizer", "/run", json!({"doc": "long text"}), Some(2000))
        .await
        .unwrap();
    assert_eq!(wait_terminal(&e.scheduler, &first).await, TaskStatus::Completed);

    // The single port came back and the next task can lease it
    assert_eq!(e.ports.available(), 1);

    let second = e
        .scheduler
        .submit("summarizer", "/run", json!({"doc": "more"}), Some(2000))
        .await
        .unwrap();
    assert_eq!(wait_terminal(&e.scheduler, &second).await, TaskStatus::Completed);

    assert_eq!(e.workers.spawned.load(Ordering::SeqCst), 2);
    assert_eq!(e.workers.terminated.load(Ordering::SeqCst), 2);
    assert_eq!(e.ports.available(), 1);
}

#[tokio::test]
async fn dynamic_agent_hung_worker_times_out_and_frees_port() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(dynamic_agent("stuck"));

    let e = engine(Script::Hang, (9201, 9201), registry);

    let submitted = Instant::now();
    let task_id = e
        .scheduler
        .submit("stuck", "/run", json!({}), Some(50))
        .await
        .unwrap();

    assert_eq!(wait_terminal(&e.scheduler, &task_id).await, TaskStatus::TimedOut);
    assert!(
        submitted.elapsed() < Duration::from_secs(2),
        "timeout took {:?}",
        submitted.elapsed()
    );

    // Worker reaped, port back in the pool
    assert_eq!(e.workers.terminated.load(Ordering::SeqCst), 1);
    assert_eq!(e.ports.available(), 1);
}

#[tokio::test]
async fn ghost_agent_fails_without_consuming_resources() {
    let registry = Arc::new(InMemoryRegistry::new());
    let e = engine(Script::Hang, (9202, 9203), registry);

    let task_id = e
        .scheduler
        .submit("ghost-1", "/run", json!({}), Some(1000))
        .await
        .unwrap();

    assert_eq!(wait_terminal(&e.scheduler, &task_id).await, TaskStatus::Failed);

    let record = e.scheduler.status(&task_id).unwrap();
    assert_eq!(
        record.error.unwrap().kind,
        agenthub_engine::executor::TaskErrorKind::UnknownAgent
    );
    assert_eq!(e.ports.available(), 2);
    assert_eq!(e.workers.spawned.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn three_tasks_against_pool_of_one_all_settle() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(dynamic_agent("busy"));

    let e = engine(
        Script::Respond(json!({"ok": true}), Duration::from_millis(30)),
        (9204, 9204),
        registry,
    );

    let mut ids = vec![];
    for _ in 0..3 {
        ids.push(
            e.scheduler
                .submit("busy", "/run", json!({}), Some(3000))
                .await
                .unwrap(),
        );
    }

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3, "duplicate task ids");

    for id in &ids {
        assert_eq!(wait_terminal(&e.scheduler, id).await, TaskStatus::Completed);
    }

    assert_eq!(e.ports.available(), 1);
}

// ---------------------------------------------------------------------------
// Analytics over executed tasks

#[tokio::test]
async fn analytics_reflect_executed_tasks() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(dynamic_agent("scored"));

    let e = engine(
        Script::Respond(json!({"ok": true}), Duration::from_millis(5)),
        (9205, 9206),
        registry,
    );

    for _ in 0..4 {
        let id = e
            .scheduler
            .submit("scored", "/run", json!({}), Some(2000))
            .await
            .unwrap();
        wait_terminal(&e.scheduler, &id).await;
    }
    // One failure from an unknown agent does not pollute this agent
    let ghost = e
        .scheduler
        .submit("ghost-1", "/run", json!({}), Some(500))
        .await
        .unwrap();
    wait_terminal(&e.scheduler, &ghost).await;

    let aggregator = AnalyticsAggregator::new(Arc::clone(&e.store));
    let summary = aggregator.summarize("scored", 7);

    assert_eq!(summary.total_tasks, 4);
    assert_eq!(summary.completed_tasks, 4);
    assert_eq!(summary.success_rate, 1.0);
    assert!(summary.reliability_score > 50.0 && summary.reliability_score < 100.0);
    assert_eq!(summary.daily.len(), 1);

    let empty = aggregator.summarize("never-used", 7);
    assert_eq!(empty.total_tasks, 0);
    assert_eq!(empty.reliability_score, 50.0);
}
