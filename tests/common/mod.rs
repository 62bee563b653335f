#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};

use mathtutor_backend::auth;
use mathtutor_backend::config::Config;
use mathtutor_backend::db::operations::curriculum;
use mathtutor_backend::db::operations::problems::{self, ProblemRecord, SolutionStepRecord};
use mathtutor_backend::db::Database;
use mathtutor_backend::seed::{self, CurriculumSeed};
use mathtutor_backend::services::accounts::{self, RegisterInput};
use mathtutor_backend::services::llm_provider::{LLMConfig, LLMProvider};
use mathtutor_backend::state::AppState;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const TEST_PASSWORD: &str = "Secret123!";

pub const SAMPLE_CURRICULUM: &str = r#"{
    "chapters": [
        {
            "id": "ch-7",
            "name": "Equations",
            "gradeLevel": 7,
            "requirements": [
                {
                    "id": "VII.2",
                    "description": "Solves first-degree equations with one unknown",
                    "goals": [
                        {"id": "g-lin", "description": "Use algebraic methods to solve equations"},
                        {"id": "g-check", "description": "Verify a solution by substitution"}
                    ]
                },
                {
                    "id": "VII.3",
                    "description": "Transforms algebraic expressions",
                    "goals": [
                        {"id": "g-lin", "description": "Use algebraic methods to solve equations"},
                        {"id": "g-expr", "description": "Simplify algebraic expressions"}
                    ]
                }
            ]
        },
        {
            "id": "ch-8",
            "name": "Geometry",
            "gradeLevel": 8,
            "requirements": [
                {
                    "id": "VIII.1",
                    "description": "Computes areas of plane figures",
                    "goals": [{"id": "g-area", "description": "Compute the area of a circle"}]
                }
            ]
        }
    ]
}"#;

pub async fn test_db() -> Database {
    Database::in_memory().await.unwrap()
}

pub async fn seeded_db() -> Database {
    let db = test_db().await;
    let curriculum: CurriculumSeed = seed::parse_seed(SAMPLE_CURRICULUM).unwrap();
    seed::seed_curriculum(&db, &curriculum).await.unwrap();
    db
}

pub fn test_config() -> Config {
    Config {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        log_level: "warn".to_string(),
        enable_file_logs: false,
        log_dir: std::env::temp_dir(),
        database_url: "sqlite::memory:".to_string(),
        database_max_connections: 1,
        jwt_secret: Some(JWT_SECRET.to_string()),
        jwt_expires_in: "60m".to_string(),
        bcrypt_cost: 4,
        curriculum_seed_path: None,
    }
}

pub fn llm_at(endpoint: &str) -> LLMProvider {
    LLMProvider::new(LLMConfig {
        api_key: Some("test-key".to_string()),
        model: "mock-model".to_string(),
        api_endpoint: endpoint.to_string(),
        timeout: Duration::from_secs(5),
        max_retries: 0,
    })
}

/// Provider without credentials; every call fails before touching the network.
pub fn offline_llm() -> LLMProvider {
    LLMProvider::new(LLMConfig {
        api_key: None,
        model: "mock-model".to_string(),
        api_endpoint: "http://127.0.0.1:9/v1".to_string(),
        timeout: Duration::from_secs(1),
        max_retries: 0,
    })
}

pub fn test_state(db: Database, llm: LLMProvider) -> AppState {
    AppState::new(db, llm, test_config())
}

pub fn test_app(db: Database, llm: LLMProvider) -> Router {
    mathtutor_backend::create_app(test_state(db, llm))
}

pub struct MockLlm {
    pub endpoint: String,
    pub calls: Arc<AtomicUsize>,
}

/// Serves `/v1/chat/completions` on an ephemeral port. The responder sees the system and
/// user prompts; `None` answers HTTP 500.
pub async fn spawn_mock_llm<F>(responder: F) -> MockLlm
where
    F: Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
{
    let responder = Arc::new(responder);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let handler = move |Json(body): Json<Value>| {
        let responder = Arc::clone(&responder);
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let system = body["messages"][0]["content"].as_str().unwrap_or_default();
            let user = body["messages"][1]["content"].as_str().unwrap_or_default();
            match (*responder)(system, user) {
                Some(content) => (
                    StatusCode::OK,
                    Json(json!({
                        "model": "mock-model",
                        "choices": [{"message": {"role": "assistant", "content": content}}]
                    })),
                ),
                None => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "mock failure"})),
                ),
            }
        }
    };

    let app = Router::new().route("/v1/chat/completions", post(handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockLlm {
        endpoint: format!("http://{addr}/v1"),
        calls,
    }
}

pub fn is_matching_prompt(system: &str) -> bool {
    system.contains("curriculum expert")
}

pub async fn create_user(db: &Database, username: &str) -> (String, String) {
    let user = accounts::register(
        db,
        RegisterInput {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: TEST_PASSWORD.to_string(),
            grade_level: Some(7),
        },
        4,
    )
    .await
    .unwrap();
    let (token, _) = auth::sign_jwt_for_user(&user.id, JWT_SECRET, "60m").unwrap();
    (user.id, token)
}

/// Stores a problem whose steps are linked to the given goals; returns the step ids.
pub async fn insert_problem(
    db: &Database,
    problem_id: &str,
    owner: Option<&str>,
    step_goals: &[&[&str]],
) -> Vec<String> {
    let mut tx = db.pool().begin().await.unwrap();
    problems::insert_problem(
        &mut tx,
        &ProblemRecord {
            id: problem_id.to_string(),
            text: format!("Problem {problem_id}"),
            subject_area: Some("Algebra".to_string()),
            grade_level: Some(7),
            user_id: owner.map(str::to_string),
            created_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let mut step_ids = Vec::new();
    for (index, goals) in step_goals.iter().enumerate() {
        let step_id = format!("{problem_id}-s{}", index + 1);
        problems::insert_step(
            &mut tx,
            &SolutionStepRecord {
                id: step_id.clone(),
                problem_id: Some(problem_id.to_string()),
                step_number: index as i64 + 1,
                description: format!("step {}", index + 1),
                hint: String::new(),
                solution: String::new(),
                user_solved: false,
                solved_with_hint: None,
            },
        )
        .await
        .unwrap();
        for goal_id in goals.iter() {
            curriculum::upsert_goal(&mut tx, goal_id, &format!("goal {goal_id}"))
                .await
                .unwrap();
            problems::link_step_goal(&mut tx, &step_id, goal_id).await.unwrap();
        }
        step_ids.push(step_id);
    }
    tx.commit().await.unwrap();
    step_ids
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn send_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
