use axum::http::StatusCode;
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use mathtutor_backend::db::Database;

mod common;

use common::{get, json_body, send_json};

const SOLUTION_REPLY: &str = r#"{"steps": [
    {"step_number": 1, "description": "Subtract 5 from both sides", "hint": "Undo the addition", "solution": "2x = 8"},
    {"step_number": 2, "description": "Divide both sides by 2", "hint": "Isolate x", "solution": "x = 4"}
]}"#;

async fn solving_app(db: Database) -> Router {
    let mock = common::spawn_mock_llm(|system, _| {
        if common::is_matching_prompt(system) {
            Some(r#"{"requirement_ids": ["VII.2"]}"#.to_string())
        } else {
            Some(SOLUTION_REPLY.to_string())
        }
    })
    .await;
    common::test_app(db, common::llm_at(&mock.endpoint))
}

#[tokio::test]
async fn test_health_reports_database() {
    let app = common::test_app(common::test_db().await, common::offline_llm());

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"]["healthy"], true);
    assert_eq!(body["llmConfigured"], false);
}

#[tokio::test]
async fn test_health_live() {
    let app = common::test_app(common::test_db().await, common::offline_llm());

    let response = app.oneshot(get("/health/live", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = common::test_app(common::test_db().await, common::offline_llm());

    let response = app.oneshot(get("/api/v1/nope", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = common::test_app(common::test_db().await, common::offline_llm());

    let response = app
        .clone()
        .oneshot(get("/api/v1/curriculum/chapters", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");

    let response = app
        .oneshot(get("/api/v1/auth/user", Some("not.a.token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_deleted_user_is_rejected() {
    let app = common::test_app(common::test_db().await, common::offline_llm());
    let (token, _) =
        mathtutor_backend::auth::sign_jwt_for_user("ghost", common::JWT_SECRET, "60m").unwrap();

    let response = app.oneshot(get("/api/v1/auth/user", Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = common::test_app(common::test_db().await, common::offline_llm());
    let payload = json!({
        "username": "ola",
        "email": "ola@example.com",
        "password": "Secret123!",
        "gradeLevel": 8
    });

    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/v1/auth/register", None, payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["data"]["username"], "ola");
    assert!(body["data"].get("passwordHash").is_none());

    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/v1/auth/register", None, payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/v1/auth/register",
            None,
            json!({"username": "ela", "email": "ela@example.com", "password": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/v1/auth/login",
            None,
            json!({"username": "ola", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/v1/auth/login",
            None,
            json!({"username": "ola", "password": "Secret123!"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["tokenType"], "bearer");
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();

    let response = app
        .oneshot(get("/api/v1/auth/user", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["username"], "ola");
    assert_eq!(body["data"]["gradeLevel"], 8);
}

#[tokio::test]
async fn test_other_users_progress_is_forbidden() {
    let db = common::test_db().await;
    let (_, token) = common::create_user(&db, "ala").await;
    let (other_id, _) = common::create_user(&db, "ola").await;
    let app = common::test_app(db, common::offline_llm());

    for path in ["", "/recommend", "/history"] {
        let uri = match path {
            "" => format!("/api/v1/progress/{other_id}"),
            prefix => format!("/api/v1/progress{prefix}/{other_id}"),
        };
        let response = app.clone().oneshot(get(&uri, Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        let body = json_body(response).await;
        assert_eq!(body["code"], "FORBIDDEN");
        assert!(body.get("data").is_none());
    }
}

#[tokio::test]
async fn test_solve_then_track_progress() {
    let db = common::seeded_db().await;
    let (user_id, token) = common::create_user(&db, "ala").await;
    let app = solving_app(db.clone()).await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/v1/problems/solve",
            Some(&token),
            json!({"problemText": "2x + 5 = 13", "subjectArea": "Algebra"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let data = &body["data"];
    assert_eq!(data["gradeLevel"], 7);
    let steps = data["solutionSteps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["stepNumber"], 1);
    assert_eq!(steps[1]["description"], "Divide both sides by 2");
    let goal_ids: Vec<&str> = steps[0]["curriculumGoals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["id"].as_str().unwrap())
        .collect();
    assert_eq!(goal_ids, vec!["g-check", "g-lin"]);

    let problem_id = data["problemId"].as_str().unwrap().to_string();
    let step_id = steps[0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/problems/{problem_id}"), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let stored_goal = &body["data"]["solutionSteps"][0]["curriculumGoals"][1];
    assert_eq!(stored_goal["id"], "g-lin");
    assert_eq!(stored_goal["requirements"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            &format!("/api/v1/problems/{problem_id}/steps/{step_id}/progress"),
            Some(&token),
            json!({"solvedWithHint": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["updatedGoals"], 2);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/progress/{user_id}"), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["totalGoals"], 2);
    assert_eq!(body["data"]["masteredGoals"], 2);
    assert_eq!(body["data"]["averageMastery"], 1.0);

    let response = app
        .oneshot(get(&format!("/api/v1/progress/history/{user_id}"), Some(&token)))
        .await
        .unwrap();
    let body = json_body(response).await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["problemId"], problem_id.as_str());
    assert_eq!(history[0]["stepsCompleted"], 1);
    assert_eq!(history[0]["completed"], false);
}

#[tokio::test]
async fn test_solve_failure_stores_nothing() {
    let db = common::seeded_db().await;
    let (_, token) = common::create_user(&db, "ala").await;
    let mock = common::spawn_mock_llm(|_, _| None).await;
    let app = common::test_app(db.clone(), common::llm_at(&mock.endpoint));

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/v1/problems/solve",
            Some(&token),
            json!({"problemText": "2x + 5 = 13"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["code"], "SOLUTION_FAILED");

    let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "problems""#)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_solve_validates_input() {
    let db = common::seeded_db().await;
    let (_, token) = common::create_user(&db, "ala").await;
    let app = common::test_app(db, common::offline_llm());

    for payload in [
        json!({"problemText": "   "}),
        json!({"problemText": "2x = 4", "gradeLevel": 13}),
        json!({}),
    ] {
        let response = app
            .clone()
            .oneshot(send_json("POST", "/api/v1/problems/solve", Some(&token), payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_missing_problem_is_not_found() {
    let db = common::test_db().await;
    let (_, token) = common::create_user(&db, "ala").await;
    let app = common::test_app(db, common::offline_llm());

    let response = app
        .oneshot(get("/api/v1/problems/does-not-exist", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_curriculum_browsing() {
    let db = common::seeded_db().await;
    let (_, token) = common::create_user(&db, "ala").await;
    let app = common::test_app(db, common::offline_llm());

    let body = json_body(
        app.clone()
            .oneshot(get("/api/v1/curriculum/chapters", Some(&token)))
            .await
            .unwrap(),
    )
    .await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Equations", "Geometry"]);
    assert_eq!(body["data"][0]["gradeLevel"], 7);

    let body = json_body(
        app.clone()
            .oneshot(get("/api/v1/curriculum/requirements/ch-7", Some(&token)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let body = json_body(
        app.clone()
            .oneshot(get("/api/v1/curriculum/goals/VII.3", Some(&token)))
            .await
            .unwrap(),
    )
    .await;
    let goal_ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["id"].as_str().unwrap())
        .collect();
    assert_eq!(goal_ids, vec!["g-expr", "g-lin"]);

    let response = app
        .oneshot(get("/api/v1/curriculum/requirements/unknown", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_settings_defaults_and_update() {
    let db = common::test_db().await;
    let (_, token) = common::create_user(&db, "ala").await;
    let app = common::test_app(db, common::offline_llm());

    let body = json_body(
        app.clone()
            .oneshot(get("/api/v1/users/me/settings", Some(&token)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["data"]["difficultyPreference"], "adaptive");
    assert_eq!(body["data"]["hintPreference"], true);

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/v1/users/me/settings",
            Some(&token),
            json!({"difficultyPreference": "hard", "theme": "dark"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["difficultyPreference"], "hard");
    assert_eq!(body["data"]["theme"], "dark");
    assert_eq!(body["data"]["notificationEnabled"], true);

    let response = app
        .oneshot(send_json(
            "PUT",
            "/api/v1/users/me/settings",
            Some(&token),
            json!({"difficultyPreference": "impossible"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_for_self() {
    let db = common::test_db().await;
    let (user_id, token) = common::create_user(&db, "ala").await;
    let app = common::test_app(db, common::offline_llm());

    let response = app
        .oneshot(get(&format!("/api/v1/progress/recommend/{user_id}"), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["data"].as_array().unwrap().is_empty());
}
