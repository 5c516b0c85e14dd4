use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::{services::ServeDir, trace::TraceLayer};
use utils::assets::blob_dir;

use crate::{DeploymentImpl, routes};

mod auth;

pub fn router(deployment: DeploymentImpl) -> Router {
    let protected_routes = Router::new()
        .merge(routes::employees::router(&deployment))
        .merge(routes::projects::router(&deployment))
        .merge(routes::tasks::router())
        .merge(routes::notes::router())
        .merge(routes::invites::router())
        .merge(routes::dashboard::router())
        .layer(from_fn_with_state(deployment.clone(), auth::require_session));

    let api_routes = Router::new()
        .merge(routes::invites::public_router())
        .merge(protected_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest_service("/photos", ServeDir::new(blob_dir().join("photos")))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use deployment::Deployment;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use utils::jwt::issue_session_token;
    use uuid::Uuid;

    use crate::{
        DeploymentImpl,
        test_support::{TEST_SESSION_SECRET, TestEnvGuard},
    };

    const ADMIN_ID: i64 = 1;
    const EMPLOYEE_ID: i64 = 42;

    async fn setup_app() -> (TestEnvGuard, ::test_support::TempDatabase, Router) {
        let temp = ::test_support::TempDatabase::new().unwrap();
        let env_guard = TestEnvGuard::new(temp.dir(), temp.url());

        let deployment = DeploymentImpl::new().await.unwrap();
        assert_eq!(deployment.session_secret(), TEST_SESSION_SECRET);

        (env_guard, temp, super::router(deployment))
    }

    fn token(user_id: i64, role: &str) -> String {
        issue_session_token(TEST_SESSION_SECRET, user_id, role, chrono::Duration::hours(1))
            .unwrap()
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_project(app: &Router, admin: &str, name: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/projects",
            Some(admin),
            Some(json!({ "name": name, "project_type": "consulting" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_profile(app: &Router, bearer: &str, name: &str) -> (StatusCode, Value) {
        send(
            app,
            Method::POST,
            "/api/employees",
            Some(bearer),
            Some(json!({ "name": name })),
        )
        .await
    }

    #[tokio::test]
    async fn health_is_public() {
        let (_env, _db, app) = setup_app().await;

        let (status, body) = send(&app, Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], Value::Bool(true));
    }

    #[tokio::test]
    async fn api_requires_a_valid_session() {
        let (_env, _db, app) = setup_app().await;

        let (status, body) = send(&app, Method::GET, "/api/projects", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], Value::Bool(false));
        assert_eq!(body["message"], "Authentication required");

        let forged = issue_session_token("other-secret", ADMIN_ID, "admin", chrono::Duration::hours(1))
            .unwrap();
        let (status, _) = send(&app, Method::GET, "/api/projects", Some(&forged), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/projects",
            Some(&token(EMPLOYEE_ID, "employee")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn employees_cannot_manage_projects_or_invites() {
        let (_env, _db, app) = setup_app().await;
        let employee = token(EMPLOYEE_ID, "employee");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/projects",
            Some(&employee),
            Some(json!({ "name": "Apollo", "project_type": "internal" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Only managers can create projects");

        let (status, _) = send(&app, Method::POST, "/api/invites", Some(&employee), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            send(&app, Method::GET, "/api/dashboard/stats", Some(&employee), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invite_links_are_single_use() {
        let (_env, _db, app) = setup_app().await;
        let admin = token(ADMIN_ID, "admin");

        let (status, body) = send(&app, Method::POST, "/api/invites", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let invite_token = body["data"]["token"].as_str().unwrap().to_string();
        assert_eq!(invite_token.len(), 32);
        assert_eq!(body["data"]["link"], format!("/invite/{invite_token}"));

        let validate_uri = format!("/api/invites/{invite_token}");
        let redeem_uri = format!("/api/invites/{invite_token}/redeem");

        let (status, body) = send(&app, Method::GET, &validate_uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["valid"], Value::Bool(true));

        let (status, _) = send(
            &app,
            Method::POST,
            &redeem_uri,
            None,
            Some(json!({ "user_id": EMPLOYEE_ID })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, Method::GET, &validate_uri, None, None).await;
        assert_eq!(body["data"]["valid"], Value::Bool(false));

        let (status, body) = send(
            &app,
            Method::POST,
            &redeem_uri,
            None,
            Some(json!({ "user_id": 99 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invite link is invalid or expired");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/invites/does-not-exist/redeem",
            None,
            Some(json!({ "user_id": 99 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn employee_clocks_in_and_out_of_a_project() {
        let (_env, _db, app) = setup_app().await;
        let admin = token(ADMIN_ID, "admin");
        let employee = token(EMPLOYEE_ID, "employee");
        let project_id = create_project(&app, &admin, "Apollo").await;

        let (status, body) = create_profile(&app, &employee, "Ada").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "inactive");
        assert_eq!(body["data"]["pomodoro_work_time"], 25);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/employees/me/enter-project",
            Some(&employee),
            Some(json!({ "project_id": project_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "project");
        assert_eq!(body["data"]["current_project_id"], project_id.as_str());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/employees/me/exit-project",
            Some(&employee),
            Some(json!({ "task_description": "  Write the handover notes  " })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "rest");
        assert!(body["data"]["current_project_id"].is_null());

        let (_, body) = send(
            &app,
            Method::GET,
            &format!("/api/projects/{project_id}/tasks"),
            Some(&employee),
            None,
        )
        .await;
        let tasks = body["data"].as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["description"], "Write the handover notes");
        assert_eq!(tasks[0]["created_by"], EMPLOYEE_ID);

        let (_, body) = send(&app, Method::GET, "/api/notes", Some(&employee), None).await;
        let titles: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|note| note["title"].as_str())
            .collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"Project entry"));
        assert!(titles.contains(&"Project exit"));
    }

    #[tokio::test]
    async fn entering_an_unknown_project_is_not_found() {
        let (_env, _db, app) = setup_app().await;
        let employee = token(EMPLOYEE_ID, "employee");
        create_profile(&app, &employee, "Ada").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/employees/me/enter-project",
            Some(&employee),
            Some(json!({ "project_id": Uuid::new_v4() })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn own_profile_routes_need_a_profile() {
        let (_env, _db, app) = setup_app().await;
        let employee = token(EMPLOYEE_ID, "employee");

        let (status, body) =
            send(&app, Method::GET, "/api/employees/me", Some(&employee), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Employee profile not found");

        let (status, body) = send(&app, Method::GET, "/api/dashboard/me", Some(&employee), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn second_profile_for_the_same_user_conflicts() {
        let (_env, _db, app) = setup_app().await;
        let employee = token(EMPLOYEE_ID, "employee");

        let (status, _) = create_profile(&app, &employee, "Ada").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = create_profile(&app, &employee, "Ada again").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn rejected_profile_leaves_no_photo_behind() {
        let (_env, temp, app) = setup_app().await;
        let employee = token(EMPLOYEE_ID, "employee");
        let photos = temp.dir().join("blobs").join("photos");

        let (status, _) = create_profile(&app, &employee, "Ada").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/employees",
            Some(&employee),
            Some(json!({ "name": "Ada again", "photo": "data:image/jpeg;base64,aGVsbG8=" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let other = token(EMPLOYEE_ID + 1, "employee");
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/employees",
            Some(&other),
            Some(json!({ "name": "Grace", "photo": "not base64!" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, Method::GET, "/api/employees/me", Some(&other), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let stored = std::fs::read_dir(&photos).map(|dir| dir.count()).unwrap_or(0);
        assert_eq!(stored, 0);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/employees",
            Some(&other),
            Some(json!({ "name": "Grace", "photo": "data:image/jpeg;base64,aGVsbG8=" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["data"]["photo"].as_str().unwrap().starts_with("/photos/employee-Grace-"));
        assert_eq!(std::fs::read_dir(&photos).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn settings_out_of_range_are_rejected() {
        let (_env, _db, app) = setup_app().await;
        let employee = token(EMPLOYEE_ID, "employee");
        create_profile(&app, &employee, "Ada").await;

        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/employees/me/settings",
            Some(&employee),
            Some(json!({ "pomodoro_work_time": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/employees/me/settings",
            Some(&employee),
            Some(json!({ "pomodoro_work_time": 50, "specialties": "Rust" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pomodoro_work_time"], 50);
        assert_eq!(body["data"]["specialties"], "Rust");
    }

    #[tokio::test]
    async fn project_with_clocked_in_employee_cannot_be_deleted() {
        let (_env, _db, app) = setup_app().await;
        let admin = token(ADMIN_ID, "admin");
        let employee = token(EMPLOYEE_ID, "employee");
        let project_id = create_project(&app, &admin, "Apollo").await;
        create_profile(&app, &employee, "Ada").await;
        send(
            &app,
            Method::POST,
            "/api/employees/me/enter-project",
            Some(&employee),
            Some(json!({ "project_id": project_id })),
        )
        .await;

        let project_uri = format!("/api/projects/{project_id}");
        let (status, _) = send(&app, Method::DELETE, &project_uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, Method::POST, "/api/employees/me/rest", Some(&employee), None).await;

        let (status, _) = send(&app, Method::DELETE, &project_uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, Method::GET, &project_uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_uses_the_error_envelope() {
        let (_env, _db, app) = setup_app().await;
        let admin = token(ADMIN_ID, "admin");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/projects",
            Some(&admin),
            Some(json!({ "project_type": "missing name" })),
        )
        .await;

        assert!(status.is_client_error());
        assert_eq!(body["success"], Value::Bool(false));
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn uploaded_photo_is_served_from_blob_storage() {
        let (_env, _db, app) = setup_app().await;
        let employee = token(EMPLOYEE_ID, "employee");
        create_profile(&app, &employee, "Ada Lovelace").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/employees/me/photo",
            Some(&employee),
            Some(json!({ "photo": "data:image/jpeg;base64,aGVsbG8=" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let photo_url = body["data"]["photo"].as_str().unwrap().to_string();
        assert!(photo_url.starts_with("/photos/employee-Ada-Lovelace-"));

        let response = app
            .clone()
            .oneshot(Request::builder().uri(&photo_url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/employees/me/photo",
            Some(&employee),
            Some(json!({ "photo": "not base64!" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn manager_stats_count_projects_and_employees() {
        let (_env, _db, app) = setup_app().await;
        let admin = token(ADMIN_ID, "admin");
        let employee = token(EMPLOYEE_ID, "employee");
        let project_id = create_project(&app, &admin, "Apollo").await;
        create_project(&app, &admin, "Gemini").await;
        create_profile(&app, &employee, "Ada").await;
        send(
            &app,
            Method::POST,
            "/api/employees/me/enter-project",
            Some(&employee),
            Some(json!({ "project_id": project_id })),
        )
        .await;

        let (status, body) =
            send(&app, Method::GET, "/api/dashboard/stats", Some(&admin), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_projects"], 2);
        assert_eq!(body["data"]["active_projects"], 2);
        assert_eq!(body["data"]["total_employees"], 1);
        assert_eq!(body["data"]["active_employees"], 1);
    }
}
