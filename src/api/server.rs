//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router, ServiceExt,
};
use std::convert::Infallible;
use std::sync::Arc;
use tower::{Layer, ServiceBuilder};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::error::ApiError;
use super::handlers;
use super::models::{LoginRequest, NarrationRequest, RegisterRequest, TopicRequest, TranslateRequest, VideoQuery};
use crate::auth::{self, User, UserStore};
use crate::config::Config;
use crate::llm::generation::CourseGenerator;
use crate::llm::ModelChain;
use crate::models::NewCourse;
use crate::store::CourseStore;
use crate::video_search::VideoSearchClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub courses: CourseStore,
    pub users: UserStore,
    pub generator: Arc<CourseGenerator>,
    pub videos: VideoSearchClient,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the stores and build the upstream clients described by `config`
    pub async fn from_config(config: Config) -> Result<Self> {
        let data_dir = config.storage.data_dir.clone();

        let courses = CourseStore::new(&data_dir).await?;
        let users = UserStore::new(&data_dir, config.auth.pbkdf2_iterations).await?;
        let generator = CourseGenerator::new(ModelChain::from_config(&config.llm));
        let videos = VideoSearchClient::new(config.video.clone())?;

        if !videos.is_configured() {
            tracing::warn!("YouTube API key not set; video search is disabled");
        }

        Ok(Self {
            courses,
            users,
            generator: Arc::new(generator),
            videos,
            config: Arc::new(config),
        })
    }
}

/// Caller identity taken from the `Authorization` header.
///
/// Anonymous requests are allowed everywhere; an unknown token simply
/// yields no user.
pub struct Caller {
    pub token: Option<String>,
    pub user: Option<User>,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(auth::parse_authorization)
            .map(str::to_string);

        let user = match &token {
            Some(token) => state.users.authenticate(token).await,
            None => None,
        };

        Ok(Caller { token, user })
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Health check endpoints (both paths for compatibility)
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))

        // Courses, modules and lessons
        .route("/api/courses", get(list_courses_handler).post(create_course_handler))
        .route("/api/courses/:id", get(get_course_handler).delete(delete_course_handler))
        .route("/api/modules", get(list_modules_handler))
        .route("/api/modules/:id", get(get_module_handler))
        .route("/api/lessons", get(list_lessons_handler))
        .route("/api/lessons/:id", get(get_lesson_handler))

        // Generation
        .route("/api/generate-course", post(generate_course_handler))
        .route("/api/generate-full-course", post(generate_full_course_handler))
        .route("/api/lessons/:id/generate-content", post(generate_lesson_content_handler))

        // Accounts
        .route("/api/register", post(register_handler))
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))

        // Media
        .route("/api/youtube", get(youtube_handler))
        .route("/api/translate", post(translate_handler))
        .route("/api/lessons/:id/narration", post(narration_handler))

        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
        )
}

/// Router wrapped so `/api/courses/` and `/api/courses` route the same
pub fn build_app(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state))
}

/// Configure and start the HTTP server
pub async fn start_http_server(state: AppState) -> Result<()> {
    let address = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("🌐 API server listening on http://{}", address);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(handlers::health_check(&state))
}

async fn list_courses_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(handlers::list_courses(&state).await)
}

async fn create_course_handler(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<NewCourse>, axum::extract::rejection::JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let course = handlers::create_course(&state, request, caller.user.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(course)).into_response())
}

async fn get_course_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Response, ApiError> {
    Ok(Json(handlers::get_course(&state, id).await?).into_response())
}

async fn delete_course_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Result<StatusCode, ApiError> {
    handlers::delete_course(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_modules_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(handlers::list_modules(&state).await)
}

async fn get_module_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Response, ApiError> {
    Ok(Json(handlers::get_module(&state, id).await?).into_response())
}

async fn list_lessons_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(handlers::list_lessons(&state).await)
}

async fn get_lesson_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Response, ApiError> {
    Ok(Json(handlers::get_lesson(&state, id).await?).into_response())
}

async fn generate_course_handler(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<TopicRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let response = handlers::generate_course(&state, &request.topic, caller.user.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn generate_full_course_handler(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<TopicRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let response = handlers::generate_full_course(&state, &request.topic, caller.user.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn generate_lesson_content_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError> {
    Ok(Json(handlers::generate_lesson_content(&state, id).await?).into_response())
}

async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let response = handlers::register(&state, request).await?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    Ok(Json(handlers::login(&state, request).await?).into_response())
}

async fn logout_handler(State(state): State<AppState>, caller: Caller) -> Result<Response, ApiError> {
    Ok(Json(handlers::logout(&state, caller.token.as_deref()).await?).into_response())
}

async fn youtube_handler(
    State(state): State<AppState>,
    Query(params): Query<VideoQuery>,
) -> Result<Response, ApiError> {
    Ok(Json(handlers::search_videos(&state, &params.query).await?).into_response())
}

async fn translate_handler(
    State(state): State<AppState>,
    payload: Result<Json<TranslateRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    Ok(Json(handlers::translate(&state, request).await?).into_response())
}

async fn narration_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    payload: Result<Json<NarrationRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    Ok(Json(handlers::narrate_lesson(&state, id, &request.language).await?).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::llm::testing::{chain, ScriptedLLM};
    use axum::body::Body;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt as _;

    const OUTLINE: &str = r#"```json
{"title": "Rust Basics", "description": "Learn Rust", "tags": ["rust"],
 "modules": [{"title": "Ownership", "lessons": ["Moves", "Borrows"]}]}
```"#;

    const LESSON: &str = r#"{"title": "Moves", "objectives": ["Move values"],
        "content": [{"type": "heading", "text": "Intro"}, {"type": "paragraph", "text": "Values move."}]}"#;

    async fn test_state(replies: &[&str]) -> (AppState, TempDir) {
        let tmp = TempDir::new().unwrap();
        let config = ConfigBuilder::new()
            .with_data_dir(tmp.path().to_path_buf())
            .with_pbkdf2_iterations(1_000)
            .build();

        let state = AppState {
            courses: CourseStore::new(tmp.path()).await.unwrap(),
            users: UserStore::new(tmp.path(), 1_000).await.unwrap(),
            generator: Arc::new(CourseGenerator::new(chain(ScriptedLLM::replying(replies)))),
            videos: VideoSearchClient::new(config.video.clone()).unwrap(),
            config: Arc::new(config),
        };
        (state, tmp)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(state: &AppState, request: axum::http::Request<Body>) -> (StatusCode, Value) {
        let response = build_app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_models() {
        let (state, _tmp) = test_state(&[]).await;

        let (status, body) = send(&state, get_request("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["models"], json!(["primary", "fallback"]));
        assert_eq!(body["video_search"], false);
    }

    #[tokio::test]
    async fn generate_course_requires_topic() {
        let (state, _tmp) = test_state(&[]).await;

        let (status, body) = send(&state, json_request("POST", "/api/generate-course", json!({"topic": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Topic is required"}));

        let (status, _) = send(&state, json_request("POST", "/api/generate-course", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_course_stores_placeholders() {
        let (state, _tmp) = test_state(&[OUTLINE]).await;

        let (status, body) = send(&state, json_request("POST", "/api/generate-course/", json!({"topic": "Rust"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["course"]["title"], "Rust Basics");
        assert_eq!(body["course"]["modules"][0]["lessons"][1]["title"], "Borrows");
        assert_eq!(body["course"]["modules"][0]["lessons"][0]["is_enriched"], false);

        let (status, body) = send(&state, get_request("/api/courses/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn generation_failure_is_reported_and_nothing_stored() {
        let (state, _tmp) = test_state(&["Sorry, I can't do that."]).await;

        let (status, body) = send(&state, json_request("POST", "/api/generate-course", json!({"topic": "Rust"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to generate course. Please try again later.");
        assert!(state.courses.list_courses().await.is_empty());
    }

    #[tokio::test]
    async fn full_course_enriches_every_lesson() {
        let (state, _tmp) = test_state(&[OUTLINE, LESSON, LESSON]).await;

        let (status, body) = send(&state, json_request("POST", "/api/generate-full-course", json!({"topic": "Rust"}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let lessons = body["course"]["modules"][0]["lessons"].as_array().unwrap();
        assert_eq!(lessons.len(), 2);
        assert!(lessons.iter().all(|l| l["is_enriched"] == true));
        assert_eq!(lessons[1]["title"], "Borrows");
        assert_eq!(lessons[0]["objectives"], json!(["Move values"]));
    }

    #[tokio::test]
    async fn full_course_is_not_stored_when_a_lesson_fails() {
        // Second lesson gets no reply from either model
        let (state, _tmp) = test_state(&[OUTLINE, LESSON]).await;

        let (status, _) = send(&state, json_request("POST", "/api/generate-full-course", json!({"topic": "Rust"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.courses.list_courses().await.is_empty());
    }

    #[tokio::test]
    async fn lesson_content_is_generated_once() {
        let (state, _tmp) = test_state(&[OUTLINE, LESSON]).await;
        send(&state, json_request("POST", "/api/generate-course", json!({"topic": "Rust"}))).await;

        let (status, body) = send(&state, json_request("POST", "/api/lessons/1/generate-content", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Lesson content generated successfully");
        assert_eq!(body["lesson"]["content"][1]["text"], "Values move.");

        // No replies left; an enriched lesson must not call the model again
        let (status, body) = send(&state, json_request("POST", "/api/lessons/1/generate-content", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Lesson already has content");

        let (status, body) = send(&state, json_request("POST", "/api/lessons/99/generate-content", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Lesson not found");
    }

    #[tokio::test]
    async fn course_crud() {
        let (state, _tmp) = test_state(&[]).await;

        let (status, body) = send(&state, json_request("POST", "/api/courses", json!({"title": "Notes", "tags": ["misc"]}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_u64().unwrap();

        let (status, body) = send(&state, get_request(&format!("/api/courses/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tags"], json!(["misc"]));

        let delete = axum::http::Request::builder()
            .method("DELETE")
            .uri(format!("/api/courses/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&state, get_request(&format!("/api/courses/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Course not found");
    }

    #[tokio::test]
    async fn register_login_logout_flow() {
        let (state, _tmp) = test_state(&[]).await;
        let credentials = json!({"username": "ada", "password": "lovelace"});

        let (status, body) = send(&state, json_request("POST", "/api/register", credentials.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["username"], "ada");

        let (status, body) = send(&state, json_request("POST", "/api/register", credentials.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username already exists");

        let (status, _) = send(&state, json_request("POST", "/api/login", json!({"username": "ada", "password": "nope"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&state, json_request("POST", "/api/login", credentials)).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let logout = axum::http::Request::builder()
            .method("POST")
            .uri("/api/logout")
            .header(header::AUTHORIZATION, format!("Token {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&state, logout).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Logout successful");
        assert!(state.users.authenticate(&token).await.is_none());
    }

    #[tokio::test]
    async fn authenticated_generation_records_creator() {
        let (state, _tmp) = test_state(&[OUTLINE]).await;
        let session = state.users.register("ada", "lovelace", "").await.unwrap();

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/generate-course")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", session.token))
            .body(Body::from(json!({"topic": "Rust"}).to_string()))
            .unwrap();
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["course"]["creator"], "ada");
    }

    #[tokio::test]
    async fn youtube_without_key_is_unavailable() {
        let (state, _tmp) = test_state(&[]).await;

        let (status, body) = send(&state, get_request("/api/youtube?query=rust")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "YouTube API key not configured");

        let (status, _) = send(&state, get_request("/api/youtube")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn translate_and_narrate() {
        let (state, _tmp) = test_state(&[OUTLINE, LESSON, "Hola", "Los valores se mueven."]).await;
        send(&state, json_request("POST", "/api/generate-course", json!({"topic": "Rust"}))).await;

        let (status, body) = send(&state, json_request("POST", "/api/lessons/1/narration", json!({"language": "es"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Lesson has no content yet");

        send(&state, json_request("POST", "/api/lessons/1/generate-content", json!({}))).await;

        let (status, body) = send(&state, json_request("POST", "/api/translate", json!({"text": "Hello", "target_language": "es"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"translated_text": "Hola", "target_language": "es"}));

        let (status, body) = send(&state, json_request("POST", "/api/lessons/1/narration", json!({"language": "es"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lesson_id"], 1);
        assert_eq!(body["script"], "Los valores se mueven.");

        let (status, body) = send(&state, json_request("POST", "/api/translate", json!({"text": "Hello"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Target language is required");
    }
}
