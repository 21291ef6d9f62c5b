//! API request handlers

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;

use super::error::ApiError;
use super::models::*;
use super::server::AppState;
use crate::auth::User;
use crate::models::{Course, CourseSummary, Lesson, Module, NewCourse};
use crate::narration::{self, Narration};

type ApiResult<T> = Result<T, ApiError>;

/// Handle health check requests
pub fn health_check(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "healthy".to_string(),
        service: "text-to-learn".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        models: state.generator.models().to_vec(),
        video_search: state.videos.is_configured(),
    }
}

fn require<'a>(value: &'a str, message: &str) -> ApiResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(message.to_string()));
    }
    Ok(value)
}

fn creator(user: Option<&User>) -> Option<String> {
    user.map(|u| u.username.clone())
}

pub async fn list_courses(state: &AppState) -> Vec<CourseSummary> {
    state.courses.list_courses().await
}

pub async fn get_course(state: &AppState, id: u64) -> ApiResult<Course> {
    Ok(state.courses.get_course(id).await?)
}

pub async fn create_course(state: &AppState, request: NewCourse, user: Option<&User>) -> ApiResult<Course> {
    require(&request.title, "Title is required")?;
    let request = NewCourse {
        title: request.title.trim().to_string(),
        ..request
    };
    Ok(state.courses.create_course(request, creator(user)).await?)
}

pub async fn delete_course(state: &AppState, id: u64) -> ApiResult<()> {
    Ok(state.courses.delete_course(id).await?)
}

pub async fn list_modules(state: &AppState) -> Vec<Module> {
    state.courses.list_modules().await
}

pub async fn get_module(state: &AppState, id: u64) -> ApiResult<Module> {
    Ok(state.courses.get_module(id).await?)
}

pub async fn list_lessons(state: &AppState) -> Vec<Lesson> {
    state.courses.list_lessons().await
}

pub async fn get_lesson(state: &AppState, id: u64) -> ApiResult<Lesson> {
    Ok(state.courses.get_lesson(id).await?)
}

/// Generate an outline and store it with placeholder lessons
pub async fn generate_course(state: &AppState, topic: &str, user: Option<&User>) -> ApiResult<CourseResponse> {
    let topic = require(topic, "Topic is required")?;

    let outline = state
        .generator
        .generate_course_outline(topic)
        .await
        .map_err(|e| ApiError::generation(e, "course"))?;

    let course = state
        .courses
        .create_from_outline(&outline, creator(user), HashMap::new())
        .await?;

    Ok(CourseResponse {
        message: "Course generated successfully".to_string(),
        course,
    })
}

/// Generate an outline and the content of every lesson before storing anything
pub async fn generate_full_course(
    state: &AppState,
    topic: &str,
    user: Option<&User>,
) -> ApiResult<CourseResponse> {
    let topic = require(topic, "Topic is required")?;
    let generator = state.generator.as_ref();

    let outline = generator
        .generate_course_outline(topic)
        .await
        .map_err(|e| ApiError::generation(e, "course"))?;

    let jobs: Vec<((usize, usize), String, String)> = outline
        .modules
        .iter()
        .enumerate()
        .flat_map(|(module_index, module)| {
            module
                .lessons
                .iter()
                .enumerate()
                .map(move |(lesson_index, lesson)| ((module_index, lesson_index), module.title.clone(), lesson.clone()))
        })
        .collect();

    tracing::info!("🏗️ Generating {} lessons for \"{}\"", jobs.len(), outline.title);

    let course_title = outline.title.as_str();
    let contents: HashMap<_, _> = stream::iter(jobs)
        .map(|(key, module_title, lesson_title)| async move {
            generator
                .generate_lesson_content(course_title, &module_title, &lesson_title)
                .await
                .map(|content| (key, content))
        })
        .buffered(state.config.llm.max_concurrent_lessons.max(1))
        .try_collect()
        .await
        .map_err(|e| ApiError::generation(e, "course"))?;

    let course = state
        .courses
        .create_from_outline(&outline, creator(user), contents)
        .await?;

    Ok(CourseResponse {
        message: "Full course generated successfully".to_string(),
        course,
    })
}

/// Generate content for a placeholder lesson; enriched lessons are returned as-is
pub async fn generate_lesson_content(state: &AppState, lesson_id: u64) -> ApiResult<LessonResponse> {
    let context = state.courses.lesson_context(lesson_id).await?;

    if context.lesson.is_enriched {
        return Ok(LessonResponse {
            message: "Lesson already has content".to_string(),
            lesson: context.lesson,
        });
    }

    let content = state
        .generator
        .generate_lesson_content(&context.course_title, &context.module_title, &context.lesson.title)
        .await
        .map_err(|e| ApiError::generation(e, "lesson content"))?;

    let lesson = state.courses.enrich_lesson(lesson_id, content).await?;

    Ok(LessonResponse {
        message: "Lesson content generated successfully".to_string(),
        lesson,
    })
}

pub async fn register(state: &AppState, request: RegisterRequest) -> ApiResult<AuthResponse> {
    let session = state
        .users
        .register(&request.username, &request.password, &request.email)
        .await?;

    Ok(AuthResponse {
        message: "User created successfully".to_string(),
        token: session.token,
        user: session.user,
    })
}

pub async fn login(state: &AppState, request: LoginRequest) -> ApiResult<AuthResponse> {
    let session = state.users.login(&request.username, &request.password).await?;

    Ok(AuthResponse {
        message: "Login successful".to_string(),
        token: session.token,
        user: session.user,
    })
}

/// Revoke the caller's token; succeeds even without one
pub async fn logout(state: &AppState, token: Option<&str>) -> ApiResult<MessageResponse> {
    let revoked = match token {
        Some(token) => state.users.logout(token).await?,
        None => false,
    };

    let message = if revoked { "Logout successful" } else { "Logged out" };
    Ok(MessageResponse {
        message: message.to_string(),
    })
}

pub async fn search_videos(state: &AppState, query: &str) -> ApiResult<VideosResponse> {
    let videos = state.videos.search(query).await?;
    Ok(VideosResponse { videos })
}

pub async fn translate(state: &AppState, request: TranslateRequest) -> ApiResult<TranslateResponse> {
    let text = require(&request.text, "Text is required")?;
    let target_language = require(&request.target_language, "Target language is required")?;

    let translated_text = state
        .generator
        .translate(text, target_language)
        .await
        .map_err(|e| ApiError::generation(e, "translation"))?;

    Ok(TranslateResponse {
        translated_text,
        target_language: target_language.to_string(),
    })
}

pub async fn narrate_lesson(state: &AppState, lesson_id: u64, language: &str) -> ApiResult<Narration> {
    let lesson = state.courses.get_lesson(lesson_id).await?;
    if !lesson.is_enriched {
        return Err(ApiError::BadRequest("Lesson has no content yet".to_string()));
    }

    narration::narrate_lesson(&state.generator, &lesson, language)
        .await
        .map_err(|e| ApiError::generation(e, "narration"))
}
