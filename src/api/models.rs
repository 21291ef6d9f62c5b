//! API request and response bodies

use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::models::{Course, Lesson};
use crate::video_search::VideoResult;

/// Body of the course generation endpoints
#[derive(Debug, Default, Deserialize)]
pub struct TopicRequest {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub target_language: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NarrationRequest {
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoQuery {
    #[serde(default)]
    pub query: String,
}

/// Returned by register and login
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseResponse {
    pub message: String,
    pub course: Course,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LessonResponse {
    pub message: String,
    pub lesson: Lesson,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    pub target_language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideosResponse {
    pub videos: Vec<VideoResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub models: Vec<String>,
    pub video_search: bool,
}
