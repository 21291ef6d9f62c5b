/// Text-to-Learn - AI course generator backend
///
/// Turns a topic into a structured course: the model's free-form replies are
/// recovered into JSON, typed into outlines and lessons, stored, and served
/// over a REST API.

pub mod api;
pub mod auth;
pub mod config;
pub mod llm;
pub mod models;
pub mod narration;
pub mod store;
pub mod video_search;

// Re-export main types for easy access
pub use crate::api::{ApiServer, AppState};
pub use crate::auth::{User, UserStore};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::llm::extraction::{extract, extract_json, ExtractionError};
pub use crate::llm::generation::{CourseGenerator, GenerationError};
pub use crate::llm::{LLMConfig, LLMProvider, ModelChain};
pub use crate::models::{ContentBlock, Course, CourseOutline, Lesson, LessonContent, Module};
pub use crate::store::CourseStore;
pub use crate::video_search::{VideoResult, VideoSearchClient};
