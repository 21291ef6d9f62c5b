use super::extraction::{self, ExtractError, ExtractionError};
use super::{ChatMessage, LLMError, ModelChain, UpstreamFailure};
use crate::models::{CourseOutline, LessonContent};
use tracing::{debug, info, warn};

/// Errors from turning a prompt into a structured result
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Model request failed: {0}")]
    Upstream(#[from] LLMError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Unexpected response shape: {0}")]
    Shape(serde_json::Error),
}

impl From<ExtractError> for GenerationError {
    fn from(error: ExtractError) -> Self {
        match error {
            ExtractError::Malformed(e) => GenerationError::Extraction(e),
            ExtractError::Shape(e) => GenerationError::Shape(e),
        }
    }
}

impl GenerationError {
    /// Message safe to show to end users; `what` names the thing being generated
    pub fn user_message(&self, what: &str) -> String {
        let kind = match self {
            GenerationError::Upstream(e) => e.kind(),
            _ => UpstreamFailure::Other,
        };

        match kind {
            UpstreamFailure::QuotaExceeded => {
                "API quota exceeded. Please check your billing and add credits to your account.".to_string()
            }
            UpstreamFailure::NotConfigured => {
                "AI API key not configured. Please add your Gemini API key to the configuration.".to_string()
            }
            UpstreamFailure::Other => format!("Failed to generate {}. Please try again later.", what),
        }
    }
}

/// Generates course outlines, lesson content and translations
pub struct CourseGenerator {
    chain: ModelChain,
}

impl CourseGenerator {
    pub fn new(chain: ModelChain) -> Self {
        Self { chain }
    }

    pub fn models(&self) -> &[String] {
        self.chain.models()
    }

    /// Generate a course outline (modules and lesson titles) for a topic
    pub async fn generate_course_outline(&self, topic: &str) -> Result<CourseOutline, GenerationError> {
        info!("📝 Generating course outline for topic: {}", topic);

        let messages = vec![
            ChatMessage::system(outline_prompt()),
            ChatMessage::user(format!("Create a course outline for: \"{}\"", topic)),
        ];

        let outline: CourseOutline = self.request_json(&messages).await?;
        debug!(
            "Outline \"{}\" has {} modules and {} lessons",
            outline.title,
            outline.modules.len(),
            outline.lesson_count()
        );
        Ok(outline)
    }

    /// Generate the structured content of one lesson
    pub async fn generate_lesson_content(
        &self,
        course_title: &str,
        module_title: &str,
        lesson_title: &str,
    ) -> Result<LessonContent, GenerationError> {
        info!("📖 Generating lesson content for: {}", lesson_title);

        let messages = vec![
            ChatMessage::system(lesson_prompt()),
            ChatMessage::user(format!(
                "Create detailed educational content for \"{}\" in the course \"{}\" under module \"{}\". \
                 Use \"{}\" as the title.",
                lesson_title, course_title, module_title, lesson_title
            )),
        ];

        let mut content: LessonContent = self.request_json(&messages).await?;
        if content.title.trim().is_empty() {
            content.title = lesson_title.to_string();
        }
        Ok(content)
    }

    /// Translate plain text into the target language
    pub async fn translate(&self, text: &str, target_language: &str) -> Result<String, GenerationError> {
        debug!("Translating {} chars into {}", text.len(), target_language);

        let messages = vec![
            ChatMessage::system(translation_prompt()),
            ChatMessage::user(format!(
                "Target language: {}\n\nText:\n{}",
                target_language, text
            )),
        ];

        let response = self.chain.chat(&messages).await?;
        let translated = extraction::strip_code_fences(&response.content);
        if translated.is_empty() {
            return Err(LLMError::EmptyResponse.into());
        }
        Ok(translated)
    }

    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        messages: &[ChatMessage],
    ) -> Result<T, GenerationError> {
        let response = self.chain.chat(messages).await?;
        debug!(
            "Model {} responded (tokens: {:?})",
            response.model, response.tokens_used
        );

        extraction::extract(&response.content).map_err(|e| {
            if let ExtractError::Malformed(err) = &e {
                warn!("Could not extract JSON: {} | text: {}...", err.message, err.excerpt);
            }
            GenerationError::from(e)
        })
    }
}

fn outline_prompt() -> &'static str {
    r#"You design online courses.

Return ONLY valid JSON (no markdown formatting, no code blocks) with this structure:
{
  "title": "Course Title",
  "description": "Course description",
  "tags": ["tag1", "tag2"],
  "modules": [
    {"title": "Module 1", "lessons": ["Lesson 1", "Lesson 2"]}
  ]
}"#
}

fn lesson_prompt() -> &'static str {
    r#"You write engaging, comprehensive lesson material.

Include:
- Clear headings for each section
- Detailed explanations
- Examples and practical insights
- Lists where helpful
- Code examples if relevant, as {"type": "code", "language": "...", "code": "..."}

Add at least ONE video suggestion block:
{"type": "video", "query": "relevant search term for YouTube"}

Add at least ONE quiz block:
{"type": "quiz", "questions": [
  {
    "question": "What is the main concept?",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correct": 0,
    "explanation": "Explanation of why this is correct"
  }
]}

Return ONLY valid JSON (no markdown formatting, no code blocks):
{
  "title": "Lesson title",
  "objectives": ["Learning objective 1", "Learning objective 2", "Learning objective 3"],
  "content": [
    {"type": "heading", "text": "Introduction"},
    {"type": "paragraph", "text": "Detailed content explaining the topic..."},
    {"type": "list", "items": ["Point 1", "Point 2", "Point 3"]},
    {"type": "video", "query": "relevant YouTube search term"},
    {"type": "heading", "text": "Key Concepts"},
    {"type": "paragraph", "text": "More detailed content..."},
    {"type": "quiz", "questions": [
      {
        "question": "What is the main concept?",
        "options": ["Option A", "Option B", "Option C", "Option D"],
        "correct": 0,
        "explanation": "Explanation of why this is correct"
      }
    ]}
  ]
}"#
}

fn translation_prompt() -> &'static str {
    r#"You translate lesson narration scripts.

Rules:
1. Translate the text into the requested language
2. Keep the paragraph structure
3. Return ONLY the translated text, no commentary"#
}
