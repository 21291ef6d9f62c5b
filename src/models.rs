//! Course data: generated shapes and the persisted entities built from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Course outline returned by the model for a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutline {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub modules: Vec<ModuleOutline>,
}

/// One module of a [`CourseOutline`]: a title and its lesson titles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutline {
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<String>,
}

impl CourseOutline {
    /// Total number of lessons across all modules
    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }
}

/// Generated material for a single lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    pub content: Vec<LessonBlock>,
}

/// A content block, tagged by its `type` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Heading {
        text: String,
    },
    Paragraph {
        text: String,
    },
    List {
        items: Vec<String>,
    },
    Video {
        query: String,
    },
    Quiz {
        questions: Vec<QuizQuestion>,
    },
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        code: String,
    },
}

/// Multiple-choice question inside a quiz block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`
    pub correct: usize,
    #[serde(default)]
    pub explanation: String,
}

/// A block as stored on a lesson.
///
/// Blocks of an unknown type (or a known type with missing fields) are kept
/// as raw JSON rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LessonBlock {
    Block(ContentBlock),
    Unrecognized(serde_json::Value),
}

impl From<ContentBlock> for LessonBlock {
    fn from(block: ContentBlock) -> Self {
        LessonBlock::Block(block)
    }
}

impl LessonBlock {
    pub fn as_block(&self) -> Option<&ContentBlock> {
        match self {
            LessonBlock::Block(block) => Some(block),
            LessonBlock::Unrecognized(_) => None,
        }
    }
}

/// Persisted course with its modules and lessons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub creator: Option<String>,
    pub tags: Vec<String>,
    pub modules: Vec<Module>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: u64,
    pub title: String,
    pub order: u32,
    pub lessons: Vec<Lesson>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: u64,
    pub title: String,
    pub content: Vec<LessonBlock>,
    pub objectives: Vec<String>,
    /// Set once generated content has been attached
    pub is_enriched: bool,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

/// Lightweight listing view of a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub module_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            description: course.description.clone(),
            tags: course.tags.clone(),
            module_count: course.modules.len(),
            created_at: course.created_at,
        }
    }
}

/// Fields accepted when creating a course by hand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outline_defaults_missing_description_and_tags() {
        let outline: CourseOutline = serde_json::from_value(json!({
            "title": "Python",
            "modules": [{"title": "Basics", "lessons": ["Variables", "Loops"]}]
        }))
        .unwrap();

        assert_eq!(outline.description, "");
        assert!(outline.tags.is_empty());
        assert_eq!(outline.lesson_count(), 2);
    }

    #[test]
    fn test_content_blocks_use_type_tag() {
        let content: LessonContent = serde_json::from_value(json!({
            "title": "Loops",
            "objectives": ["Write a for loop"],
            "content": [
                {"type": "heading", "text": "Introduction"},
                {"type": "paragraph", "text": "Loops repeat work."},
                {"type": "list", "items": ["for", "while"]},
                {"type": "video", "query": "python loops tutorial"},
                {"type": "quiz", "questions": [{
                    "question": "Which keyword starts a loop?",
                    "options": ["for", "def"],
                    "correct": 0,
                    "explanation": "for iterates."
                }]},
                {"type": "code", "language": "python", "code": "for i in range(3): pass"}
            ]
        }))
        .unwrap();

        assert_eq!(content.content.len(), 6);
        assert!(content.content.iter().all(|b| b.as_block().is_some()));
        assert_eq!(
            content.content[0],
            LessonBlock::Block(ContentBlock::Heading { text: "Introduction".to_string() })
        );
    }

    #[test]
    fn test_unknown_blocks_are_preserved() {
        let raw = json!({"type": "diagram", "mermaid": "graph TD; A-->B"});
        let content: LessonContent =
            serde_json::from_value(json!({"content": [raw.clone()]})).unwrap();

        assert_eq!(content.content, vec![LessonBlock::Unrecognized(raw.clone())]);
        assert_eq!(serde_json::to_value(&content.content[0]).unwrap(), raw);
    }

    #[test]
    fn test_block_serializes_with_type_tag() {
        let block = LessonBlock::from(ContentBlock::Video { query: "rust ownership".to_string() });
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "video", "query": "rust ownership"})
        );
    }
}
