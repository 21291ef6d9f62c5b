//! Lesson narration: a speakable script built from a lesson's blocks,
//! optionally translated by the model.

use crate::llm::generation::{CourseGenerator, GenerationError};
use crate::models::{ContentBlock, Lesson, LessonBlock};
use serde::{Deserialize, Serialize};

/// Narration of one lesson in one language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narration {
    pub lesson_id: u64,
    pub language: String,
    pub script: String,
}

/// Flatten a lesson into plain text suitable for text-to-speech.
///
/// Video and code blocks are skipped; quizzes are read as questions with
/// their options.
pub fn narration_script(lesson: &Lesson) -> String {
    let mut parts = vec![lesson.title.clone()];

    if !lesson.objectives.is_empty() {
        parts.push(format!("In this lesson you will: {}.", lesson.objectives.join("; ")));
    }

    for block in lesson.content.iter().filter_map(LessonBlock::as_block) {
        match block {
            ContentBlock::Heading { text } | ContentBlock::Paragraph { text } => parts.push(text.clone()),
            ContentBlock::List { items } => parts.extend(items.iter().cloned()),
            ContentBlock::Quiz { questions } => {
                for question in questions {
                    parts.push(format!(
                        "Question: {} Options: {}.",
                        question.question,
                        question.options.join(", ")
                    ));
                }
            }
            ContentBlock::Video { .. } | ContentBlock::Code { .. } => {}
        }
    }

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_english(language: &str) -> bool {
    matches!(language.trim().to_lowercase().as_str(), "" | "en" | "en-us" | "en-gb" | "english")
}

/// Build the narration for `lesson` in `language`, translating when needed
pub async fn narrate_lesson(
    generator: &CourseGenerator,
    lesson: &Lesson,
    language: &str,
) -> Result<Narration, GenerationError> {
    let script = narration_script(lesson);
    let script = if is_english(language) {
        script
    } else {
        generator.translate(&script, language.trim()).await?
    };

    Ok(Narration {
        lesson_id: lesson.id,
        language: if language.trim().is_empty() { "en".to_string() } else { language.trim().to_string() },
        script,
    })
}
