use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{Course, CourseOutline, CourseSummary, Lesson, LessonContent, Module, NewCourse};

/// Errors from the course store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Course, module and lesson titles a lesson belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonContext {
    pub course_id: u64,
    pub course_title: String,
    pub module_title: String,
    pub lesson: Lesson,
}

/// Highest id handed out per entity kind, persisted so deleted ids are never reused
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Counters {
    course: u64,
    module: u64,
    lesson: u64,
}

impl Counters {
    fn observe(&mut self, course: &Course) {
        self.course = self.course.max(course.id);
        for module in &course.modules {
            self.module = self.module.max(module.id);
            for lesson in &module.lessons {
                self.lesson = self.lesson.max(lesson.id);
            }
        }
    }
}

#[derive(Debug, Default)]
struct StoreData {
    courses: BTreeMap<u64, Course>,
    counters: Counters,
}

/// JSON-file backed store for generated courses
#[derive(Debug, Clone)]
pub struct CourseStore {
    /// Directory holding one file per course plus the id counters
    courses_dir: PathBuf,

    /// In-memory cache (thread-safe)
    data: Arc<RwLock<StoreData>>,
}

impl CourseStore {
    /// Open a store rooted at `data_dir`, loading any existing courses
    pub async fn new(data_dir: &Path) -> StoreResult<Self> {
        let courses_dir = data_dir.join("courses");
        fs::create_dir_all(&courses_dir).await?;

        let store = Self {
            courses_dir,
            data: Arc::new(RwLock::new(StoreData::default())),
        };
        store.load_existing_courses().await?;

        let count = store.data.read().await.courses.len();
        info!("📚 Course store initialized with {} courses", count);

        Ok(store)
    }

    async fn load_existing_courses(&self) -> StoreResult<()> {
        let mut entries = fs::read_dir(&self.courses_dir).await?;
        let mut data = self.data.write().await;

        let counters_path = self.counters_path();
        if counters_path.exists() {
            let content = fs::read_to_string(&counters_path).await?;
            data.counters = serde_json::from_str(&content)?;
        }

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_course_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.starts_with("course_") && name.ends_with(".json"));
            if is_course_file {
                match Self::load_course_file(&path).await {
                    Ok(course) => {
                        data.counters.observe(&course);
                        data.courses.insert(course.id, course);
                    }
                    Err(e) => warn!("Failed to load course file {}: {}", path.display(), e),
                }
            }
        }

        debug!("📁 Loaded {} course files from disk", data.courses.len());
        Ok(())
    }

    async fn load_course_file(path: &Path) -> StoreResult<Course> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    fn course_path(&self, id: u64) -> PathBuf {
        self.courses_dir.join(format!("course_{}.json", id))
    }

    fn counters_path(&self) -> PathBuf {
        self.courses_dir.join("_counters.json")
    }

    async fn save_counters(&self, counters: &Counters) -> StoreResult<()> {
        fs::write(self.counters_path(), serde_json::to_string_pretty(counters)?).await?;
        Ok(())
    }

    async fn save_course(&self, course: &Course) -> StoreResult<()> {
        let json_content = serde_json::to_string_pretty(course)?;
        fs::write(self.course_path(course.id), json_content).await?;
        debug!("💾 Saved course {}", course.id);
        Ok(())
    }

    /// Create a course from a generated outline.
    ///
    /// `contents` maps `(module index, lesson index)` to generated lesson
    /// content; lessons without an entry become empty placeholders.
    pub async fn create_from_outline(
        &self,
        outline: &CourseOutline,
        creator: Option<String>,
        mut contents: HashMap<(usize, usize), LessonContent>,
    ) -> StoreResult<Course> {
        let now = Utc::now();
        let mut data = self.data.write().await;
        let mut counters = data.counters.clone();

        counters.course += 1;
        let course_id = counters.course;

        let mut modules = Vec::with_capacity(outline.modules.len());
        for (module_index, module_outline) in outline.modules.iter().enumerate() {
            counters.module += 1;
            let module_id = counters.module;

            let mut lessons = Vec::with_capacity(module_outline.lessons.len());
            for (lesson_index, lesson_title) in module_outline.lessons.iter().enumerate() {
                counters.lesson += 1;
                let generated = contents.remove(&(module_index, lesson_index));
                lessons.push(Lesson {
                    id: counters.lesson,
                    title: lesson_title.clone(),
                    is_enriched: generated.is_some(),
                    objectives: generated.as_ref().map(|c| c.objectives.clone()).unwrap_or_default(),
                    content: generated.map(|c| c.content).unwrap_or_default(),
                    order: lesson_index as u32,
                    created_at: now,
                });
            }

            modules.push(Module {
                id: module_id,
                title: module_outline.title.clone(),
                order: module_index as u32,
                lessons,
                created_at: now,
            });
        }

        let course = Course {
            id: course_id,
            title: outline.title.clone(),
            description: outline.description.clone(),
            creator,
            tags: outline.tags.clone(),
            modules,
            created_at: now,
            updated_at: now,
        };

        // Counters first: a failed course write only skips ids
        self.save_counters(&counters).await?;
        data.counters = counters;
        self.save_course(&course).await?;
        data.courses.insert(course.id, course.clone());

        info!("🆕 Created course {} \"{}\"", course.id, course.title);
        Ok(course)
    }

    /// Create an empty course from user-supplied fields
    pub async fn create_course(&self, new_course: NewCourse, creator: Option<String>) -> StoreResult<Course> {
        let outline = CourseOutline {
            title: new_course.title,
            description: new_course.description,
            tags: new_course.tags,
            modules: Vec::new(),
        };
        self.create_from_outline(&outline, creator, HashMap::new()).await
    }

    /// Course summaries, newest first
    pub async fn list_courses(&self) -> Vec<CourseSummary> {
        let data = self.data.read().await;
        let mut summaries: Vec<CourseSummary> = data.courses.values().map(CourseSummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        summaries
    }

    pub async fn get_course(&self, id: u64) -> StoreResult<Course> {
        self.data
            .read()
            .await
            .courses
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("Course".to_string()))
    }

    pub async fn delete_course(&self, id: u64) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if !data.courses.contains_key(&id) {
            return Err(StoreError::NotFound("Course".to_string()));
        }

        let path = self.course_path(id);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        data.courses.remove(&id);

        info!("🗑️ Deleted course {}", id);
        Ok(())
    }

    pub async fn list_modules(&self) -> Vec<Module> {
        let data = self.data.read().await;
        data.courses
            .values()
            .flat_map(|c| c.modules.iter().cloned())
            .collect()
    }

    pub async fn get_module(&self, id: u64) -> StoreResult<Module> {
        let data = self.data.read().await;
        data.courses
            .values()
            .flat_map(|c| c.modules.iter())
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("Module".to_string()))
    }

    pub async fn list_lessons(&self) -> Vec<Lesson> {
        let data = self.data.read().await;
        data.courses
            .values()
            .flat_map(|c| c.modules.iter())
            .flat_map(|m| m.lessons.iter().cloned())
            .collect()
    }

    pub async fn get_lesson(&self, id: u64) -> StoreResult<Lesson> {
        self.lesson_context(id).await.map(|ctx| ctx.lesson)
    }

    /// Look up a lesson together with its course and module titles
    pub async fn lesson_context(&self, lesson_id: u64) -> StoreResult<LessonContext> {
        let data = self.data.read().await;
        for course in data.courses.values() {
            for module in &course.modules {
                if let Some(lesson) = module.lessons.iter().find(|l| l.id == lesson_id) {
                    return Ok(LessonContext {
                        course_id: course.id,
                        course_title: course.title.clone(),
                        module_title: module.title.clone(),
                        lesson: lesson.clone(),
                    });
                }
            }
        }
        Err(StoreError::NotFound("Lesson".to_string()))
    }

    /// Attach generated content to a lesson and mark it enriched
    pub async fn enrich_lesson(&self, lesson_id: u64, content: LessonContent) -> StoreResult<Lesson> {
        let mut data = self.data.write().await;

        let mut course = data
            .courses
            .values()
            .find(|c| c.modules.iter().any(|m| m.lessons.iter().any(|l| l.id == lesson_id)))
            .cloned()
            .ok_or_else(|| StoreError::NotFound("Lesson".to_string()))?;

        let lesson = course
            .modules
            .iter_mut()
            .flat_map(|m| m.lessons.iter_mut())
            .find(|l| l.id == lesson_id)
            .ok_or_else(|| StoreError::NotFound("Lesson".to_string()))?;

        lesson.content = content.content;
        lesson.objectives = content.objectives;
        lesson.is_enriched = true;
        let updated = lesson.clone();
        course.updated_at = Utc::now();

        // The cache only changes once the file is written
        self.save_course(&course).await?;
        let course_id = course.id;
        data.courses.insert(course_id, course);

        debug!("Enriched lesson {} in course {}", lesson_id, course_id);
        Ok(updated)
    }
}
