// Exercise content catalog
//
// Practice content is a JSON document of languages, each with its exercises.
// It is parsed once at startup into an immutable catalog indexed by language
// slug and exercise id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::{PipelineError, Result};

/// Root of the content document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseContent {
    #[serde(default)]
    pub languages: Vec<Language>,
}

/// A programming language and its exercises
#[derive(Debug, Clone, Deserialize)]
pub struct Language {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

/// Public view of a language
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct LanguageSummary {
    pub slug: String,
    pub name: String,
    pub version: String,
    pub description: String,
}

/// A single exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub difficulty: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub starter_code: String,
    #[serde(default)]
    pub hints: Vec<String>,
    /// Reference solution, never sent to clients
    #[serde(default, skip_serializing)]
    pub expected_code: String,
}

/// List view of an exercise
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ExerciseSummary {
    pub id: String,
    pub title: String,
    pub difficulty: String,
}

impl From<&Exercise> for ExerciseSummary {
    fn from(exercise: &Exercise) -> Self {
        Self {
            id: exercise.id.clone(),
            title: exercise.title.clone(),
            difficulty: exercise.difficulty.clone(),
        }
    }
}

impl From<&Language> for LanguageSummary {
    fn from(language: &Language) -> Self {
        Self {
            slug: language.slug.clone(),
            name: language.name.clone(),
            version: language.version.clone(),
            description: language.description.clone(),
        }
    }
}

/// Immutable, indexed exercise content
#[derive(Debug, Clone, Default)]
pub struct ExerciseCatalog {
    languages: Vec<Language>,
    /// slug -> index into `languages`
    by_slug: HashMap<String, usize>,
}

impl ExerciseCatalog {
    /// Catalog without any content
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog from parsed content, rejecting duplicate keys
    pub fn new(content: ExerciseContent) -> Result<Self> {
        let mut by_slug = HashMap::with_capacity(content.languages.len());
        for (index, language) in content.languages.iter().enumerate() {
            if by_slug.insert(language.slug.clone(), index).is_some() {
                return Err(PipelineError::content(format!(
                    "duplicate language slug '{}'",
                    language.slug
                )));
            }
            let mut ids = std::collections::HashSet::new();
            for exercise in &language.exercises {
                if !ids.insert(exercise.id.as_str()) {
                    return Err(PipelineError::content(format!(
                        "duplicate exercise id '{}' in language '{}'",
                        exercise.id, language.slug
                    )));
                }
            }
        }

        Ok(Self {
            languages: content.languages,
            by_slug,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let content: ExerciseContent = serde_json::from_str(json)
            .map_err(|e| PipelineError::content(format!("invalid exercise content: {e}")))?;
        Self::new(content)
    }

    /// Load and index a content file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::content(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn languages(&self) -> Vec<LanguageSummary> {
        self.languages.iter().map(LanguageSummary::from).collect()
    }

    pub fn language(&self, slug: &str) -> Option<&Language> {
        self.by_slug.get(slug).map(|&index| &self.languages[index])
    }

    /// Exercise list of a language, `None` if the language is unknown
    pub fn exercises(&self, slug: &str) -> Option<Vec<ExerciseSummary>> {
        self.language(slug)
            .map(|language| language.exercises.iter().map(ExerciseSummary::from).collect())
    }

    pub fn exercise(&self, slug: &str, exercise_id: &str) -> Option<&Exercise> {
        self.language(slug)?
            .exercises
            .iter()
            .find(|exercise| exercise.id == exercise_id)
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}
