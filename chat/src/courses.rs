//! Static per-course configuration catalog.
//!
//! The catalog is supplied by the embedder (from code or a JSON document),
//! loaded once at startup, and immutable afterwards. Lookups compare
//! normalized names, so `"Física"`, `"FISICA"` and `"f%C3%ADsica"` all
//! resolve to the same entry.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::normalize_course_name;
use crate::error::{ChatError, Result};

/// Instructions for one course assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Canonical course name, as displayed to users.
    pub name: String,

    /// System instructions for the course assistant.
    pub instructions: String,
}

impl CourseConfig {
    /// Create a new course configuration.
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
        }
    }
}

/// Ordered, immutable set of course configurations.
#[derive(Debug, Clone, Default)]
pub struct CourseCatalog {
    courses: Vec<CourseConfig>,
}

impl CourseCatalog {
    /// Build a catalog from an ordered list of configurations.
    pub fn from_courses(courses: Vec<CourseConfig>) -> Self {
        Self { courses }
    }

    /// Parse a catalog from a JSON document of `[{ "name", "instructions" }]`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let courses: Vec<CourseConfig> =
            serde_json::from_str(json).map_err(|e| ChatError::Catalog(e.to_string()))?;
        Ok(Self { courses })
    }

    /// Load a catalog from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Find a course whose normalized name equals `normalized`.
    ///
    /// Linear scan in catalog order; the first match wins.
    pub fn find_normalized(&self, normalized: &str) -> Option<&CourseConfig> {
        self.courses
            .iter()
            .find(|course| normalize_course_name(&course.name).as_deref() == Some(normalized))
    }

    /// Iterate over the configurations in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &CourseConfig> {
        self.courses.iter()
    }

    /// Number of configured courses.
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}
