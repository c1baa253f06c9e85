//! Context resolution: course lookup and system-instruction synthesis.
//!
//! Course identifiers arrive from links and therefore show up with every
//! combination of URL-encoding, capitalization and accents. Normalization
//! canonicalizes them before the catalog lookup so `"Física"`, `"FISICA"`
//! and `"F%C3%ADsica"` all resolve to the same course.

use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::courses::CourseCatalog;
use crate::profile::ProfileStore;

/// Fallback user name when nothing explicit or cached is available.
pub const DEFAULT_USER_NAME: &str = "Usuario";

/// Prefix phrase stripped from course identifiers before lookup.
const COURSE_PREFIX: &str = "asistente virtual";

/// Normalize a course name for catalog lookup.
///
/// URL-decodes, trims, strips the `"Asistente Virtual"` prefix
/// (case-insensitively), removes stray `%` characters, drops Unicode
/// combining marks (NFD) and lower-cases. Idempotent. Returns `None` for an
/// empty input.
pub fn normalize_course_name(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }

    let decoded = match urlencoding::decode(name) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => name.to_string(),
    };
    let trimmed = decoded.trim();

    let stripped = match trimmed.get(..COURSE_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(COURSE_PREFIX) => {
            trimmed[COURSE_PREFIX.len()..].trim_start()
        }
        _ => trimmed,
    };

    let normalized: String = stripped
        .chars()
        .filter(|c| *c != '%')
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    Some(normalized)
}

/// Outcome of context resolution for one request.
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    /// Synthesized system instruction for this turn.
    pub system_instruction: String,

    /// User name used in the instruction (explicit, cached, or the default).
    pub user_name: String,

    /// Whether the name came from an explicit or cached value rather than
    /// the default. Only a known name earns the first-delta greeting.
    pub name_known: bool,

    /// Raw course identifier, as supplied or cached (possibly empty).
    pub course_raw: String,

    /// Normalized course identifier, `None` when no course is known.
    pub course_normalized: Option<String>,

    /// Whether the catalog had a configuration for the course.
    pub course_found: bool,
}

/// Resolves the active course configuration and system instruction.
pub struct ContextResolver {
    catalog: CourseCatalog,
    profile: ProfileStore,
}

impl ContextResolver {
    /// Create a resolver over a catalog and a profile cache.
    pub fn new(catalog: CourseCatalog, profile: ProfileStore) -> Self {
        Self { catalog, profile }
    }

    /// The course catalog this resolver consults.
    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    /// The profile cache this resolver reads and writes.
    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    /// Resolve the system instruction for one turn.
    ///
    /// Explicit values are written back to the profile cache; absent values
    /// fall back to the cache, then to defaults. A course with no catalog
    /// entry is not an error: the generic fallback instruction echoes the
    /// raw identifier back for transparency.
    pub fn resolve(
        &self,
        user_name: Option<&str>,
        course_id: Option<&str>,
        first_turn: bool,
    ) -> ResolvedContext {
        let (final_name, name_known) = match user_name.map(str::trim) {
            Some(name) if !name.is_empty() => {
                self.profile.remember_user_name(name);
                (name.to_string(), true)
            }
            _ => match self.profile.cached_user_name() {
                Some(cached) => (cached.trim().to_string(), true),
                None => (DEFAULT_USER_NAME.to_string(), false),
            },
        };

        let final_course = match course_id.map(str::trim) {
            Some(course) if !course.is_empty() => {
                self.profile.remember_course_name(course);
                course.to_string()
            }
            _ => self.profile.cached_course_name().unwrap_or_default(),
        };

        let course_normalized = normalize_course_name(&final_course);
        debug!("Resolved course {final_course:?} as {course_normalized:?}");

        let course = course_normalized
            .as_deref()
            .and_then(|normalized| self.catalog.find_normalized(normalized));

        let system_instruction = match course {
            Some(config) => {
                if first_turn {
                    format!(
                        "El nombre del usuario es {final_name}, siempre saluda por su nombre y \
                         en los mensajes refiérete al usuario usando su nombre. Este es el \
                         asistente de la asignatura \"{}\". {}",
                        config.name, config.instructions
                    )
                } else {
                    config.instructions.clone()
                }
            }
            None => {
                warn!("No configuration found for course: {course_normalized:?}");
                if first_turn {
                    format!(
                        "El nombre del usuario es {final_name}. Siempre saluda por su nombre en \
                         cada mensaje. No se encontró configuración para el curso {final_course}. \
                         Continúa respondiendo la última pregunta del usuario y refiérete siempre \
                         a él por su nombre {final_name}."
                    )
                } else {
                    format!(
                        "No se encontró configuración para el curso {final_course}. Continúa \
                         respondiendo la última pregunta del usuario."
                    )
                }
            }
        };

        ResolvedContext {
            system_instruction,
            user_name: final_name,
            name_known,
            course_raw: final_course,
            course_normalized,
            course_found: course.is_some(),
        }
    }
}
