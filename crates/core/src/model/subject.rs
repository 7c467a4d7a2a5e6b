use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{ChapterId, SubjectId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubjectError {
    #[error("subject name cannot be empty")]
    EmptyName,

    #[error("chapter name cannot be empty")]
    EmptyChapterName,

    #[error("duplicate chapter name: {0}")]
    DuplicateChapter(String),

    #[error("invalid persisted chapter state: {0}")]
    InvalidPersistedState(String),
}

//
// ─── CHAPTER ───────────────────────────────────────────────────────────────────
//

/// A trackable unit of reading inside a subject.
///
/// `total` is the target in minutes (0 means no target was set) and `read`
/// the minutes accumulated so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    id: ChapterId,
    name: String,
    total: u32,
    read: f64,
    is_completed: bool,
}

impl Chapter {
    /// Rehydrate a chapter from storage.
    ///
    /// # Errors
    ///
    /// Returns `SubjectError::EmptyChapterName` for a blank name and
    /// `SubjectError::InvalidPersistedState` for a negative or non-finite `read`.
    pub fn from_persisted(
        id: ChapterId,
        name: impl Into<String>,
        total: u32,
        read: f64,
        is_completed: bool,
    ) -> Result<Self, SubjectError> {
        let name = normalize_name(name.into()).ok_or(SubjectError::EmptyChapterName)?;
        if !read.is_finite() || read < 0.0 {
            return Err(SubjectError::InvalidPersistedState(format!(
                "read minutes out of range: {read}"
            )));
        }
        Ok(Self {
            id,
            name,
            total,
            read,
            is_completed,
        })
    }

    #[must_use]
    pub fn id(&self) -> ChapterId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn read(&self) -> f64 {
        self.read
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Fraction of the target read so far, clamped to `[0, 1]`.
    ///
    /// `None` when no target is set.
    #[must_use]
    pub fn progress_ratio(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.read / f64::from(self.total)).clamp(0.0, 1.0))
    }

    /// Adds reading time and recomputes completion.
    ///
    /// Negative or non-finite minutes are ignored so `read` never decreases.
    pub fn add_reading(&mut self, minutes: f64) {
        if minutes.is_finite() && minutes > 0.0 {
            self.read = crate::time::round2(self.read + minutes);
        }
        self.sync_completion();
    }

    // A chapter without a target keeps whatever flag it had.
    fn sync_completion(&mut self) {
        if self.total > 0 {
            self.is_completed = self.read >= f64::from(self.total);
        }
    }
}

/// Selects a chapter inside a subject.
///
/// Prefer `Id`; `Name` exists for callers that only know the display name and
/// stops matching once the chapter is renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterKey {
    Id(ChapterId),
    Name(String),
}

impl ChapterKey {
    #[must_use]
    pub fn matches(&self, chapter: &Chapter) -> bool {
        match self {
            ChapterKey::Id(id) => chapter.id == *id,
            ChapterKey::Name(name) => chapter.name == name.trim(),
        }
    }
}

impl From<ChapterId> for ChapterKey {
    fn from(id: ChapterId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ChapterKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for ChapterKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChapterKey::Id(id) => write!(f, "#{id}"),
            ChapterKey::Name(name) => f.write_str(name),
        }
    }
}

//
// ─── SUBJECT ───────────────────────────────────────────────────────────────────
//

/// User input for a new chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDraft {
    pub name: String,
    pub total: u32,
}

impl ChapterDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, total: u32) -> Self {
        Self {
            name: name.into(),
            total,
        }
    }
}

/// User input for a new subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectDraft {
    pub name: String,
    pub chapters: Vec<ChapterDraft>,
}

impl SubjectDraft {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chapters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_chapter(mut self, name: impl Into<String>, total: u32) -> Self {
        self.chapters.push(ChapterDraft::new(name, total));
        self
    }

    /// Validate the draft into a subject with fresh chapters.
    ///
    /// Chapter ids are assigned `1..=n` in draft order.
    ///
    /// # Errors
    ///
    /// Returns `SubjectError` for a blank subject or chapter name, or a
    /// chapter name used twice.
    pub fn validate(
        self,
        id: SubjectId,
        created_at: DateTime<Utc>,
    ) -> Result<Subject, SubjectError> {
        let name = normalize_name(self.name).ok_or(SubjectError::EmptyName)?;

        let mut seen = HashSet::new();
        let mut chapters = Vec::with_capacity(self.chapters.len());
        for (idx, draft) in self.chapters.into_iter().enumerate() {
            let chapter_name =
                normalize_name(draft.name).ok_or(SubjectError::EmptyChapterName)?;
            if !seen.insert(chapter_name.clone()) {
                return Err(SubjectError::DuplicateChapter(chapter_name));
            }
            chapters.push(Chapter {
                id: ChapterId::new(idx as u64 + 1),
                name: chapter_name,
                total: draft.total,
                read: 0.0,
                is_completed: false,
            });
        }

        Ok(Subject {
            id,
            name,
            chapters,
            created_at,
        })
    }
}

/// A study topic owned by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    id: SubjectId,
    name: String,
    chapters: Vec<Chapter>,
    created_at: DateTime<Utc>,
}

impl Subject {
    /// Rehydrate a subject from storage.
    ///
    /// # Errors
    ///
    /// Returns `SubjectError` if the name is blank or chapter names collide.
    pub fn from_persisted(
        id: SubjectId,
        name: impl Into<String>,
        chapters: Vec<Chapter>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SubjectError> {
        let name = normalize_name(name.into()).ok_or(SubjectError::EmptyName)?;
        let mut seen = HashSet::new();
        for chapter in &chapters {
            if !seen.insert(chapter.name.as_str()) {
                return Err(SubjectError::DuplicateChapter(chapter.name.clone()));
            }
        }
        Ok(Self {
            id,
            name,
            chapters,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> SubjectId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn chapter(&self, key: &ChapterKey) -> Option<&Chapter> {
        self.chapters.iter().find(|c| key.matches(c))
    }

    /// Number of chapters marked complete.
    #[must_use]
    pub fn completed_chapters(&self) -> usize {
        self.chapters.iter().filter(|c| c.is_completed).count()
    }

    /// Adds `minutes` to the chapter selected by `key`.
    ///
    /// Other chapters are left untouched. Returns the updated chapter, or
    /// `None` when no chapter matched.
    pub fn apply_reading(&mut self, key: &ChapterKey, minutes: f64) -> Option<&Chapter> {
        let chapter = self.chapters.iter_mut().find(|c| key.matches(c))?;
        chapter.add_reading(minutes);
        Some(chapter)
    }
}

fn normalize_name(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn algebra() -> Subject {
        let chapter =
            Chapter::from_persisted(ChapterId::new(1), "Algebra", 100, 40.0, false).unwrap();
        let other =
            Chapter::from_persisted(ChapterId::new(2), "Geometry", 50, 10.0, false).unwrap();
        Subject::from_persisted(SubjectId::new(1), "Math", vec![chapter, other], fixed_now())
            .unwrap()
    }

    #[test]
    fn draft_assigns_sequential_chapter_ids() {
        let subject = SubjectDraft::new("  Physics ")
            .with_chapter("Kinematics", 60)
            .with_chapter("Dynamics", 0)
            .validate(SubjectId::new(3), fixed_now())
            .unwrap();

        assert_eq!(subject.name(), "Physics");
        assert_eq!(subject.chapters()[0].id(), ChapterId::new(1));
        assert_eq!(subject.chapters()[1].id(), ChapterId::new(2));
        assert!(subject.chapters().iter().all(|c| c.read() == 0.0));
    }

    #[test]
    fn draft_rejects_duplicate_chapters() {
        let err = SubjectDraft::new("Physics")
            .with_chapter("Optics", 10)
            .with_chapter(" Optics", 20)
            .validate(SubjectId::new(1), fixed_now())
            .unwrap_err();
        assert_eq!(err, SubjectError::DuplicateChapter("Optics".into()));
    }

    #[test]
    fn draft_rejects_blank_names() {
        let err = SubjectDraft::new(" ")
            .validate(SubjectId::new(1), fixed_now())
            .unwrap_err();
        assert_eq!(err, SubjectError::EmptyName);

        let err = SubjectDraft::new("Physics")
            .with_chapter("", 10)
            .validate(SubjectId::new(1), fixed_now())
            .unwrap_err();
        assert_eq!(err, SubjectError::EmptyChapterName);
    }

    #[test]
    fn reading_accumulates_and_completes_at_target() {
        let mut subject = algebra();
        let key = ChapterKey::from("Algebra");

        let chapter = subject.apply_reading(&key, 30.0).unwrap();
        assert!((chapter.read() - 70.0).abs() < 1e-9);
        assert!(!chapter.is_completed());

        let chapter = subject.apply_reading(&key, 30.0).unwrap();
        assert!((chapter.read() - 100.0).abs() < 1e-9);
        assert!(chapter.is_completed());

        let untouched = subject.chapter(&ChapterKey::Id(ChapterId::new(2))).unwrap();
        assert!((untouched.read() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn chapter_without_target_is_never_auto_completed() {
        let mut chapter =
            Chapter::from_persisted(ChapterId::new(1), "Notes", 0, 0.0, false).unwrap();
        chapter.add_reading(500.0);
        assert!(!chapter.is_completed());
        assert_eq!(chapter.progress_ratio(), None);
    }

    #[test]
    fn negative_reading_is_ignored() {
        let mut chapter =
            Chapter::from_persisted(ChapterId::new(1), "Notes", 10, 5.0, false).unwrap();
        chapter.add_reading(-3.0);
        chapter.add_reading(f64::NAN);
        assert!((chapter.read() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_chapter_leaves_subject_unchanged() {
        let mut subject = algebra();
        let before = subject.clone();
        assert!(subject.apply_reading(&ChapterKey::from("Calculus"), 10.0).is_none());
        assert_eq!(subject, before);
    }

    #[test]
    fn counts_completed_chapters() {
        let done = Chapter::from_persisted(ChapterId::new(1), "A", 10, 10.0, true).unwrap();
        let open = Chapter::from_persisted(ChapterId::new(2), "B", 10, 1.0, false).unwrap();
        let subject =
            Subject::from_persisted(SubjectId::new(1), "S", vec![done, open], fixed_now()).unwrap();
        assert_eq!(subject.completed_chapters(), 1);
    }

    #[test]
    fn persisted_chapter_with_bad_read_is_rejected() {
        let err = Chapter::from_persisted(ChapterId::new(1), "A", 10, -1.0, false).unwrap_err();
        assert!(matches!(err, SubjectError::InvalidPersistedState(_)));
        assert!(Chapter::from_persisted(ChapterId::new(1), "A", 10, f64::INFINITY, false).is_err());
    }
}
