use std::fmt;

/// One grade line of a transcript, keyed by module name and attempt number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeRecord {
    pub module: String,
    pub grade: String,
    pub occurrence_index: u32,
}

impl GradeRecord {
    pub fn new(module: impl Into<String>, grade: impl Into<String>, occurrence_index: u32) -> Self {
        Self {
            module: module.into(),
            grade: grade.into(),
            occurrence_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradeStatus {
    #[default]
    New,
    Existing,
}

impl GradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradeStatus::New => "new",
            GradeStatus::Existing => "existing",
        }
    }

    /// Anything other than `"new"` is treated as an existing entry.
    pub fn from_stored(value: &str) -> Self {
        if value == "new" {
            GradeStatus::New
        } else {
            GradeStatus::Existing
        }
    }
}

impl fmt::Display for GradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedGradeEntry {
    pub module: String,
    pub occurrence_index: u32,
    pub grade: String,
    pub status: GradeStatus,
    /// RFC 3339 timestamp of the insert or last grade change.
    pub updated_at: String,
}

impl PersistedGradeEntry {
    pub fn from_record(record: &GradeRecord, updated_at: impl Into<String>) -> Self {
        Self {
            module: record.module.clone(),
            occurrence_index: record.occurrence_index,
            grade: record.grade.clone(),
            status: GradeStatus::New,
            updated_at: updated_at.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created {
        module: String,
        occurrence_index: u32,
        grade: String,
    },
    Updated {
        module: String,
        occurrence_index: u32,
        previous_grade: String,
        grade: String,
    },
}

impl ChangeEvent {
    pub fn module(&self) -> &str {
        match self {
            ChangeEvent::Created { module, .. } | ChangeEvent::Updated { module, .. } => module,
        }
    }

    /// The grade now on record, i.e. what a notification should announce.
    pub fn grade(&self) -> &str {
        match self {
            ChangeEvent::Created { grade, .. } | ChangeEvent::Updated { grade, .. } => grade,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEvent::Created {
                module,
                occurrence_index,
                grade,
            } => write!(f, "new grade: {module} (#{occurrence_index}) - {grade}"),
            ChangeEvent::Updated {
                module,
                occurrence_index,
                previous_grade,
                grade,
            } => write!(
                f,
                "grade updated: {module} (#{occurrence_index}) - {previous_grade} -> {grade}"
            ),
        }
    }
}
