use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

/// Which id space an unknown id was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Item,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Item => "item",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("Unknown {kind}: {id}")]
    UnknownEntity { kind: EntityKind, id: u32 },

    #[error("Unknown or unrealized distance metric: {0}")]
    UnknownMetric(String),

    #[error("No ratings for item {0}")]
    NoRatings(u32),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RecommendError {
    pub fn unknown_user(id: u32) -> Self {
        RecommendError::UnknownEntity {
            kind: EntityKind::User,
            id,
        }
    }

    pub fn unknown_item(id: u32) -> Self {
        RecommendError::UnknownEntity {
            kind: EntityKind::Item,
            id,
        }
    }
}

impl From<serde_json::Error> for RecommendError {
    fn from(err: serde_json::Error) -> Self {
        RecommendError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for RecommendError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map_or(0, |pos| pos.line() as usize);
        match err.into_kind() {
            csv::ErrorKind::Io(e) => RecommendError::Io(e),
            kind => RecommendError::Parse {
                line,
                reason: format!("{:?}", kind),
            },
        }
    }
}

impl From<envy::Error> for RecommendError {
    fn from(err: envy::Error) -> Self {
        RecommendError::Config(err.to_string())
    }
}
