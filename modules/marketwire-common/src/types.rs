use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source configuration
// ---------------------------------------------------------------------------

/// How a source's content is retrieved. Only feed syndication today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
        }
    }
}

/// Editorial grouping of a source, used for curation rather than filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceCategory {
    AiSpecific,
    GeneralTech,
    Finance,
}

impl SourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::AiSpecific => "ai-specific",
            SourceCategory::GeneralTech => "general-tech",
            SourceCategory::Finance => "finance",
        }
    }
}

/// A configured feed endpoint. Identified by its canonical URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub category: SourceCategory,
}

// ---------------------------------------------------------------------------
// Fetched items
// ---------------------------------------------------------------------------

/// One normalised feed entry, before deduplication.
#[derive(Debug, Clone)]
pub struct FetchedItem {
    pub source_name: String,
    pub source_url: String,
    pub external_id: Option<String>,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub url: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A per-source fetch failure. Collected, never fatal to the run.
#[derive(Debug, Clone)]
pub struct FeedError {
    pub source: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Article categories
// ---------------------------------------------------------------------------

/// The fixed category taxonomy for published articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Infrastructure,
    Regulation,
    Applications,
    Chips,
    Models,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Infrastructure,
        Category::Regulation,
        Category::Applications,
        Category::Chips,
        Category::Models,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Category::Infrastructure => "infrastructure",
            Category::Regulation => "regulation",
            Category::Applications => "applications",
            Category::Chips => "chips",
            Category::Models => "models",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Infrastructure => "Infrastructure",
            Category::Regulation => "Regulation",
            Category::Applications => "Applications",
            Category::Chips => "Chips",
            Category::Models => "Models",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Category::ALL.iter().copied().find(|c| c.slug() == slug)
    }
}

// ---------------------------------------------------------------------------
// Run statistics
// ---------------------------------------------------------------------------

/// Aggregate stats from one pipeline run.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub fetched: u32,
    pub feed_errors: u32,
    pub stored: u32,
    pub duplicates_skipped: u32,
    pub scored: u32,
    pub published: u32,
    pub rejected: u32,
    pub errored: u32,
    pub elapsed_seconds: f64,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Ingest Run Complete ===")?;
        writeln!(f, "Fetched:            {}", self.fetched)?;
        writeln!(f, "Feed errors:        {}", self.feed_errors)?;
        writeln!(f, "Stored:             {}", self.stored)?;
        writeln!(f, "Duplicates skipped: {}", self.duplicates_skipped)?;
        writeln!(f, "Scored:             {}", self.scored)?;
        writeln!(f, "Published:          {}", self.published)?;
        writeln!(f, "Rejected:           {}", self.rejected)?;
        writeln!(f, "Errored:            {}", self.errored)?;
        write!(f, "Elapsed:            {:.1}s", self.elapsed_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_slug_round_trip() {
        for cat in Category::ALL {
            assert_eq!(Category::from_slug(cat.slug()), Some(cat));
        }
        assert_eq!(Category::from_slug("blockchain"), None);
    }
}
