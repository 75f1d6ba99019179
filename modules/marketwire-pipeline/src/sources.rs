// Default feed list for AI market news ingestion.
// Verified working feeds, last checked 2026-02-25.

use marketwire_common::{SourceCategory, SourceConfig, SourceKind};

pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        source(
            "Bloomberg Technology",
            "https://feeds.bloomberg.com/technology/news.rss",
            SourceCategory::Finance,
        ),
        source(
            "TechCrunch AI",
            "https://techcrunch.com/category/artificial-intelligence/feed/",
            SourceCategory::AiSpecific,
        ),
        source(
            "AI Business",
            "https://aibusiness.com/rss.xml",
            SourceCategory::AiSpecific,
        ),
        source(
            "The Decoder",
            "https://the-decoder.com/feed/",
            SourceCategory::AiSpecific,
        ),
        source(
            "MIT Technology Review AI",
            "https://www.technologyreview.com/topic/artificial-intelligence/feed",
            SourceCategory::AiSpecific,
        ),
        source(
            "The Verge AI",
            "https://www.theverge.com/rss/ai-artificial-intelligence/index.xml",
            SourceCategory::AiSpecific,
        ),
        source(
            "VentureBeat AI",
            "https://venturebeat.com/category/ai/feed/",
            SourceCategory::AiSpecific,
        ),
    ]
}

fn source(name: &str, url: &str, category: SourceCategory) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        kind: SourceKind::Rss,
        category,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn source_names_are_unique() {
        let sources = default_sources();
        let names: HashSet<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), sources.len());
    }

    #[test]
    fn source_urls_are_unique_and_absolute() {
        let sources = default_sources();
        let urls: HashSet<_> = sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls.len(), sources.len());
        for url in urls {
            assert!(url.starts_with("https://"), "not an absolute URL: {url}");
        }
    }

    #[test]
    fn all_sources_are_rss() {
        for s in default_sources() {
            assert_eq!(s.kind, SourceKind::Rss);
        }
    }
}
