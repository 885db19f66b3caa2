//! Keyword filtering that turns raw article text into opinion-dense excerpts,
//! and the source picker that decides which articles are worth reading.

use regex::Regex;
use similar::TextDiff;
use std::collections::HashSet;

use crate::services::providers::{reader::is_unreadable, WebResult};

const OPINION_KEYWORDS: &[&str] = &[
    // sentiment
    "loved", "amazing", "masterpiece", "brilliant", "stunning", "best", "incredible", "perfect",
    "must watch", "blown away", "captivating", "gripping", "phenomenal", "outstanding", "superb",
    "heartfelt", "moving", "beautifully", "powerful", "compelling", "enjoyable", "entertaining",
    "engaging", "solid", "decent", "touching", "emotional", "hilarious", "funny", "laugh", "cried",
    "tears", "iconic", "memorable", "boring", "terrible", "waste", "disappointed", "awful", "worst",
    "overrated", "mediocre", "skip", "dragged", "cringe", "forgettable", "predictable", "shallow",
    "annoying", "tedious", "unwatchable", "laughable", "weak", "bland", "generic", "cliché",
    "messy", "disappointing", "frustrating", "pointless", "underwhelming", "pretentious",
    // first-person framing
    "i think", "i felt", "in my opinion", "honestly", "the problem is", "what works",
    "what doesn't", "my take", "genuinely", "surprisingly", "unfortunately", "have to say",
    "worth watching", "not worth", "worth your time", "don't bother", "waste of time",
    "highly recommend",
    // craft
    "acting", "writing", "pacing", "cinematography", "directing", "direction", "screenplay",
    "script", "dialogue", "visuals", "visual style", "shot beautifully", "editing", "score",
    "soundtrack", "music", "performances", "performance", "chemistry", "casting", "atmosphere",
    "tone", "world-building", "character development", "special effects", "vfx", "cgi",
    "storyline", "plot was", "plot is", "story was", "story is", "ending was", "ending is",
    "third act", "finale",
    // ratings
    "recommend", "worth", "stream", "watch", "avoid", "rating", "/10", "out of 10", "out of 5",
    "stars", "verdict", "thumbs up", "thumbs down", "must-see", "must see", "grade",
    // comparison
    "oscar", "academy award", "nominated", "award", "best picture", "underrated", "overhyped",
    "underhyped", "better than", "worse than", "compared to", "reminds me of",
];

/// Enough on their own to keep a one-line paragraph
const STRONG_KEYWORDS: &[&str] = &[
    "masterpiece", "terrible", "brilliant", "awful", "boring", "amazing", "loved", "hated",
    "worst", "best", "perfect", "garbage", "waste", "must-see", "must see", "skip", "avoid",
    "incredible", "stunning", "phenomenal", "unwatchable", "heartbreaking", "hilarious", "10/10",
    "0/10", "5/5",
];

/// Plot summaries, credits, promos and page chrome
const DISCARD_SIGNALS: &[&str] = &[
    "release date", "released on", "premieres on", "the story follows", "the film tells",
    "synopsis", "the plot centers", "the movie follows", "the series follows", "cast includes",
    "produced by", "directed by", "written by", "stars include", "executive producer",
    "showrunner", "box office", "trailer", "now streaming on", "available on", "subscribe to",
    "click here", "read more", "sign up", "affiliate link", "sponsored", "advertisement",
    "copyright", "all rights reserved", "terms of service", "privacy policy", "cookie policy",
    "related articles", "you may also like", "share this", "leave a comment",
    "table of contents", "jump to", "runtime", "rated pg", "rated r", "certificate",
];

pub const MAX_PARAGRAPHS: usize = 40;
pub const PARAGRAPH_SEPARATOR: &str = "\n\n---\n\n";

const MIN_PARAGRAPH_CHARS: usize = 30;
const MAX_PARAGRAPH_CHARS: usize = 2000;
const SHORT_PARAGRAPH_CHARS: usize = 100;
const DUPLICATE_RATIO: f32 = 0.8;
const DUPLICATE_PREFIX_CHARS: usize = 200;

fn hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| text.contains(*kw)).count()
}

/// Keyword hit count for a paragraph worth keeping, `None` otherwise
fn score_paragraph(paragraph: &str) -> Option<usize> {
    let len = paragraph.chars().count();
    if !(MIN_PARAGRAPH_CHARS..=MAX_PARAGRAPH_CHARS).contains(&len) {
        return None;
    }

    let lower = paragraph.to_lowercase();
    if hits(&lower, DISCARD_SIGNALS) > 0 {
        return None;
    }

    let keyword_hits = hits(&lower, OPINION_KEYWORDS);
    let relevant = if len > SHORT_PARAGRAPH_CHARS {
        keyword_hits >= 1
    } else {
        hits(&lower, STRONG_KEYWORDS) >= 1
    };

    relevant.then_some(keyword_hits)
}

fn prefix(text: &str) -> String {
    text.chars()
        .take(DUPLICATE_PREFIX_CHARS)
        .collect::<String>()
        .to_lowercase()
}

fn is_near_duplicate(candidate: &str, existing: &str) -> bool {
    let (a, b) = (candidate.chars().count(), existing.chars().count());
    let longest = a.max(b).max(1);
    if a.abs_diff(b) as f32 / longest as f32 > 0.5 {
        return false;
    }
    let (pa, pb) = (prefix(candidate), prefix(existing));
    TextDiff::from_chars(pa.as_str(), pb.as_str()).ratio() > DUPLICATE_RATIO
}

fn deduplicate(paragraphs: Vec<&str>) -> Vec<&str> {
    let mut unique: Vec<&str> = Vec::new();
    for paragraph in paragraphs {
        if !unique.iter().any(|kept| is_near_duplicate(paragraph, kept)) {
            unique.push(paragraph);
        }
    }
    unique
}

/// Keeps the most opinion-rich paragraphs across all articles
pub fn extract_opinions(articles: &[String], max_paragraphs: usize) -> String {
    let mut relevant: Vec<(usize, &str)> = articles
        .iter()
        .flat_map(|article| article.split("\n\n"))
        .map(str::trim)
        .filter_map(|p| score_paragraph(p).map(|score| (score, p)))
        .collect();

    // Stable, so equally scored paragraphs keep reading order
    relevant.sort_by(|a, b| b.0.cmp(&a.0));

    let unique = deduplicate(relevant.into_iter().map(|(_, p)| p).collect());
    unique
        .into_iter()
        .take(max_paragraphs)
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR)
}

const CRITIC_DOMAINS: &[&str] = &[
    "collider", "ign", "screenrant", "variety", "vulture", "avclub", "indiewire", "deadline",
    "ew.com", "empireonline", "theguardian", "hollywoodreporter", "theplaylist", "slashfilm",
    "cinemablend", "filmschoolrejects", "thefilmstage", "playlist", "theringer", "polygon",
];

pub const MAX_SOURCES: usize = 15;
const MAX_BACKFILL: usize = 6;
const MIN_RELEVANT_RESULTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Critic,
    Reddit,
    UserReview,
    Other,
}

pub fn classify(url: &str) -> SourceKind {
    let url = url.to_lowercase();
    if url.contains("reddit.com") {
        SourceKind::Reddit
    } else if CRITIC_DOMAINS.iter().any(|d| url.contains(d)) {
        SourceKind::Critic
    } else if url.contains("letterboxd") {
        SourceKind::UserReview
    } else {
        SourceKind::Other
    }
}

/// URL identity ignoring a trailing slash and fragment
pub fn normalize_url(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment.trim_end_matches('/')
}

/// URLs chosen for reading, plus non-Reddit extras for when reads fail
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSelection {
    pub selected: Vec<String>,
    pub backfill: Vec<String>,
}

fn mentions_title(result: &WebResult, title: &str, short_title: Option<&Regex>) -> bool {
    let fields = [
        result.title.to_lowercase(),
        result.snippet.to_lowercase(),
        result.link.to_lowercase(),
    ];
    match short_title {
        Some(pattern) => fields.iter().any(|f| pattern.is_match(f)),
        None => fields.iter().any(|f| f.contains(title)),
    }
}

/// Picks a diverse set of sources: 5 critic, 5 Reddit, 2 user-review, 3 other
pub fn select_sources(results: &[WebResult], title: &str, max_total: usize) -> SourceSelection {
    let title = title.trim().to_lowercase();
    // Short titles like "Up" or "Us" need word boundaries to avoid noise
    let short_title = (title.chars().count() <= 3)
        .then(|| Regex::new(&format!(r"\b{}\b", regex::escape(&title))).ok())
        .flatten();

    let relevant: Vec<&WebResult> = results
        .iter()
        .filter(|r| mentions_title(r, &title, short_title.as_ref()))
        .collect();
    let filtered: Vec<&WebResult> = if relevant.len() < MIN_RELEVANT_RESULTS {
        results.iter().collect()
    } else {
        relevant
    };

    let mut seen = HashSet::new();
    let urls: Vec<&str> = filtered
        .into_iter()
        .map(|r| r.link.as_str())
        .filter(|link| !link.is_empty())
        .filter(|link| !is_unreadable(link))
        .filter(|link| seen.insert(normalize_url(link).to_string()))
        .collect();

    let quota = |kind: SourceKind, take: usize| {
        urls.iter()
            .copied()
            .filter(move |u| classify(u) == kind)
            .take(take)
    };

    let mut selected: Vec<&str> = quota(SourceKind::Critic, 5)
        .chain(quota(SourceKind::Reddit, 5))
        .chain(quota(SourceKind::UserReview, 2))
        .chain(quota(SourceKind::Other, 3))
        .collect();

    if selected.len() < max_total {
        let remaining: Vec<&str> = urls
            .iter()
            .copied()
            .filter(|u| !selected.contains(u))
            .take(max_total - selected.len())
            .collect();
        selected.extend(remaining);
    }
    selected.truncate(max_total);

    let chosen: HashSet<&str> = selected.iter().map(|u| normalize_url(*u)).collect();
    let backfill = urls
        .iter()
        .copied()
        .filter(|u| !chosen.contains(normalize_url(u)) && classify(u) != SourceKind::Reddit)
        .take(MAX_BACKFILL)
        .map(str::to_string)
        .collect();

    SourceSelection {
        selected: selected.into_iter().map(str::to_string).collect(),
        backfill,
    }
}

/// Search snippets as a stand-in when articles yield nothing usable
pub fn snippets(results: &[WebResult], limit: usize) -> String {
    results
        .iter()
        .take(limit)
        .map(|r| format!("{}: {}", r.title, r.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}
