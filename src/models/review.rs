use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Three-way classification of a title's consensus
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Verdict {
    #[serde(rename = "WORTH IT")]
    WorthIt,
    #[serde(rename = "NOT WORTH IT")]
    NotWorthIt,
    #[serde(rename = "MIXED BAG")]
    MixedBag,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::WorthIt => "WORTH IT",
            Verdict::NotWorthIt => "NOT WORTH IT",
            Verdict::MixedBag => "MIXED BAG",
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WORTH IT" => Ok(Verdict::WorthIt),
            "NOT WORTH IT" => Ok(Verdict::NotWorthIt),
            "MIXED BAG" => Ok(Verdict::MixedBag),
            other => Err(format!("unknown verdict '{}'", other)),
        }
    }
}

/// How much evidence backed a review
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }

    /// Tier implied by the number of articles that were actually read
    pub fn from_articles_read(articles_read: usize) -> Self {
        match articles_read {
            n if n >= 8 => Confidence::High,
            n if n >= 4 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HIGH" => Ok(Confidence::High),
            "MEDIUM" => Ok(Confidence::Medium),
            "LOW" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence '{}'", other)),
        }
    }
}

/// A synthesized consensus review for one title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub verdict: Verdict,
    pub review_text: String,
    #[serde(default)]
    pub praise_points: Vec<String>,
    #[serde(default)]
    pub criticism_points: Vec<String>,
    pub vibe: Option<String>,
    pub confidence: Confidence,
    pub sources_count: i32,
    #[serde(default)]
    pub sources_urls: Vec<String>,
    pub llm_model: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub imdb_score: Option<f64>,
    pub rt_critic_score: Option<i32>,
    pub rt_audience_score: Option<i32>,
    #[serde(default)]
    pub controversial: bool,
    pub positive_pct: Option<i32>,
    pub negative_pct: Option<i32>,
    pub mixed_pct: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Review fields produced by the pipeline, before they are stored
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDraft {
    pub verdict: Verdict,
    pub review_text: String,
    pub praise_points: Vec<String>,
    pub criticism_points: Vec<String>,
    pub vibe: Option<String>,
    pub confidence: Confidence,
    pub sources_urls: Vec<String>,
    pub llm_model: Option<String>,
    pub positive_pct: Option<i32>,
    pub negative_pct: Option<i32>,
    pub mixed_pct: Option<i32>,
    pub tags: Vec<String>,
}

impl ReviewDraft {
    /// A split audience is flagged so the UI can call it out
    pub fn is_controversial(&self) -> bool {
        match (self.positive_pct, self.negative_pct, self.mixed_pct) {
            (_, _, Some(mixed)) if mixed >= 40 => true,
            (Some(pos), Some(neg), _) => pos >= 35 && neg >= 35,
            _ => false,
        }
    }

    pub fn into_review(self, generated_at: DateTime<Utc>) -> Review {
        let controversial = self.is_controversial();
        Review {
            verdict: self.verdict,
            review_text: self.review_text,
            praise_points: self.praise_points,
            criticism_points: self.criticism_points,
            vibe: self.vibe,
            confidence: self.confidence,
            sources_count: self.sources_urls.len() as i32,
            sources_urls: self.sources_urls,
            llm_model: self.llm_model,
            generated_at,
            imdb_score: None,
            rt_critic_score: None,
            rt_audience_score: None,
            controversial,
            positive_pct: self.positive_pct,
            negative_pct: self.negative_pct,
            mixed_pct: self.mixed_pct,
            tags: self.tags,
        }
    }
}
