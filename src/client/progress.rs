/// What a progress bar should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub percent: u8,
    pub label: String,
}

const STAGES: &[(&[&str], u8)] = &[
    (&["preparing"], 5),
    (&["fetching", "details"], 10),
    (&["searching"], 25),
    (&["gathering", "reading"], 50),
    (&["analyzing", "analysing"], 70),
    (&["writing", "verdict"], 90),
    (&["saving"], 95),
];

const DEFAULT_LABEL: &str = "Working on it...";

/// Maps free-text job progress to a percentage that never goes backwards
#[derive(Debug, Clone, Default)]
pub struct ProgressPresenter {
    percent: u8,
}

impl ProgressPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Percentage for a known stage message, if it names one
    pub fn stage_percent(message: &str) -> Option<u8> {
        let lower = message.to_lowercase();
        STAGES
            .iter()
            .rev()
            .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(_, percent)| *percent)
    }

    pub fn update(&mut self, message: &str) -> ProgressView {
        if let Some(stage) = Self::stage_percent(message) {
            self.percent = self.percent.max(stage);
        }
        let label = message.trim();
        ProgressView {
            percent: self.percent,
            label: if label.is_empty() {
                DEFAULT_LABEL.to_string()
            } else {
                label.to_string()
            },
        }
    }

    pub fn complete(&mut self) -> ProgressView {
        self.percent = 100;
        ProgressView {
            percent: 100,
            label: "Done!".to_string(),
        }
    }

    pub fn reset(&mut self) {
        self.percent = 0;
    }
}
