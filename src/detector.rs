//! Utility (concessionária) detection from the bill text.
//!
//! Each detector scores the text in `[0, 1]`; the best score picks the
//! provider. Ties and all-zero scores fall back to Energisa, the only
//! provider with a working pipeline.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Known utilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    #[default]
    Energisa,
    Enel,
    Cpfl,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Energisa => "ENERGISA",
            Self::Enel => "ENEL",
            Self::Cpfl => "CPFL",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores how likely a bill text belongs to one provider.
pub trait ProviderDetector: Send + Sync {
    fn provider(&self) -> Provider;
    fn score(&self, text: &str) -> f64;
}

static ENERGISA_UC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10/\d{8}-\d").unwrap());

/// Weighted evidence for Energisa bills.
pub struct EnergisaDetector;

impl ProviderDetector for EnergisaDetector {
    fn provider(&self) -> Provider {
        Provider::Energisa
    }

    fn score(&self, text: &str) -> f64 {
        let normalized = text.to_uppercase();
        let mut score = 0.0;

        if normalized.contains("ENERGISA") {
            score += 0.4;
        }
        if normalized.contains("DANF3E") {
            score += 0.25;
        }
        if normalized.contains("ENERGIA ATV INJETADA") {
            score += 0.2;
        }
        if ENERGISA_UC_RE.is_match(&normalized) {
            score += 0.25;
        }

        f64::min(1.0, score)
    }
}

/// Placeholder until Enel bills are supported; never claims a document.
pub struct EnelDetector;

impl ProviderDetector for EnelDetector {
    fn provider(&self) -> Provider {
        Provider::Enel
    }

    fn score(&self, _text: &str) -> f64 {
        0.0
    }
}

/// Placeholder until CPFL bills are supported; never claims a document.
pub struct CpflDetector;

impl ProviderDetector for CpflDetector {
    fn provider(&self) -> Provider {
        Provider::Cpfl
    }

    fn score(&self, _text: &str) -> f64 {
        0.0
    }
}

/// Score from a single detector.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderScore {
    pub concessionaria: Provider,
    pub score: f64,
}

/// Runs the fixed detector set.
pub struct DetectorSet {
    detectors: Vec<Box<dyn ProviderDetector>>,
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self {
            detectors: vec![
                Box::new(EnergisaDetector),
                Box::new(EnelDetector),
                Box::new(CpflDetector),
            ],
        }
    }
}

impl DetectorSet {
    pub fn scores(&self, text: &str) -> Vec<ProviderScore> {
        self.detectors
            .iter()
            .map(|d| ProviderScore {
                concessionaria: d.provider(),
                score: d.score(text),
            })
            .collect()
    }

    /// Strictly highest score wins; otherwise Energisa.
    pub fn detect(&self, text: &str) -> Provider {
        let mut best = Provider::Energisa;
        let mut best_score = 0.0;
        for s in self.scores(text) {
            if s.score > best_score {
                best = s.concessionaria;
                best_score = s.score;
            }
        }
        debug!(concessionaria = %best, score = best_score, "Provider detected");
        best
    }
}
