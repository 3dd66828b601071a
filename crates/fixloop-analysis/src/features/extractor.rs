//! Feature extraction entry point. Never fails: samples without a grammar,
//! or whose grammar cannot be loaded, fall back to text heuristics.

use std::sync::Arc;

use rayon::prelude::*;

use fixloop_core::constants::DEFAULT_DOMAIN;
use fixloop_core::models::{ExtractionQuality, FeatureRecord, FindingFixPair, SourceLanguage};
use fixloop_core::traits::QualityScorer;

use super::heuristics::MinimalExtractor;
use super::indicators::IndicatorMatcher;
use super::syntax::{self, SyntaxFeatures};
use crate::scoring::parse_hunks;

/// Identifiers kept per record.
const MAX_KEYWORDS: usize = 200;

/// One code sample to extract features from.
#[derive(Debug, Clone)]
pub struct CodeSample {
    pub item_id: String,
    pub source: String,
    pub language: SourceLanguage,
    pub domain: String,
    pub labels: Vec<String>,
}

/// Turns code samples into normalized feature records.
#[derive(Clone)]
pub struct FeatureExtractor {
    indicators: IndicatorMatcher,
    heuristics: Option<MinimalExtractor>,
    quality: Option<Arc<dyn QualityScorer>>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        let heuristics = match MinimalExtractor::new() {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!(error = %e, "heuristic extractor unavailable");
                None
            }
        };
        Self {
            indicators: IndicatorMatcher::new(),
            heuristics,
            quality: None,
        }
    }

    /// Attach a quality scorer; its score and band label enrich each record.
    pub fn with_quality_scorer(mut self, scorer: Arc<dyn QualityScorer>) -> Self {
        self.quality = Some(scorer);
        self
    }

    pub fn extract(&self, sample: &CodeSample) -> FeatureRecord {
        let (features, quality) = match syntax::extract_syntax(&sample.source, sample.language) {
            Some(f) => (f, ExtractionQuality::Full),
            None => (self.minimal(&sample.source), ExtractionQuality::Minimal),
        };

        let mut keywords = features.identifiers;
        keywords.truncate(MAX_KEYWORDS);

        let mut labels = sample.labels.clone();
        let quality_score = self.quality.as_ref().map(|scorer| {
            let report = scorer.score_code_quality(&sample.source, sample.language.name());
            labels.push(format!("quality:{}", quality_band(report.quality_score)));
            report.quality_score
        });
        dedup_preserving_order(&mut labels);

        FeatureRecord {
            item_id: sample.item_id.clone(),
            keywords,
            pattern_indicators: self.indicators.detect(&sample.source),
            structural: features.structural,
            base_classes: features.base_classes,
            decorators: features.decorators,
            labels,
            language: sample.language,
            domain: sample.domain.clone(),
            quality_score,
            extraction_quality: quality,
        }
    }

    /// Features of a pair's fix: the before/after text of its hunks, plus
    /// indicators tagged by the side of the diff they appear on.
    pub fn extract_pair(&self, pair: &FindingFixPair) -> FeatureRecord {
        let sample = pair_sample(pair);
        let mut record = self.extract(&sample);

        let hunks = parse_hunks(&pair.diff_hunks);
        let removed: String = hunks.iter().flat_map(|h| h.removed()).collect::<Vec<_>>().join("\n");
        let added: String = hunks.iter().flat_map(|h| h.added()).collect::<Vec<_>>().join("\n");
        let removed_ind = self.indicators.detect(&removed);
        let added_ind = self.indicators.detect(&added);
        for ind in &removed_ind {
            if !added_ind.contains(ind) {
                record.pattern_indicators.push(format!("removes:{ind}"));
            }
        }
        for ind in &added_ind {
            if !removed_ind.contains(ind) {
                record.pattern_indicators.push(format!("adds:{ind}"));
            }
        }
        record.pattern_indicators.sort();
        record.pattern_indicators.dedup();
        record
    }

    pub fn extract_pairs(&self, pairs: &[FindingFixPair]) -> Vec<FeatureRecord> {
        pairs.par_iter().map(|p| self.extract_pair(p)).collect()
    }

    fn minimal(&self, source: &str) -> SyntaxFeatures {
        match &self.heuristics {
            Some(h) => h.extract(source),
            None => SyntaxFeatures {
                structural: fixloop_core::models::StructuralFeatures {
                    line_count: source.lines().count() as u32,
                    cyclomatic_complexity: 1,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }
}

/// Build the code sample for a pair. The domain is the language name, or
/// the default domain when the language is unknown.
pub fn pair_sample(pair: &FindingFixPair) -> CodeSample {
    let language = SourceLanguage::from_path(&pair.file_path);
    let hunks = parse_hunks(&pair.diff_hunks);
    let mut source = String::new();
    for hunk in &hunks {
        source.push_str(&hunk.before_text());
        source.push_str(&hunk.after_text());
    }
    CodeSample {
        item_id: pair.pair_id.clone(),
        source,
        language,
        domain: pair_domain(language),
        labels: vec![pair.rule_id.clone()],
    }
}

pub fn pair_domain(language: SourceLanguage) -> String {
    if language == SourceLanguage::Unknown {
        DEFAULT_DOMAIN.to_string()
    } else {
        language.name().to_string()
    }
}

/// Coarse band of a 0-100 or 0-1 quality score.
pub fn quality_band(score: f64) -> &'static str {
    let normalized = if score > 1.0 { score / 100.0 } else { score };
    if normalized >= 0.8 {
        "high"
    } else if normalized >= 0.5 {
        "medium"
    } else {
        "low"
    }
}

fn dedup_preserving_order(labels: &mut Vec<String>) {
    let mut seen = rustc_hash::FxHashSet::default();
    labels.retain(|l| seen.insert(l.clone()));
}
