//! Weighted multi-component similarity between feature records.
//!
//! Five components, each in [0, 1]: keyword Jaccard (0.30), indicator
//! Jaccard (0.25), structural similarity (0.20), label Jaccard (0.15) and
//! context alignment (0.10). The component vector is always kept next to
//! the scalar.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use fixloop_core::models::{FeatureRecord, StructuralFeatures};

pub const KEYWORD_WEIGHT: f64 = 0.30;
pub const INDICATOR_WEIGHT: f64 = 0.25;
pub const STRUCTURAL_WEIGHT: f64 = 0.20;
pub const LABEL_WEIGHT: f64 = 0.15;
pub const CONTEXT_WEIGHT: f64 = 0.10;

/// Per-component similarity vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimilarityBreakdown {
    pub keyword: f64,
    pub indicator: f64,
    pub structural: f64,
    pub label: f64,
    pub context: f64,
}

impl SimilarityBreakdown {
    /// Weighted scalar similarity, clamped to [0, 1].
    pub fn total(&self) -> f64 {
        let sum = KEYWORD_WEIGHT * self.keyword
            + INDICATOR_WEIGHT * self.indicator
            + STRUCTURAL_WEIGHT * self.structural
            + LABEL_WEIGHT * self.label
            + CONTEXT_WEIGHT * self.context;
        sum.clamp(0.0, 1.0)
    }

    /// Identical records.
    pub fn identical() -> Self {
        Self {
            keyword: 1.0,
            indicator: 1.0,
            structural: 1.0,
            label: 1.0,
            context: 1.0,
        }
    }
}

impl fmt::Display for SimilarityBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3} (kw={:.2}, ind={:.2}, struct={:.2}, label={:.2}, ctx={:.2})",
            self.total(),
            self.keyword,
            self.indicator,
            self.structural,
            self.label,
            self.context,
        )
    }
}

/// Jaccard similarity of two string sets. Two empty sets agree fully.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: FxHashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: FxHashSet<&str> = b.iter().map(String::as_str).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

fn ratio(a: u32, b: u32) -> f64 {
    let max = a.max(b).max(1) as f64;
    1.0 - (a.abs_diff(b) as f64 / max)
}

/// Structural distance inverted to similarity: the mean of per-metric
/// ratios and boolean agreements.
pub fn structural_similarity(a: &StructuralFeatures, b: &StructuralFeatures) -> f64 {
    let parts = [
        ratio(a.class_count, b.class_count),
        ratio(a.function_count, b.function_count),
        ratio(a.max_nesting_depth, b.max_nesting_depth),
        ratio(a.line_count, b.line_count),
        ratio(a.cyclomatic_complexity, b.cyclomatic_complexity),
        f64::from(u8::from(a.has_type_hints == b.has_type_hints)),
        f64::from(u8::from(a.has_docstrings == b.has_docstrings)),
    ];
    parts.iter().sum::<f64>() / parts.len() as f64
}

/// Half for a shared domain, half for a shared language.
pub fn context_alignment(a: &FeatureRecord, b: &FeatureRecord) -> f64 {
    let mut score = 0.0;
    if a.domain == b.domain {
        score += 0.5;
    }
    if a.language == b.language {
        score += 0.5;
    }
    score
}

pub fn similarity(a: &FeatureRecord, b: &FeatureRecord) -> SimilarityBreakdown {
    SimilarityBreakdown {
        keyword: jaccard(&a.keywords, &b.keywords),
        indicator: jaccard(&a.pattern_indicators, &b.pattern_indicators),
        structural: structural_similarity(&a.structural, &b.structural),
        label: jaccard(&a.labels, &b.labels),
        context: context_alignment(a, b),
    }
}

/// Bounded memo of pairwise similarities, keyed by the unordered pair of
/// item ids. Scoped to one aggregation run: item ids must identify the
/// same features for the cache's lifetime.
#[derive(Clone)]
pub struct SimilarityCache {
    cache: Cache<String, SimilarityBreakdown>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl SimilarityCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    fn key(a: &str, b: &str) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{lo}\0{hi}")
    }

    /// Similarity of `a` and `b`, computed at most once per cached pair.
    pub fn get_or_compute(&self, a: &FeatureRecord, b: &FeatureRecord) -> SimilarityBreakdown {
        if a.item_id == b.item_id {
            return SimilarityBreakdown::identical();
        }
        let key = Self::key(&a.item_id, &b.item_id);
        if let Some(hit) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = similarity(a, b);
        self.cache.insert(key, computed);
        computed
    }

    /// Share of lookups answered from the cache; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SimilarityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimilarityCache")
            .field("entries", &self.cache.entry_count())
            .field("hit_rate", &self.hit_rate())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use fixloop_core::models::{ExtractionQuality, SourceLanguage};

    pub(crate) fn record(id: &str, keywords: &[&str], indicators: &[&str], label: &str) -> FeatureRecord {
        FeatureRecord {
            item_id: id.into(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            pattern_indicators: indicators.iter().map(|s| s.to_string()).collect(),
            structural: StructuralFeatures {
                function_count: 1,
                line_count: 4,
                cyclomatic_complexity: 1,
                ..Default::default()
            },
            base_classes: vec![],
            decorators: vec![],
            labels: vec![label.into()],
            language: SourceLanguage::Python,
            domain: "python".into(),
            quality_score: None,
            extraction_quality: ExtractionQuality::Full,
        }
    }

    #[test]
    fn empty_sets_agree_fully() {
        assert_eq!(jaccard(&[], &[]), 1.0);
        assert_eq!(jaccard(&["a".into()], &[]), 0.0);
    }

    #[test]
    fn identical_records_score_one() {
        let a = record("a", &["eval", "data"], &["dynamic_eval"], "E1");
        let mut b = a.clone();
        b.item_id = "b".into();
        let s = similarity(&a, &b);
        assert!((s.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_separates_structure_from_semantics() {
        let a = record("a", &["eval", "data"], &["dynamic_eval"], "E1");
        let b = record("b", &["socket", "bind"], &["network_listener"], "E9");
        let s = similarity(&a, &b);
        assert_eq!(s.structural, 1.0);
        assert_eq!(s.keyword, 0.0);
        assert_eq!(s.indicator, 0.0);
        assert!((s.total() - 0.30).abs() < 1e-9);
    }

    #[test]
    fn cache_is_symmetric() {
        let cache = SimilarityCache::new(16);
        let a = record("a", &["x", "y"], &[], "E1");
        let b = record("b", &["y", "z"], &[], "E1");
        let ab = cache.get_or_compute(&a, &b);
        let ba = cache.get_or_compute(&b, &a);
        assert_eq!(ab, ba);
        assert!((ab.keyword - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(cache.hit_rate(), 0.5);
    }
}
