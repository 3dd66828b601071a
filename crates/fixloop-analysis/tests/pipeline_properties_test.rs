use std::collections::BTreeSet;

use proptest::prelude::*;

use fixloop_analysis::aggregation::{AggregationPipeline, ClusterDeduplicator, SimilarityCache};
use fixloop_analysis::promotion::PatternSignature;
use fixloop_analysis::scoring::{ConfidenceScorer, ScoringContext};
use fixloop_core::config::ClusteringConfig;
use fixloop_core::models::{ExtractionQuality, FeatureRecord, SourceLanguage, StructuralFeatures};

fn context() -> impl Strategy<Value = ScoringContext> {
    (
        any::<[bool; 8]>(),
        0u32..4,
    )
        .prop_map(|(flags, candidates)| ScoringContext {
            rule_id_matched: flags[0],
            diff_removes_token: flags[1],
            disappearance_confirmed: flags[2],
            anchored_to_hunk: flags[3],
            ambiguous_commits: flags[4],
            disappears_without_modification: flags[5],
            config_change_detected: flags[6],
            candidate_commit_count: candidates,
            is_formatter_batch: flags[7],
        })
}

fn record(id: String, family: usize) -> FeatureRecord {
    let keywords: Vec<String> = (0..6).map(|k| format!("fam{family}_kw{k}")).collect();
    FeatureRecord {
        item_id: id,
        keywords,
        pattern_indicators: vec![format!("removes:fam{family}")],
        structural: StructuralFeatures {
            function_count: 1,
            line_count: 4,
            cyclomatic_complexity: 1,
            ..Default::default()
        },
        base_classes: Vec::new(),
        decorators: Vec::new(),
        labels: vec![format!("RULE-{family}"), "high".into()],
        language: SourceLanguage::Python,
        domain: "python".into(),
        quality_score: None,
        extraction_quality: ExtractionQuality::Minimal,
    }
}

fn records() -> Vec<FeatureRecord> {
    (0..24)
        .map(|i| record(format!("pair-{i:02}"), i % 3))
        .collect()
}

fn membership(records: &[FeatureRecord]) -> BTreeSet<Vec<String>> {
    AggregationPipeline::new(&ClusteringConfig::default())
        .run_to_completion(records)
        .expect("aggregation")
        .clusters
        .iter()
        .map(|c| c.member_ids().to_vec())
        .collect()
}

proptest! {
    #[test]
    fn confidence_is_clamped_and_batches_never_promote(ctx in context()) {
        let result = ConfidenceScorer::default().score(&ctx);
        prop_assert!((0.0..=1.0).contains(&result.confidence_score));
        if ctx.is_formatter_batch {
            prop_assert!(!result.promoted);
        }
        if result.promoted {
            prop_assert!(result.confidence_score >= 0.75);
        }
    }

    #[test]
    fn signature_ignores_order_case_and_duplicates(
        keywords in prop::collection::vec("[a-z_]{1,8}", 0..20),
        indicators in prop::collection::vec("[a-z:_]{1,12}", 0..6),
        seed in any::<u64>(),
    ) {
        let mut shuffled = keywords.clone();
        let n = shuffled.len();
        if n > 1 {
            shuffled.rotate_left((seed % n as u64) as usize);
        }
        let shouted: Vec<String> = shuffled.iter().map(|k| format!(" {} ", k.to_uppercase())).collect();
        let mut doubled = indicators.clone();
        doubled.extend(indicators.iter().cloned());

        let a = PatternSignature::generate("PY-EVAL", &keywords, &indicators);
        let b = PatternSignature::generate("PY-EVAL", &shouted, &doubled);
        prop_assert_eq!(a.render(), b.render());
        prop_assert!(PatternSignature::parse(&a.render()).is_ok());
    }

    #[test]
    fn near_threshold_band_never_merges(offset in -0.05f64..=0.05) {
        let dedup = ClusterDeduplicator::new(&ClusteringConfig::default(), SimilarityCache::new(16));
        let similarity = dedup.threshold() + offset;
        prop_assert!(!dedup.should_merge(similarity));
    }

    #[test]
    fn cluster_membership_is_order_independent(shuffled in Just(records()).prop_shuffle()) {
        prop_assert_eq!(membership(&shuffled), membership(&records()));
    }
}

#[test]
fn three_families_form_three_clusters() {
    let clusters = membership(&records());
    assert_eq!(clusters.len(), 3);
    assert!(clusters.iter().all(|members| members.len() == 8));
}

#[test]
fn rule_and_token_alone_are_not_enough() {
    let ctx = ScoringContext {
        rule_id_matched: true,
        diff_removes_token: true,
        ..Default::default()
    };
    let result = ConfidenceScorer::default().score(&ctx);
    assert_eq!(result.confidence_score, 0.70);
    assert!(!result.promoted);
}
