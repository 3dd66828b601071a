//! Clustering benchmarks.
//!
//! Greedy clustering plus dedup over synthetic feature records drawn from a
//! handful of rule families.
//! Run with: cargo bench -p fixloop-analysis --bench clustering_bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fixloop_analysis::aggregation::AggregationPipeline;
use fixloop_core::config::ClusteringConfig;
use fixloop_core::models::{ExtractionQuality, FeatureRecord, SourceLanguage, StructuralFeatures};

fn synthetic_records(count: usize) -> Vec<FeatureRecord> {
    (0..count)
        .map(|i| {
            let family = i % 8;
            FeatureRecord {
                item_id: format!("pair-{i:06}"),
                keywords: (0..6).map(|k| format!("kw_{family}_{k}")).chain([format!("local_{}", i % 3)]).collect(),
                pattern_indicators: vec![format!("indicator_{family}")],
                structural: StructuralFeatures {
                    function_count: 1 + (i % 2) as u32,
                    line_count: 4 + (i % 5) as u32,
                    cyclomatic_complexity: 1 + (i % 3) as u32,
                    ..Default::default()
                },
                base_classes: vec![],
                decorators: vec![],
                labels: vec![format!("RULE{family}")],
                language: SourceLanguage::Python,
                domain: "python".into(),
                quality_score: None,
                extraction_quality: ExtractionQuality::Full,
            }
        })
        .collect()
}

fn aggregation_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");
    group.sample_size(10);

    for size in [100, 500, 2000] {
        let records = synthetic_records(size);
        let config = ClusteringConfig::default();
        group.bench_with_input(BenchmarkId::new("cluster_and_dedup", size), &size, |b, _| {
            b.iter(|| {
                let pipeline = AggregationPipeline::new(&config);
                pipeline.run_to_completion(&records).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, aggregation_run);
criterion_main!(benches);
