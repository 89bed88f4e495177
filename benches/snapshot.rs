//! Snapshot benchmark suite.
//!
//! Benchmarks the CPU-bound halves of a snapshot:
//! - Tree simplification over generated accessibility trees
//! - Text extraction over generated page text
//!
//! Run with: cargo bench --bench snapshot
//! Results saved to: target/criterion/

use std::hint::black_box;

use browser_relay::snapshot::text::{TextLimits, extract_text};
use browser_relay::snapshot::tree::{AxNode, simplify_tree};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const NODE_COUNTS: &[usize] = &[100, 1_000, 10_000];
const BLOCK_COUNTS: &[usize] = &[50, 500, 5_000];

// ============================================================================
// Fixtures
// ============================================================================

/// Builds a tree with fan-out 8 where every third node is ignored.
fn ax_tree(count: usize) -> Vec<AxNode> {
    (0..count)
        .map(|i| {
            let parent = (i > 0).then(|| ((i - 1) / 8).to_string());
            let role = if i == 0 { "RootWebArea" } else if i % 5 == 0 { "link" } else { "generic" };

            serde_json::from_value(json!({
                "nodeId": i.to_string(),
                "ignored": i % 3 == 0 && i > 0,
                "role": { "type": "role", "value": role },
                "name": { "type": "computedString", "value": format!("node {i}") },
                "parentId": parent,
                "backendDOMNodeId": i,
            }))
            .expect("fixture node")
        })
        .collect()
}

/// Builds text blocks with some repetition and some long multi-line blocks.
fn text_blocks(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 10 {
            0 => "Repeated navigation label".to_string(),
            7 => (0..20).map(|l| format!("paragraph {i} line {l}\n")).collect(),
            _ => format!("Block number {i} with some ordinary content"),
        })
        .collect()
}

// ============================================================================
// Benchmark: Tree Simplification
// ============================================================================

fn bench_simplify_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("simplify_tree");

    for &count in NODE_COUNTS {
        let nodes = ax_tree(count);
        group.bench_with_input(BenchmarkId::new("nodes", count), &nodes, |b, nodes| {
            b.iter(|| simplify_tree(black_box(nodes), false));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Text Extraction
// ============================================================================

fn bench_extract_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_text");
    let body = "Footer\nCopyright\n".repeat(50);

    for &count in BLOCK_COUNTS {
        let blocks = text_blocks(count);
        group.bench_with_input(BenchmarkId::new("blocks", count), &blocks, |b, blocks| {
            b.iter(|| extract_text(black_box(blocks), black_box(&body), TextLimits::default()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_simplify_tree, bench_extract_text);
criterion_main!(benches);
