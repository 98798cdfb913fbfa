use std::path::PathBuf;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use gitdigest::pattern::PatternEngine;
use gitdigest::tokens::{CharHeuristicCounter, TokenCounter};
use gitdigest::types::Budgets;
use gitdigest::walk;

const SAMPLE_TEXT: &str = r#"
use std::collections::HashMap;

fn main() {
    let mut map = HashMap::new();
    map.insert("key", 42);

    for (k, v) in &map {
        println!("{k}: {v}");
    }
}
"#;

fn sample_paths() -> Vec<PathBuf> {
    (0..1000)
        .flat_map(|i| {
            vec![
                PathBuf::from(format!("src/module_{i}/mod.rs")),
                PathBuf::from(format!("src/module_{i}/test.rs")),
                PathBuf::from(format!("docs/page_{i}.md")),
                PathBuf::from(format!("node_modules/pkg_{i}/index.js")),
                PathBuf::from(format!("dist/bundle_{i}.js")),
            ]
        })
        .collect()
}

fn bench_pattern_engine(c: &mut Criterion) {
    let paths = sample_paths();

    c.bench_function("pattern_engine_5000_paths", |b| {
        b.iter(|| {
            let engine = PatternEngine::new(&["*.rs".to_string()], &["*test*".to_string()]).unwrap();
            let matched: Vec<_> = paths
                .iter()
                .filter(|p| engine.should_include(black_box(p)))
                .collect();
            black_box(matched);
        });
    });
}

fn bench_token_estimation(c: &mut Criterion) {
    let counter = CharHeuristicCounter;
    let large_text = SAMPLE_TEXT.repeat(200);

    c.bench_function("char_heuristic_token_count", |b| {
        b.iter(|| {
            black_box(counter.count(black_box(&large_text)));
        });
    });
}

/// Exercises the walker's directory read + pattern filter + sort pipeline
/// (the spec's "tree sort" hot path) against a synthetic fixture built once
/// outside the timed loop.
fn bench_walk_build_tree(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..200 {
        let sub = dir.path().join(format!("module_{i}"));
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("mod.rs"), SAMPLE_TEXT).unwrap();
        std::fs::write(sub.join("README.md"), "# module\n").unwrap();
    }

    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("walk_build_tree_200_dirs", |b| {
        b.iter(|| {
            let root = runtime
                .block_on(walk::build_tree(dir.path(), &[], &[], false, Budgets::default()))
                .unwrap();
            black_box(root);
        });
    });
}

criterion_group!(
    benches,
    bench_pattern_engine,
    bench_token_estimation,
    bench_walk_build_tree
);
criterion_main!(benches);
