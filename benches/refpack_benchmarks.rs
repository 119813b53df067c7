use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use refpack::{bundle_file, bundle_value, expand_file, BundleOptions, Value};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Data: generated reference graphs
// ============================================================================

// A main document referencing `count` schema files, each chaining to the next.
fn generate_chain(count: usize) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let mut definitions = String::new();
    for i in 0..count {
        definitions.push_str(&format!("  M{i}: {{$ref: 'models/m{i}.yaml#/M{i}'}}\n"));
        let next = if i + 1 < count {
            format!("    next: {{$ref: 'm{}.yaml#/M{}'}}\n", i + 1, i + 1)
        } else {
            String::new()
        };
        write(
            dir.path(),
            &format!("models/m{i}.yaml"),
            &format!("M{i}:\n  type: object\n  properties:\n    id: {{type: integer}}\n{next}"),
        );
    }
    let main = write(
        dir.path(),
        "main.yaml",
        &format!("swagger: '2.0'\ndefinitions:\n{definitions}"),
    );
    (dir, main)
}

// A single document with `count` definitions referring to each other locally.
fn generate_local(count: usize) -> Value {
    let mut definitions = serde_json::Map::new();
    for i in 0..count {
        definitions.insert(
            format!("D{i}"),
            json!({
                "type": "object",
                "properties": {"peer": {"$ref": format!("#/definitions/D{}", (i + 1) % count)}}
            }),
        );
    }
    Value::from(json!({"swagger": "2.0", "definitions": definitions}))
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, body).unwrap();
    path
}

// ============================================================================
// Bundler
// ============================================================================

fn bench_bundle_files(c: &mut Criterion) {
    let mut group = c.benchmark_group("bundle_files");

    for size in [10, 50, 200] {
        let (_dir, main) = generate_chain(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &main, |b, main| {
            b.iter(|| bundle_file(black_box(main), &BundleOptions::default()).unwrap());
        });
    }
    group.finish();
}

fn bench_bundle_local(c: &mut Criterion) {
    let mut group = c.benchmark_group("bundle_local");

    for size in [10, 100, 1000] {
        let doc = generate_local(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| bundle_value(black_box(doc.clone()), &BundleOptions::default()).unwrap());
        });
    }
    group.finish();
}

// ============================================================================
// Expander
// ============================================================================

fn bench_expand_files(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_files");

    for size in [10, 50] {
        let (_dir, main) = generate_chain(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &main, |b, main| {
            b.iter(|| expand_file(black_box(main)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(bundle_benches, bench_bundle_files, bench_bundle_local);
criterion_group!(expand_benches, bench_expand_files);

criterion_main!(bundle_benches, expand_benches);
