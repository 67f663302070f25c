//! Performance benchmarks for toolrelay.
//!
//! This module contains benchmarks for:
//! - Result rendering (tables, pretty JSON, text)
//! - Catalog import and name resolution with large tool listings
//! - Wrapper argument transforms
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Map, Value};
use toolrelay::dispatch::{filter_stage_paths, render, transform, ToolCatalog, ToolResult, WorkspaceRoots, WrapperKind};
use toolrelay::mcp::JsonRpcResponse;

// ============================================================================
// Mock Data Fixtures
// ============================================================================

mod fixtures {
    use super::*;

    /// A `tools/call` result carrying `rows` structured records.
    pub fn structured_result(rows: usize) -> ToolResult {
        let records: Vec<Value> = (0..rows)
            .map(|i| {
                json!({
                    "id": i,
                    "name": format!("customer_{}", i),
                    "email": format!("user{}@example.com", i),
                    "active": i % 3 != 0,
                    "meta": {"tier": i % 4}
                })
            })
            .collect();
        ToolResult::from_result_value(json!({"structuredContent": {"result": records}}))
    }

    /// A `tools/list` response with `count` tools.
    pub fn tool_listing(count: usize) -> JsonRpcResponse {
        let tools: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "name": format!("tool_{}", i),
                    "description": format!("Tool number {}", i),
                    "inputSchema": {"type": "object", "properties": {"arg": {"type": "string"}}}
                })
            })
            .collect();
        serde_json::from_value(json!({"jsonrpc": "2.0", "id": "1", "result": {"tools": tools}}))
            .expect("valid listing")
    }

    pub fn stage_paths(count: usize) -> Vec<String> {
        let templates = ["src/mod_{}.rs", "target/debug/{}.d", "./docs/{}.md", "logs/{}.log", "node_modules/{}/index.js"];
        (0..count).map(|i| templates[i % templates.len()].replace("{}", &i.to_string())).collect()
    }
}

// ============================================================================
// Rendering Benchmarks
// ============================================================================

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for rows in [10, 100, 1000] {
        let result = fixtures::structured_result(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("table", rows), &result, |b, result| {
            b.iter(|| render(black_box(result)));
        });
    }

    let text = ToolResult::from_result_value(json!({
        "content": (0..50).map(|i| json!({"type": "text", "text": format!("line {}", i)})).collect::<Vec<_>>()
    }));
    group.bench_function("text_segments", |b| b.iter(|| render(black_box(&text))));

    group.finish();
}

// ============================================================================
// Catalog Benchmarks
// ============================================================================

fn bench_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog");

    for count in [10, 100, 1000] {
        let listing = fixtures::tool_listing(count);
        group.bench_with_input(BenchmarkId::new("import", count), &listing, |b, listing| {
            b.iter(|| {
                let mut catalog = ToolCatalog::new();
                catalog.register_local("SQLScout");
                catalog.import_listing("Remote", black_box(listing));
                catalog.register_passthrough();
                catalog
            });
        });

        let mut catalog = ToolCatalog::new();
        catalog.import_listing("Remote", &listing);
        let names: Vec<String> = (0..count).map(|i| format!("tool_{}", i)).collect();
        group.bench_with_input(BenchmarkId::new("resolve", count), &names, |b, names| {
            b.iter(|| names.iter().filter(|name| catalog.resolve(black_box(name)).is_some()).count());
        });

        group.bench_function(BenchmarkId::new("model_schema", count), |b| b.iter(|| catalog.as_model_schema()));
    }

    group.finish();
}

// ============================================================================
// Wrapper Benchmarks
// ============================================================================

fn bench_wrappers(c: &mut Criterion) {
    let roots = WorkspaceRoots::new("/srv/files", "/srv/repo");
    let paths = fixtures::stage_paths(500);

    c.bench_function("filter_stage_paths_500", |b| {
        b.iter(|| filter_stage_paths(black_box(&paths), &roots.repo_root));
    });

    let mut args = Map::new();
    args.insert("path".to_string(), json!("notes/../notes/./today.md"));
    c.bench_function("transform_read_file", |b| {
        b.iter(|| transform(WrapperKind::FsReadFile, black_box(&roots), &args));
    });
}

criterion_group!(benches, bench_render, bench_catalog, bench_wrappers);
criterion_main!(benches);
