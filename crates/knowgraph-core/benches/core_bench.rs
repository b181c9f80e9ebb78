//! Criterion benchmarks for knowgraph-core.
//!
//! ## Benchmark groups
//!
//! 1. **schema**: DDL init + migration overhead.
//! 2. **extraction**: C# parsing and graph extraction per file.
//! 3. **traversal**: Impact analysis, dependency chains and cycle detection
//!    on synthetic graphs.
//! 4. **analytics**: Model ranking and co-edit clustering on in-memory data.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/knowgraph-core/Cargo.toml
//! # Run only the traversal group:
//! cargo bench --manifest-path crates/knowgraph-core/Cargo.toml -- traversal
//! ```

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rusqlite::Connection;

use knowgraph_core::analytics::coedit::clusters_from_edges;
use knowgraph_core::analytics::model_ranking::rank_models;
use knowgraph_core::analytics::ModelQuery;
use knowgraph_core::config::ModelRankingConfig;
use knowgraph_core::indexer::{extract_graph, CSharpFactProvider};
use knowgraph_core::models::{
    CoEditEdge, CodeElement, ComplexityBucket, EdgeRecord, ElementKind, ElementMetadata,
    MethodMetrics, ModelPerformanceRecord, Outcome, Relationship, RelationshipKind, TypeKind,
    TypeMetadata,
};
use knowgraph_core::query::{dependency_chain, find_cycles, impact_analysis, GraphSnapshot};
use knowgraph_core::store::schema::migrate_schema;
use knowgraph_core::store::GraphData;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SERVICE_SOURCE: &str = r#"
using System;
using System.Collections.Generic;

namespace Shop.Orders;

public interface IOrderRepository
{
    Order Find(int id);
    void Save(Order order);
}

public class OrderService : ServiceBase, IOrderService
{
    private readonly IOrderRepository _orders;
    private readonly ILogger<OrderService> _logger;

    public OrderService(IOrderRepository orders, ILogger<OrderService> logger)
    {
        _orders = orders;
        _logger = logger;
    }

    public async Task<Order> PlaceAsync(int id, bool express)
    {
        var order = _orders.Find(id);
        if (order == null)
        {
            throw new InvalidOperationException("missing");
        }
        for (var i = 0; i < order.Lines.Count; i++)
        {
            if (express && order.Lines[i].Quantity > 1)
            {
                _logger.LogInformation("split line");
            }
        }
        _orders.Save(order);
        await Notify(order);
        return order;
    }

    private Task Notify(Order order) => Task.CompletedTask;
}
"#;

fn element(qualified: &str, parent: Option<&str>, file: &str) -> CodeElement {
    let name = qualified.rsplit('.').next().unwrap_or(qualified).to_string();
    let (kind, metadata) = match parent {
        Some(_) => (ElementKind::Method, ElementMetadata::Method(MethodMetrics::default())),
        None => (
            ElementKind::Type,
            ElementMetadata::Type(TypeMetadata {
                type_kind: TypeKind::Class,
                base_types: vec![],
                is_abstract: false,
                is_static: false,
                is_partial: false,
                extra: Default::default(),
            }),
        ),
    };
    CodeElement {
        qualified_name: qualified.to_string(),
        short_name: qualified.trim_start_matches("Bench.").to_string(),
        name,
        kind,
        file_path: file.to_string(),
        context: "bench".to_string(),
        start_line: 1,
        end_line: 20,
        parent: parent.map(str::to_string),
        metadata,
    }
}

fn edge(from: &str, to: &str, kind: RelationshipKind, file: &str) -> EdgeRecord {
    EdgeRecord {
        relationship: Relationship {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            line_number: 1,
            caller_object: None,
            inferred_type: None,
            expression: None,
            parameter_name: None,
        },
        file_path: file.to_string(),
        context: "bench".to_string(),
    }
}

/// `n` types with one method each. Every method calls the next type's
/// method, every fifth type injects the type three ahead, and the last type
/// calls back into the first so the graph has one long cycle.
fn synthetic_graph(n: usize) -> GraphData {
    let mut data = GraphData::default();
    for i in 0..n {
        let file = format!("src/Type{i}.cs");
        let ty = format!("Bench.Type{i}");
        let method = format!("{ty}.Run");
        data.elements.push(element(&ty, None, &file));
        data.elements.push(element(&method, Some(&ty), &file));

        let next = (i + 1) % n;
        data.edges.push(edge(
            &method,
            &format!("Bench.Type{next}.Run"),
            RelationshipKind::Calls,
            &file,
        ));
        if i % 5 == 0 && i + 3 < n {
            data.edges.push(edge(
                &ty,
                &format!("Bench.Type{}", i + 3),
                RelationshipKind::Injects,
                &file,
            ));
        }
    }
    data
}

fn model_records(n: usize) -> Vec<ModelPerformanceRecord> {
    let now = Utc::now();
    let models = ["coder:7b", "coder:14b", "coder:32b", "general:8b", "tiny:1.5b"];
    let languages = ["csharp", "fsharp", "python"];
    (0..n)
        .map(|i| ModelPerformanceRecord {
            model: models[i % models.len()].to_string(),
            task_type: "refactor".to_string(),
            language: Some(languages[i % languages.len()].to_string()),
            complexity: ComplexityBucket::Moderate,
            outcome: if i % 4 == 0 { Outcome::Failure } else { Outcome::Success },
            score: (i % 10) as f64 / 10.0,
            duration_ms: 1_000 + i as i64,
            iterations: 1 + (i % 3) as i64,
            error_type: None,
            context: None,
            keywords: vec![],
            recorded_at: now - Duration::hours(i as i64),
        })
        .collect()
}

fn co_edit_edges(n: usize) -> Vec<CoEditEdge> {
    (0..n)
        .map(|i| CoEditEdge {
            file_a: format!("src/F{}.cs", i / 3),
            file_b: format!("src/F{}.cs", i / 3 + 1 + i % 3),
            context: "bench".to_string(),
            co_edit_count: (i % 6) as i64,
            strength: 0.0,
            last_co_edited_at: None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_schema_init(c: &mut Criterion) {
    c.bench_function("schema/init_and_migrate", |b| {
        b.iter(|| {
            let conn = Connection::open_in_memory().unwrap();
            migrate_schema(&conn).unwrap();
            black_box(conn)
        });
    });
}

fn bench_extraction(c: &mut Criterion) {
    let provider = CSharpFactProvider::new();
    let mut group = c.benchmark_group("extraction");

    group.bench_function("service_file", |b| {
        b.iter(|| {
            extract_graph(
                &provider,
                black_box(SERVICE_SOURCE),
                "src/OrderService.cs",
                "bench",
            )
        });
    });

    let large = SERVICE_SOURCE.repeat(20);
    group.bench_function("service_file_x20", |b| {
        b.iter(|| extract_graph(&provider, black_box(&large), "src/Large.cs", "bench"));
    });

    group.finish();
}

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("traversal");

    for size in [100usize, 1_000, 5_000] {
        let data = synthetic_graph(size);

        group.bench_with_input(BenchmarkId::new("snapshot_build", size), &data, |b, data| {
            b.iter(|| GraphSnapshot::from_data(black_box(data)));
        });

        let snapshot = GraphSnapshot::from_data(&data);
        group.bench_with_input(BenchmarkId::new("impact", size), &snapshot, |b, snapshot| {
            b.iter(|| impact_analysis(snapshot, black_box("Bench.Type0")));
        });
        group.bench_with_input(
            BenchmarkId::new("dependency_chain_depth_8", size),
            &snapshot,
            |b, snapshot| {
                b.iter(|| dependency_chain(snapshot, black_box("Bench.Type0.Run"), 8));
            },
        );
        group.bench_with_input(BenchmarkId::new("cycles", size), &snapshot, |b, snapshot| {
            b.iter(|| find_cycles(black_box(snapshot)));
        });
    }

    group.finish();
}

fn bench_analytics(c: &mut Criterion) {
    let mut group = c.benchmark_group("analytics");
    let mut config = ModelRankingConfig::default();
    config
        .related_languages
        .entry("csharp".to_string())
        .or_default()
        .insert("fsharp".to_string());
    let query = ModelQuery {
        task_type: "refactor".to_string(),
        language: Some("csharp".to_string()),
        max_vram_gb: Some(20.0),
        ..ModelQuery::default()
    };
    let now = Utc::now();

    for size in [100usize, 1_000, 10_000] {
        let records = model_records(size);
        group.bench_with_input(BenchmarkId::new("rank_models", size), &records, |b, records| {
            b.iter(|| rank_models(black_box(records), &query, &config, now));
        });

        let edges = co_edit_edges(size);
        group.bench_with_input(BenchmarkId::new("co_edit_clusters", size), &edges, |b, edges| {
            b.iter(|| clusters_from_edges(black_box(edges), 3));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_schema_init,
    bench_extraction,
    bench_traversal,
    bench_analytics,
);
criterion_main!(benches);
