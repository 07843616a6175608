//! Criterion benchmarks for the network tick.
//!
//! - `ladder`: 2000 segments joined by limited links, inline vs pooled predict
//! - `topology`: link/unlink churn on a long dissolved chain

use conduit_core::config::{ExecutionMode, NetworkConfig};
use conduit_core::connection::ConnData;
use conduit_core::network::Network;
use conduit_core::test_utils::*;
use criterion::{Criterion, criterion_group, criterion_main};

/// 1000 rungs; each rung is two segments joined by a limited link, and
/// neighboring rungs are joined on both sides.
fn build_ladder(execution: ExecutionMode) -> Network<DiffusionKind> {
    let config = NetworkConfig::default().with_execution(execution);
    let mut net = Network::new(DiffusionKind, config).expect("valid config");
    let rungs = 1000;
    for i in 0..rungs {
        let left = ident(1, &format!("L{i}"));
        let right = ident(1, &format!("R{i}"));
        net.link(&left, &right, ConnData::limited(10.0))
            .expect("rung link");
        if i > 0 {
            net.link(&ident(1, &format!("L{}", i - 1)), &left, ConnData::limited(5.0))
                .expect("rail link");
            net.link(&ident(1, &format!("R{}", i - 1)), &right, ConnData::limited(5.0))
                .expect("rail link");
        }
    }
    if let Some(segment) = net.segment_of(&ident(1, "L0")) {
        let _ = net.inject(segment, Level(1.0e6));
    }
    for _ in 0..3 {
        net.update(1);
    }
    net
}

fn bench_ladder(c: &mut Criterion) {
    let mut group = c.benchmark_group("ladder");
    group.sample_size(30);

    for (label, execution) in [
        ("2000_segments_inline", ExecutionMode::Inline),
        ("2000_segments_pooled", ExecutionMode::Background),
    ] {
        let mut net = build_ladder(execution);
        group.bench_function(label, |b| {
            b.iter(|| {
                net.update(1);
                net.join_predict();
            });
        });
    }

    group.finish();
}

fn bench_topology(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology");
    group.sample_size(30);

    let mut net = inline_network();
    let names: Vec<String> = (0..500).map(|i| format!("N{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    chain(&mut net, &refs);

    group.bench_function("unlink_relink_500_chain", |b| {
        b.iter(|| {
            let (left, right) = (ident(1, "N249"), ident(1, "N250"));
            net.unlink(&left, &right).expect("adjacent");
            net.link(&left, &right, ConnData::lossless()).expect("relink");
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ladder, bench_topology);
criterion_main!(benches);
