/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

extern crate criterion;
extern crate tristore;

use criterion::*;
use shared::query::AlgebraNode;
use shared::term_parser::parse_pattern_group;
use shared::terms::{Component, TypedValue};
use shared::triple::{Triple, TriplePattern};
use tristore::config::StoreConfig;
use tristore::query_layer::QueryLayer;
use tristore::store::{scan_range, MemoryStore, TripleWriter};

fn join_of(text: &str) -> AlgebraNode {
    let patterns = parse_pattern_group(text).unwrap();
    AlgebraNode::join_all(patterns.into_iter().map(AlgebraNode::Pattern)).unwrap()
}

fn setup_store(layer: &QueryLayer) -> MemoryStore {
    let writer = TripleWriter::new(layer.codec(), layer.config().table_prefix.clone());
    let mut store = MemoryStore::new();
    writer.create_tables(&mut store);
    let triples: Vec<Triple> = (0..10_000)
        .map(|i| {
            Triple::new(
                TypedValue::uri(format!("ex:employee{}", i % 2_000)),
                TypedValue::uri(format!("ex:attr{}", i % 5)),
                TypedValue::integer(i),
            )
        })
        .collect();
    writer.write_all(&mut store, &triples).unwrap();
    store
}

fn range_benchmark(c: &mut Criterion) {
    let layer = QueryLayer::new(StoreConfig::default()).unwrap();
    let store = setup_store(&layer);
    let codec = layer.codec();

    let subject = TriplePattern::new(
        Component::Bound(TypedValue::uri("ex:employee42")),
        Component::Unbound,
        Component::Unbound,
    );
    let salary_band = TriplePattern::new(
        Component::Unbound,
        Component::Bound(TypedValue::uri("ex:attr3")),
        Component::range(TypedValue::integer(1_000), TypedValue::integer(4_000)),
    );

    c.bench_function("define_range subject", |b| {
        b.iter(|| layer.prepare_scan(black_box(&subject)).unwrap())
    });

    c.bench_function("scan object range", |b| {
        b.iter(|| {
            let range = layer.prepare_scan(&salary_band).unwrap();
            scan_range(&store, &codec, &layer.config().table_prefix, &range).unwrap()
        })
    });
}

fn rewrite_benchmark(c: &mut Criterion) {
    let layer = QueryLayer::new(StoreConfig::default()).unwrap();
    for i in 0..20 {
        layer
            .define_pcj(
                &format!("pcj{}", i),
                join_of(&format!("?e <ex:attr{}> ?a . ?e <ex:worksFor> ?o .", i)),
                vec!["e".to_string(), "a".to_string(), "o".to_string()],
            )
            .unwrap();
    }
    let queries: Vec<AlgebraNode> = (0..64)
        .map(|i| {
            join_of(&format!(
                "?x <ex:attr{}> ?v . ?x <ex:worksFor> ?c . ?c <ex:locatedIn> ?city .",
                i % 25
            ))
        })
        .collect();

    c.bench_function("rewrite single", |b| b.iter(|| layer.rewrite(black_box(&queries[3]))));

    c.bench_function("rewrite batch", |b| b.iter(|| layer.rewrite_batch(black_box(&queries))));
}

criterion_group!(benches, range_benchmark, rewrite_benchmark);
criterion_main!(benches);
