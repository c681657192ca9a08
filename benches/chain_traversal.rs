//! Performance benchmarks for LoRA chain traversal
//!
//! - Long linear chains of stackers
//! - Dense cyclic chains (every provider feeds every later one, plus a back edge)
//! - Text/list reconciliation on a large loras widget
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lm_graph_sync::{
    chain::{collect_active_loras_from_chain, downstream_chain_nodes, LORA_STACK_INPUT},
    config::{NodeClasses, STACKER_CLASS},
    graph::{Graph, Link, Node, NodeId, NodeInput, NodeOutput, Widget},
    lora::{format_lora_tags, merge_loras, LoraEntry},
};
use serde_json::json;

fn stacker(id: i64) -> Node {
    let mut node = Node::new(id, STACKER_CLASS);
    node.widgets.push(Widget {
        name: "loras".to_string(),
        value: json!([
            {"name": format!("lora_{id}_a"), "strength": 1.0, "active": true},
            {"name": format!("lora_{id}_b"), "strength": 0.5, "active": false},
        ]),
    });
    node.outputs.push(NodeOutput {
        name: "LORA_STACK".to_string(),
        links: Vec::new(),
    });
    node
}

fn connect(graph: &mut Graph, link_id: i64, origin: i64, target: i64) {
    graph.links.insert(Link::new(link_id, origin, target));
    for node in graph.nodes.iter_mut() {
        if node.id == NodeId::Num(origin) {
            node.outputs[0].links.push(link_id);
        }
        if node.id == NodeId::Num(target) {
            node.inputs.push(NodeInput {
                name: LORA_STACK_INPUT.to_string(),
                link: Some(link_id),
            });
        }
    }
}

fn linear_chain(len: i64) -> Graph {
    let mut graph = Graph {
        nodes: (0..len).map(stacker).collect(),
        ..Default::default()
    };
    for id in 1..len {
        connect(&mut graph, id, id - 1, id);
    }
    graph
}

fn dense_cyclic(len: i64) -> Graph {
    let mut graph = Graph {
        nodes: (0..len).map(stacker).collect(),
        ..Default::default()
    };
    let mut link_id = 0;
    for origin in 0..len {
        for target in origin + 1..len {
            link_id += 1;
            connect(&mut graph, link_id, origin, target);
        }
    }
    connect(&mut graph, link_id + 1, len - 1, 0);
    graph
}

fn bench_linear_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_chain");
    for len in [10, 100, 500] {
        let graph = linear_chain(len);
        let tail = NodeId::Num(len - 1);
        group.bench_with_input(BenchmarkId::from_parameter(len), &graph, |b, graph| {
            b.iter(|| {
                let node = graph.graph_node(&tail).unwrap();
                black_box(collect_active_loras_from_chain(node, NodeClasses::builtin()))
            });
        });
    }
    group.finish();
}

fn bench_dense_cyclic(c: &mut Criterion) {
    let graph = dense_cyclic(60);
    c.bench_function("dense_cyclic_collect", |b| {
        b.iter(|| {
            let node = graph.graph_node(&NodeId::Num(59)).unwrap();
            black_box(collect_active_loras_from_chain(node, NodeClasses::builtin()))
        });
    });
    c.bench_function("dense_cyclic_downstream", |b| {
        b.iter(|| {
            let node = graph.graph_node(&NodeId::Num(0)).unwrap();
            black_box(downstream_chain_nodes(node, NodeClasses::builtin()).len())
        });
    });
}

fn bench_merge_loras(c: &mut Criterion) {
    let entries: Vec<LoraEntry> = (0..200)
        .map(|i| LoraEntry::new(&format!("lora_{i}"), 0.5))
        .collect();
    let text = format_lora_tags(&entries[50..]);
    c.bench_function("merge_loras_200", |b| {
        b.iter(|| black_box(merge_loras(black_box(&text), &entries)));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(50);
    targets =
        bench_linear_chain,
        bench_dense_cyclic,
        bench_merge_loras
}

criterion_main!(benches);
