//! Scheduler tests: dependency order, exactly-once ticks, failure handling

mod common;

use common::builders::{constant, position, tick_log, wire, Behavior, Overlap, RecorderBuilder};
use common::{collector, test_timeout};
use rpgml::pipeline::{Graph, NodeFactory, NodeType, ThreadPool};
use rpgml::{RpgmlError, Runtime, RuntimeConfig, Value};
use std::time::{Duration, Instant};

#[test]
fn test_diamond_runs_in_dependency_order() {
    let gc = collector();
    let log = tick_log();
    let src = RecorderBuilder::new("src", &log).gc(&gc).build();
    let left = RecorderBuilder::new("left", &log).gc(&gc).build();
    let right = RecorderBuilder::new("right", &log).gc(&gc).build();
    let sink = RecorderBuilder::new("sink", &log).gc(&gc).build();
    wire(&src, "out", &left, "a");
    wire(&src, "out", &right, "a");
    wire(&left, "out", &sink, "a");
    wire(&right, "out", &sink, "b");

    let pool = ThreadPool::new(4).unwrap();
    let mut graph = Graph::new(gc.clone());
    graph.add_node(&sink);

    for pass in 1..=5 {
        let report = graph.execute(pool.queue()).unwrap();
        assert_eq!(report.pass, pass);
        assert_eq!(report.ticked, 4);
        assert_eq!(report.failed, 0);
    }

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 20);
    for pass in 1..=5 {
        let ticks = log.iter().filter(|(p, _)| *p == pass).count();
        assert_eq!(ticks, 4, "pass {} ticked {} nodes", pass, ticks);
        assert!(position(&log, pass, "src") < position(&log, pass, "left"));
        assert!(position(&log, pass, "src") < position(&log, pass, "right"));
        assert!(position(&log, pass, "left") < position(&log, pass, "sink"));
        assert!(position(&log, pass, "right") < position(&log, pass, "sink"));
    }
}

#[test]
fn test_independent_nodes_tick_concurrently() {
    let gc = collector();
    let log = tick_log();
    let overlap = Overlap::new();
    let branches: Vec<_> = (0..4)
        .map(|i| {
            RecorderBuilder::new(&format!("branch{}", i), &log)
                .delay(Duration::from_millis(100))
                .overlap(&overlap)
                .gc(&gc)
                .build()
        })
        .collect();

    let pool = ThreadPool::new(4).unwrap();
    let mut graph = Graph::new(gc.clone());
    for branch in &branches {
        graph.add_node(branch);
    }

    let started = Instant::now();
    let report = graph.execute(pool.queue()).unwrap();
    assert!(started.elapsed() < test_timeout());
    assert_eq!(report.ticked, 4);
    assert!(overlap.peak() >= 2, "peak concurrency was {}", overlap.peak());
}

#[test]
fn test_constant_sum_across_passes() {
    let gc = collector();
    let a = constant("a", 23i32, &gc);
    let b = constant("b", 42i32, &gc);
    let sum = NodeFactory::create(NodeType::Add, "sum", Some(&gc)).unwrap();
    wire(&a, "out", &sum, "in1");
    wire(&b, "out", &sum, "in2");

    let pool = ThreadPool::new(2).unwrap();
    let mut graph = Graph::new(gc.clone());
    graph.add_node(&sum);

    let out = sum.output("out").unwrap();
    graph.execute(pool.queue()).unwrap();
    assert_eq!(out.data().unwrap().scalar_value(), Some(Value::I32(65)));

    // Unchanged inputs leave the result in place
    graph.execute(pool.queue()).unwrap();
    assert!(!out.has_changed());
    assert_eq!(out.data().unwrap().scalar_value(), Some(Value::I32(65)));

    a.set_param("value", None, &Value::I32(100)).unwrap();
    b.set_param("value", None, &Value::I32(-1)).unwrap();
    graph.execute(pool.queue()).unwrap();
    assert!(out.has_changed());
    assert_eq!(out.data().unwrap().scalar_value(), Some(Value::I32(99)));
}

#[test]
fn test_failing_node_does_not_stop_pass() {
    let gc = collector();
    let log = tick_log();
    let src = RecorderBuilder::new("src", &log).gc(&gc).build();
    let bad = RecorderBuilder::new("bad", &log)
        .behavior(Behavior::Fail)
        .gc(&gc)
        .build();
    let after = RecorderBuilder::new("after", &log).gc(&gc).build();
    let other = RecorderBuilder::new("other", &log).gc(&gc).build();
    wire(&src, "out", &bad, "a");
    wire(&bad, "out", &after, "a");
    wire(&src, "out", &other, "a");

    let pool = ThreadPool::new(2).unwrap();
    let mut graph = Graph::new(gc.clone());
    graph.add_node(&after);
    graph.add_node(&other);

    let report = graph.execute(pool.queue()).unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.ticked, 3);
    assert!(!bad.output("out").unwrap().has_changed());

    // The graph stays usable
    let report = graph.execute(pool.queue()).unwrap();
    assert_eq!(report.pass, 2);
    assert_eq!(report.failed, 1);
}

#[test]
fn test_panicking_node_is_contained() {
    let gc = collector();
    let log = tick_log();
    let src = RecorderBuilder::new("src", &log).gc(&gc).build();
    let boom = RecorderBuilder::new("boom", &log)
        .behavior(Behavior::Panic)
        .gc(&gc)
        .build();
    let sink = RecorderBuilder::new("sink", &log).gc(&gc).build();
    wire(&src, "out", &boom, "a");
    wire(&boom, "out", &sink, "a");

    let pool = ThreadPool::new(2).unwrap();
    let mut graph = Graph::new(gc.clone());
    graph.add_node(&sink);

    for _ in 0..3 {
        let report = graph.execute(pool.queue()).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.ticked, 2);
    }
    assert_eq!(pool.size(), 2);
}

#[test]
fn test_exit_request_skips_rest_of_pass() {
    let gc = collector();
    let log = tick_log();
    let stop = RecorderBuilder::new("stop", &log)
        .behavior(Behavior::Exit)
        .gc(&gc)
        .build();
    let sink = RecorderBuilder::new("sink", &log).gc(&gc).build();
    wire(&stop, "out", &sink, "a");

    let pool = ThreadPool::new(1).unwrap();
    let mut graph = Graph::new(gc.clone());
    graph.add_node(&sink);

    assert!(matches!(
        graph.execute(pool.queue()),
        Err(RpgmlError::ExitRequest)
    ));
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].1, "stop");
}

#[test]
fn test_runtime_honors_counter_limit() {
    let gc = collector();
    let counter = NodeFactory::create(NodeType::Counter, "count", Some(&gc)).unwrap();
    counter.set_param("limit", None, &Value::I64(7)).unwrap();
    let print = NodeFactory::create(NodeType::Print, "print", Some(&gc)).unwrap();
    wire(&counter, "out", &print, "in");

    let mut graph = Graph::new(gc.clone());
    graph.add_node(&print);
    let config = RuntimeConfig {
        threads: 3,
        max_passes: Some(50),
        ..RuntimeConfig::default()
    };
    let mut runtime = Runtime::new(config, graph, None, gc).unwrap();
    let summary = runtime.run().unwrap();
    assert!(summary.exit_requested);
    assert_eq!(summary.passes, 7);
    assert_eq!(
        counter.output("out").unwrap().data().unwrap().scalar_value(),
        Some(Value::U64(7))
    );
}

#[test]
fn test_wiring_after_registration_is_discovered() {
    let gc = collector();
    let log = tick_log();
    let a = RecorderBuilder::new("a", &log).gc(&gc).build();
    let b = RecorderBuilder::new("b", &log).gc(&gc).build();

    let pool = ThreadPool::new(2).unwrap();
    let mut graph = Graph::new(gc.clone());
    graph.add_node(&b);
    assert_eq!(graph.execute(pool.queue()).unwrap().ticked, 1);

    wire(&a, "out", &b, "a");
    graph.invalidate();
    let report = graph.execute(pool.queue()).unwrap();
    assert_eq!(graph.len(), 2);
    assert_eq!(report.ticked, 2);

    let log = log.lock().unwrap();
    assert!(position(&log, 2, "a") < position(&log, 2, "b"));
}
