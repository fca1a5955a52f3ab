//! Pipeline tests: keys flow from a data source through the executor into a sink.

use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use temporal_abstraction::definition::{LowLevelAbstractionDefinition, LowLevelAbstractionValueDefinition};
use temporal_abstraction::*;
use temporal_abstraction_query::*;

// ─────────────────────── helpers ───────────────────────

/// Fails on any value above 1000, otherwise reports "OK".
#[derive(Debug)]
struct RejectsOutliers;

impl Algorithm for RejectsOutliers {
    fn id(&self) -> &str {
        "rejectsOutliers"
    }

    fn input_value_type(&self) -> ValueType {
        ValueType::Number
    }

    fn minimum_number_of_values(&self) -> usize {
        1
    }

    fn maximum_number_of_values(&self) -> Option<usize> {
        Some(1)
    }

    fn parameters(&self) -> &[AlgorithmParameter] {
        &[]
    }

    fn compute(&self, segment: &ParameterSegment<'_>, _arguments: &AlgorithmArguments) -> AbstractionResult<Option<Value>> {
        match segment.first().value.as_ref().and_then(Value::as_number) {
            Some(v) if v > 1000.0 => Err(AbstractionError::AlgorithmProcessing {
                algorithm: self.id().to_string(),
                reason: format!("outlier {v}"),
            }),
            _ => Ok(Some(Value::nominal("OK"))),
        }
    }
}

struct FailingSink;

impl ResultsSink for FailingSink {
    fn handle(&mut self, _results: KeyResults) -> QueryResult<()> {
        Err(QueryError::Sink("disk full".into()))
    }
}

fn knowledge() -> Arc<dyn KnowledgeSource> {
    let kb = InMemoryKnowledgeSource::from_definitions([
        PropositionDefinition::primitive_parameter("HR", ValueType::Number),
        PropositionDefinition::low_level(
            "HR_HIGH",
            LowLevelAbstractionDefinition::new(["HR"])
                .with_algorithm("stateDetector")
                .with_value_definition(LowLevelAbstractionValueDefinition::new(Value::nominal("HIGH")).with_parameters(
                    AlgorithmArguments::new().with("minThreshold", Value::Number(100.0), ValueComparator::GreaterThan),
                )),
        ),
        PropositionDefinition::low_level(
            "HR_CHECKED",
            LowLevelAbstractionDefinition::new(["HR"])
                .with_algorithm("rejectsOutliers")
                .with_value_definition(LowLevelAbstractionValueDefinition::new(Value::nominal("OK"))),
        ),
    ])
    .unwrap();
    Arc::new(kb)
}

fn algorithms() -> Arc<dyn AlgorithmSource> {
    let mut algorithms = Algorithms::with_builtins();
    algorithms.register(Arc::new(RejectsOutliers));
    Arc::new(algorithms)
}

fn pipeline(config: QueryConfig) -> QueryPipeline {
    QueryPipeline::new(knowledge(), algorithms(), config)
}

fn batch(key_id: &str, values: &[(i64, f64)]) -> KeyBatch {
    KeyBatch::new(
        key_id,
        values
            .iter()
            .map(|&(at, v)| Arc::new(Proposition::primitive_parameter("HR", at, Value::Number(v)))),
    )
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_every_key_reaches_the_sink_in_order() {
    let source = VecDataSource::new([
        batch("p1", &[(0, 120.0), (5, 130.0)]),
        batch("p2", &[(0, 80.0)]),
        batch("p3", &[(0, 110.0)]),
    ]);
    let query = Query::new(["HR_HIGH"]).with_id("q1");
    let (report, sink) = pipeline(QueryConfig::default())
        .run(&query, source, CollectingSink::new())
        .await
        .unwrap();

    assert_eq!(report.query_id, "q1");
    assert_eq!(report.keys_processed, 3);
    assert!(report.failures.is_empty());
    assert!(!report.interrupted);

    let results = sink.into_results();
    let keys: Vec<&str> = results.iter().map(|r| r.key_id.as_str()).collect();
    assert_eq!(keys, vec!["p1", "p2", "p3"]);
    assert_eq!(results[0].propositions.len(), 1);
    assert_eq!(results[0].propositions[0].interval, Some(Interval::new(0, 5)));
    assert!(results[1].propositions.is_empty());
}

#[tokio::test]
async fn test_failed_key_is_reported_and_others_continue() {
    let source = VecDataSource::new([
        batch("p1", &[(0, 80.0)]),
        batch("p2", &[(0, 5000.0)]),
        batch("p3", &[(0, 90.0)]),
    ]);
    let (report, sink) = pipeline(QueryConfig::default())
        .run(&Query::new(["HR_CHECKED"]), source, CollectingSink::new())
        .await
        .unwrap();

    assert_eq!(report.keys_processed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key_id, "p2");
    assert!(report.failures[0].error.contains("outlier"));
    let keys: Vec<String> = sink.into_results().into_iter().map(|r| r.key_id).collect();
    assert_eq!(keys, vec!["p1", "p3"]);
}

#[tokio::test]
async fn test_unknown_proposition_aborts_with_query_id() {
    let query = Query::new(["NOPE"]).with_id("q-missing");
    let err = pipeline(QueryConfig::default())
        .run(&query, VecDataSource::new([batch("p1", &[(0, 1.0)])]), CollectingSink::new())
        .await
        .err();
    match err {
        Some(QueryError::Aborted { query_id, source }) => {
            assert_eq!(query_id, "q-missing");
            assert!(matches!(source, AbstractionError::UnknownDefinition(_)));
        }
        other => panic!("expected aborted query, got {other:?}"),
    }
}

#[tokio::test]
async fn test_interrupted_pipeline_processes_nothing() {
    let pipeline = pipeline(QueryConfig::default());
    pipeline.interrupt();
    let (report, sink) = pipeline
        .run(
            &Query::new(["HR_HIGH"]),
            VecDataSource::new([batch("p1", &[(0, 120.0)])]),
            CollectingSink::new(),
        )
        .await
        .unwrap();
    assert!(report.interrupted);
    assert_eq!(report.keys_processed, 0);
    assert!(sink.results().is_empty());
}

#[tokio::test]
async fn test_unit_capacity_queues_drain_every_key() {
    let config = QueryConfig {
        queue_capacity: 1,
        results_capacity: 1,
        ..QueryConfig::default()
    };
    let batches: Vec<KeyBatch> = (0..25).map(|i| batch(&format!("p{i}"), &[(0, 150.0)])).collect();
    let (report, sink) = pipeline(config)
        .run(&Query::new(["HR_HIGH"]), VecDataSource::new(batches), CollectingSink::new())
        .await
        .unwrap();
    assert_eq!(report.keys_processed, 25);
    assert_eq!(sink.results().len(), 25);
    assert_eq!(sink.results()[24].key_id, "p24");
}

#[tokio::test]
async fn test_sink_failure_stops_the_query() {
    let batches: Vec<KeyBatch> = (0..10).map(|i| batch(&format!("p{i}"), &[(0, 150.0)])).collect();
    let err = pipeline(QueryConfig::default())
        .run(&Query::new(["HR_HIGH"]), VecDataSource::new(batches), FailingSink)
        .await
        .err();
    assert!(matches!(err, Some(QueryError::Sink(_))));
}

#[tokio::test]
async fn test_zero_capacity_is_rejected() {
    let config = QueryConfig {
        queue_capacity: 0,
        ..QueryConfig::default()
    };
    let err = pipeline(config)
        .run(&Query::new(["HR_HIGH"]), VecDataSource::default(), CollectingSink::new())
        .await
        .err();
    assert!(matches!(err, Some(QueryError::Config(_))));
}

#[tokio::test]
async fn test_json_lines_files_in_and_out() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("data.jsonl");
    let out_path = dir.path().join("results.jsonl");

    let mut data = std::fs::File::create(&data_path).unwrap();
    for b in [batch("p1", &[(0, 120.0), (10, 140.0)]), batch("p2", &[(0, 60.0)])] {
        writeln!(data, "{}", serde_json::to_string(&b).unwrap()).unwrap();
    }
    drop(data);

    let source = JsonLinesDataSource::open(&data_path).unwrap();
    let sink = JsonLinesSink::create(&out_path).unwrap();
    let (report, sink) = pipeline(QueryConfig::default())
        .run(&Query::new(["HR_HIGH"]), source, sink)
        .await
        .unwrap();
    assert_eq!(report.keys_processed, 2);
    assert_eq!(sink.written(), 2);
    drop(sink);

    let lines: Vec<KeyResults> = BufReader::new(std::fs::File::open(&out_path).unwrap())
        .lines()
        .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].key_id, "p1");
    let high = &lines[0].propositions[0];
    assert_eq!(high.value, Some(Value::nominal("HIGH")));
    assert_eq!(lines[0].backward[&high.unique_id].len(), 2);
    assert!(lines[0].references.contains_key(&high.unique_id));
}

#[tokio::test]
async fn test_missing_data_file_is_a_data_source_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = JsonLinesDataSource::open(&dir.path().join("absent.jsonl")).err();
    assert!(matches!(err, Some(QueryError::DataSource(_))));
}
