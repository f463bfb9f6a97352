use serde_json::json;
use serial_test::serial;
use tracing::info;
use typetrace_integration_tests::{batch_for_source, start_test_collector};

#[tokio::test]
async fn test_ingest_and_stats_over_http() {
    let (handle, base) = start_test_collector().await.unwrap();
    info!("collector at {base}");
    let client = reqwest::Client::new();

    let batch = json!([
        ["math.js", 11, [[1, null]], {
            "functionName": "f", "parameterName": "a", "parameterIndex": 0,
            "context": "function_declaration_parameter", "lineNumber": 1, "columnNumber": 11
        }],
        ["math.js", 13, [[2, null]], {
            "functionName": "f", "parameterName": "b", "parameterIndex": 1,
            "context": "function_declaration_parameter", "lineNumber": 1, "columnNumber": 13
        }]
    ]);

    let response = client.post(format!("{base}/ingest")).json(&batch).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["records"], json!(2));

    let stats: serde_json::Value =
        client.get(format!("{base}/stats")).send().await.unwrap().json().await.unwrap();
    assert_eq!(stats["totalEntities"], json!(2));
    assert_eq!(stats["distinctFiles"], json!(1));

    let entities: serde_json::Value =
        client.get(format!("{base}/entities")).send().await.unwrap().json().await.unwrap();
    assert_eq!(entities["total"], json!(2));
    assert_eq!(entities["hasMore"], json!(false));

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_empty_batch_returns_200_without_state_change() {
    let (handle, base) = start_test_collector().await.unwrap();
    let client = reqwest::Client::new();

    let response =
        client.post(format!("{base}/ingest")).json(&json!([])).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let stats: serde_json::Value =
        client.get(format!("{base}/stats")).send().await.unwrap().json().await.unwrap();
    assert_eq!(stats["totalEntities"], json!(0));

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_malformed_batches_are_rejected_with_400() {
    let (handle, base) = start_test_collector().await.unwrap();
    let client = reqwest::Client::new();

    let not_an_array =
        client.post(format!("{base}/ingest")).json(&json!({"x": 1})).send().await.unwrap();
    assert_eq!(not_an_array.status(), 400);

    let bad_record = client
        .post(format!("{base}/ingest"))
        .json(&json!([["missing-fields"]]))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_record.status(), 400);

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_instrumented_source_attribution_round_trip() {
    let (handle, base) = start_test_collector().await.unwrap();
    let client = reqwest::Client::new();

    // One call f(1, 2) plus a callback invocation, as the injected hooks
    // would report them.
    let source = r#"
function f(a, b) { return a + b; }
createRoutine('TODO', payload => ({ x: payload.x }));
"#;
    let batch = batch_for_source(
        source,
        "app.js",
        &[
            ("f_param_a", json!(1)),
            ("f_param_b", json!(2)),
            ("createRoutine_arg1_param_payload", json!({"x": 7})),
        ],
    )
    .unwrap();

    let response = client.post(format!("{base}/ingest")).json(&batch).send().await.unwrap();
    assert_eq!(response.status(), 200);

    // Parameter entities carry the labels derived from their metadata.
    let entities: serde_json::Value = client
        .get(format!("{base}/entities?filename=app.js"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<String> = entities["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["entityName"].as_str().map(str::to_string))
        .collect();
    assert!(names.contains(&"f_param_a".to_string()));
    assert!(names.contains(&"f_param_b".to_string()));
    assert!(names.contains(&"f_entry".to_string()));
    assert!(names.contains(&"createRoutine_arg1_param_payload".to_string()));

    // The callback parameter produced a HOF relationship row.
    let hof: serde_json::Value = client
        .post(format!("{base}/query"))
        .json(&json!({
            "sql": "SELECT callee_name, callee_arg_index FROM hof_relationships",
            "params": []
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hof["rows"], json!([["createRoutine", 1]]));

    // Location lookup finds f's parameters on line 2.
    let location: serde_json::Value = client
        .get(format!("{base}/location?filename=app.js&line_number=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!location["matches"].as_array().unwrap().is_empty());

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_location_requires_parameters() {
    let (handle, base) = start_test_collector().await.unwrap();
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/location")).send().await.unwrap();
    assert_eq!(response.status(), 400);

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_enum_candidates_over_http() {
    let (handle, base) = start_test_collector().await.unwrap();
    let client = reqwest::Client::new();

    for state in ["pending", "running", "done"] {
        for _ in 0..5 {
            let batch = json!([[
                "src/pipeline.ts", 60,
                [[state, null]],
                {"functionName": "advance", "parameterName": "state",
                 "context": "function_declaration_parameter"}
            ]]);
            client.post(format!("{base}/ingest")).json(&batch).send().await.unwrap();
        }
    }

    let enums: serde_json::Value = client
        .get(format!("{base}/enums?min_observations=3&min_unique_strings=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(enums["total"], json!(1));
    let candidate = &enums["items"][0];
    assert_eq!(candidate["entityName"], json!("advance_param_state"));
    assert_eq!(candidate["uniqueStrings"], json!(3));
    let suggested = candidate["suggestedName"].as_str().unwrap();
    assert!(suggested.starts_with("Pipeline"));

    handle.shutdown().unwrap();
}

#[tokio::test]
async fn test_adhoc_query_rejects_multi_statement_over_http() {
    let (handle, base) = start_test_collector().await.unwrap();
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/query"))
        .json(&json!({"sql": "SELECT 1; SELECT 2", "params": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    handle.shutdown().unwrap();
}

#[tokio::test]
#[serial]
async fn test_runtime_reporter_flushes_to_collector() {
    let (handle, base) = start_test_collector().await.unwrap();

    typetrace_runtime::reset();
    typetrace_runtime::configure(typetrace_runtime::ReporterConfig {
        collector_url: Some(format!("{base}/ingest")),
        flush_interval: std::time::Duration::from_millis(50),
    });

    let todo = typetrace_runtime::RuntimeValue::object(vec![
        ("id".to_string(), typetrace_runtime::RuntimeValue::str("a")),
        ("done".to_string(), typetrace_runtime::RuntimeValue::Bool(false)),
    ]);
    typetrace_runtime::track(&todo, "todo.ts", 44);
    typetrace_runtime::record(
        "addTodo_param_todo",
        &todo,
        120,
        "todo.ts",
        typetrace_common::ObservationMetadata {
            function_name: Some("addTodo".into()),
            parameter_name: Some("todo".into()),
            context: Some("function_declaration_parameter".into()),
            ..Default::default()
        },
    );
    typetrace_runtime::flush_now().await;

    let client = reqwest::Client::new();
    let entities: serde_json::Value = client
        .get(format!("{base}/entities?filename=todo.ts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(entities["total"], json!(1));
    assert_eq!(entities["items"][0]["entityName"], json!("addTodo_param_todo"));

    // The object shape made it into the shape table.
    let shapes: serde_json::Value = client
        .get(format!("{base}/shapes?min_observations=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(shapes["items"][0]["shapeSignature"], json!("done:boolean,id:string"));

    typetrace_runtime::reset();
    handle.shutdown().unwrap();
}
