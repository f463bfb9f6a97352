use tracing::info;
use typetrace_common::logging;
use typetrace_instrument::{instrument, instrument_with_options, InstrumentError, InstrumentOptions};

#[test]
fn test_simple_function_instrumentation() {
    logging::ensure_test_logging(None);
    info!("Running test");
    let source = "function f(a,b){ return a+b; }";

    let instrumented = instrument(source, "math.js").unwrap();

    assert!(instrumented.contains("twiz(\"f_entry\", 2,"));
    assert!(instrumented.contains("twiz(\"f_param_a\", a,"));
    assert!(instrumented.contains("twiz(\"f_param_b\", b,"));
    // The original body survives untouched.
    assert!(instrumented.contains("return a+b;"));
}

#[test]
fn test_instrumentation_is_deterministic() {
    logging::ensure_test_logging(None);
    let source = r#"
function greet(name) { return "hi " + name; }
const shout = (text) => text.toUpperCase();
"#;

    let first = instrument(source, "greet.js").unwrap();
    let second = instrument(source, "greet.js").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_expression_arrow_is_rewritten_to_block() {
    logging::ensure_test_logging(None);
    let source = "const f = x => x*2;";

    let instrumented = instrument(source, "math.js").unwrap();

    assert!(instrumented.contains("=> {"));
    assert!(instrumented.contains("twiz(\"f_param_x\", x,"));
    assert!(instrumented.contains("return x*2; };"));
}

#[test]
fn test_callback_arguments_carry_callee_metadata() {
    logging::ensure_test_logging(None);
    let source = "createRoutine('TODO', payload => ({ x: payload.x }));";

    let instrumented = instrument(source, "routine.js").unwrap();

    assert!(instrumented.contains("twiz(\"createRoutine_arg1_param_payload\", payload,"));
    assert!(instrumented.contains("\"calleeName\":\"createRoutine\""));
    assert!(instrumented.contains("\"calleeArgIndex\":1"));
    assert!(instrumented.contains("\"context\":\"callback_argument_parameter\""));
}

#[test]
fn test_original_lines_are_preserved() {
    logging::ensure_test_logging(None);
    let source = r#"const a = 1;
function f(x) {
    return x;
}
const b = 2;
"#;

    let instrumented = instrument(source, "lines.js").unwrap();

    // Instrumentation only splices text into existing lines; every original
    // line must keep its line number.
    let original_lines: Vec<&str> = source.lines().collect();
    let instrumented_lines: Vec<&str> = instrumented.lines().collect();
    assert_eq!(original_lines.len(), instrumented_lines.len());
    for (index, line) in original_lines.iter().enumerate() {
        assert!(
            instrumented_lines[index].contains(line.trim()),
            "line {} lost its content",
            index + 1
        );
    }
}

#[test]
fn test_prelude_is_prepended_once_on_first_line() {
    logging::ensure_test_logging(None);
    let source = "function f(a) { return a; }";

    let instrumented = instrument(source, "app.js").unwrap();

    assert!(instrumented.starts_with(";(function (g)"));
    assert_eq!(instrumented.matches("g.twiz = function").count(), 1);
    // Prelude and instrumented statement share the first physical line.
    assert!(instrumented.lines().next().unwrap().contains("return a;"));
}

#[test]
fn test_unparseable_source_reports_error() {
    logging::ensure_test_logging(None);
    let source = "function ((( nope";

    let result = instrument(source, "broken.js");
    assert!(matches!(result, Err(InstrumentError::SourceUnparseable { .. })));
}

#[test]
fn test_source_without_functions_is_unchanged() {
    logging::ensure_test_logging(None);
    let source = "const x = 1;\nconst y = x + 2;\n";

    let instrumented = instrument(source, "plain.js").unwrap();
    assert_eq!(instrumented, source);
}

#[test]
fn test_typescript_constructs() {
    logging::ensure_test_logging(None);
    let source = r#"
class TodoStore {
    constructor(private db: Database, public limit: number = 100) {}

    add(todo: Todo, ...tags: string[]) {
        this.db.push(todo);
    }
}
"#;

    let instrumented = instrument(source, "store.ts").unwrap();

    assert!(instrumented.contains("twiz(\"constructor_param_db\", db,"));
    assert!(instrumented.contains("\"accessibility\":\"private\""));
    assert!(instrumented.contains("\"accessibility\":\"public\""));
    assert!(instrumented.contains("\"hasDefault\":true"));
    assert!(instrumented.contains("twiz(\"add_param_todo\", todo,"));
    assert!(instrumented.contains("twiz(\"add_param_tags\", tags,"));
    assert!(instrumented.contains("\"isRest\":true"));
    assert!(instrumented.contains("\"parameterType\":\"annotated\""));
}

#[test]
fn test_destructured_parameters_use_synthetic_names() {
    logging::ensure_test_logging(None);
    let source = "function f({ id, done }, [x, y]) { return id; }";

    let instrumented = instrument(source, "destructure.js").unwrap();

    assert!(instrumented.contains("twiz(\"f_param_destructured_object\", { id: id, done: done },"));
    assert!(instrumented.contains("twiz(\"f_param_destructured_array\", [ x, y ],"));
    assert!(instrumented.contains("\"isDestructured\":true"));
}

#[test]
fn test_collector_url_is_baked_into_prelude() {
    logging::ensure_test_logging(None);
    let source = "function f(a) { return a; }";
    let options = InstrumentOptions {
        collector_url: "http://collector:9000/ingest".to_string(),
        flush_interval_ms: 250,
    };

    let instrumented = instrument_with_options(source, "app.js", &options).unwrap();
    assert!(instrumented.contains("\"http://collector:9000/ingest\""));
}

#[test]
fn test_reparse_of_instrumented_output_succeeds() {
    logging::ensure_test_logging(None);
    let source = r#"
function add(a, b) { return a + b; }
const double = x => x * 2;
items.map(item => item.id);
"#;

    let instrumented = instrument(source, "reparse.js").unwrap();

    // The instrumented output must itself be a valid module.
    let reparsed = typetrace_instrument::parse_module(&instrumented, "reparse.js");
    assert!(reparsed.is_ok());
}

#[test]
fn test_line_and_column_metadata_match_original_positions() {
    logging::ensure_test_logging(None);
    let source = "const a = 1;\nfunction f(x) { return x; }\n";

    let instrumented = instrument(source, "pos.js").unwrap();

    // `x` sits on line 2, column 11 of the original source.
    assert!(instrumented.contains("\"lineNumber\":2"));
    assert!(instrumented.contains("\"columnNumber\":11"));
}
