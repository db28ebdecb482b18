//! Сквозные тесты конвейера через `compile_and_run`.

use std::io::Write;
use std::time::{Duration, Instant};

use psc_lang::{
    compile_and_run, compile_file, CompileOptions, CompileOutcome, Compiler, Phase, PscError,
};

fn run(source: &str) -> CompileOutcome {
    compile_and_run(source)
}

fn run_ok(source: &str) -> String {
    let outcome = run(source);
    assert!(
        outcome.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        outcome.diagnostics
    );
    outcome.captured_output
}

fn messages(outcome: &CompileOutcome, phase: Phase) -> Vec<String> {
    outcome
        .diagnostics
        .iter()
        .filter(|d| d.phase == phase)
        .map(|d| d.message.clone())
        .collect()
}

const SUM_PROGRAM: &str = r#"
inicio
    entero n = 4;
    entero suma = 0;
    para i desde 1 hasta n hacer
        suma = suma + i;
    fin_para
    mostrar("suma", suma);
fin
"#;

#[test]
fn test_sum_loop() {
    assert_eq!(run_ok(SUM_PROGRAM), "suma 10\n");
}

#[test]
fn test_if_else_and_booleans() {
    let source = r#"
inicio
    entero x = 5;
    booleano b = verdadero AND NOT falso;
    si (x > 3) entonces
        mostrar("grande");
    sino
        mostrar("chico");
    fin_si
    mostrar(b, x == 5);
fin
"#;
    assert_eq!(run_ok(source), "grande\nTrue True\n");
}

#[test]
fn test_while_and_repeat() {
    let source = r#"
inicio
    entero k = 0;
    mientras (k < 3) hacer
        k = k + 1;
    fin_mientras
    repetir
        k = k + 10;
    hasta_que (k > 20);
    mostrar(k);
fin
"#;
    assert_eq!(run_ok(source), "23\n");
}

#[test]
fn test_repeat_body_runs_once_even_if_condition_holds() {
    let source = "entero k = 100; repetir mostrar(k); hasta_que (k > 0);";
    assert_eq!(run_ok(source), "100\n");
}

#[test]
fn test_arithmetic_semantics() {
    let source = r#"
decimal d = 7 / 2;
decimal e = 1.5;
entero m = 17 % 5;
mostrar(d, e * 2, m, -m + 1);
"#;
    assert_eq!(run_ok(source), "3.5 3.0 2 -1\n");
}

#[test]
fn test_for_with_step() {
    let source = "para i desde 0 hasta 10 con_paso 5 hacer mostrar(i); fin_para";
    assert_eq!(run_ok(source), "0\n5\n10\n");
}

#[test]
fn test_single_iteration_range() {
    let source = "para i desde 1 hasta 1 hacer mostrar(i); fin_para";
    assert_eq!(run_ok(source), "1\n");
}

#[test]
fn test_inverted_range_is_semantic_error() {
    let outcome = run("para i desde 5 hasta 1 hacer mostrar(i); fin_para");
    let semantic = messages(&outcome, Phase::Semantic);
    assert_eq!(semantic.len(), 1);
    assert!(semantic[0].contains("never runs"), "{}", semantic[0]);
    assert!(outcome.captured_output.is_empty());
}

#[test]
fn test_division_by_literal_zero() {
    let outcome = run("mostrar(5 / 0);");
    assert_eq!(messages(&outcome, Phase::Semantic), vec!["division by zero"]);
    assert!(!outcome.diagnostics.iter().any(|d| d.phase == Phase::Execution));
}

#[test]
fn test_constant_reassignment_rejected() {
    let outcome = run("constante x = 5;\nx = 6;");
    assert_eq!(outcome.diagnostics.len(), 1);
    let diagnostic = &outcome.diagnostics[0];
    assert_eq!(diagnostic.phase, Phase::Semantic);
    assert_eq!(diagnostic.line, 2);
    assert_eq!(diagnostic.message, "cannot assign to constant 'x'");
}

#[test]
fn test_infinite_loop_times_out() {
    let options = CompileOptions {
        timeout: Duration::from_millis(200),
        ..CompileOptions::default()
    };
    let start = Instant::now();
    let outcome = Compiler::new(options)
        .compile_and_run("mientras (verdadero) hacer mostrar(1); fin_mientras");
    assert!(start.elapsed() < Duration::from_secs(3));

    let execution = messages(&outcome, Phase::Execution);
    assert_eq!(execution.len(), 1);
    assert!(execution[0].contains("timed out"), "{}", execution[0]);
    assert!(outcome.captured_output.starts_with("1\n"));
}

#[test]
fn test_printing_loop_hits_default_timeout() {
    let start = Instant::now();
    let outcome = run("mientras (verdadero) hacer mostrar(1); fin_mientras");
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(
        messages(&outcome, Phase::Execution),
        vec!["execution timed out after 5.0s: possible infinite loop"]
    );
    assert!(outcome.captured_output.starts_with("1\n1\n"));
}

#[test]
fn test_long_operator_chain() {
    let source = format!("mostrar(1{});", " + 1".repeat(100_000));
    assert_eq!(run_ok(&source), "100001\n");
}

#[test]
fn test_runs_are_independent() {
    let source = "entero a = 1;\nentero a = 2;\nmostrar(b);";
    let first = run(source);
    let second = run(source);
    assert_eq!(first, second);
    assert_eq!(first.diagnostics.len(), 2);
}

#[test]
fn test_optimizer_preserves_output() {
    let programs = [
        SUM_PROGRAM,
        "entero a = 3; entero b = a * 2; entero c = b + a; mostrar(a);",
        "entero x = 0; para i desde 1 hasta 3 hacer x = x + i; si (x > 2) entonces mostrar(x); fin_si fin_para",
        "decimal f = 2.5; entero n = 0; repetir n = n + 1; f = f * 2; hasta_que (n >= 3); mostrar(n);",
    ];
    let plain = Compiler::new(CompileOptions {
        optimize: false,
        ..CompileOptions::default()
    });
    let optimized = Compiler::default();
    for source in programs {
        let a = plain.compile_and_run(source);
        let b = optimized.compile_and_run(source);
        assert_eq!(a, b, "outputs differ for {}", source);
        assert!(a.diagnostics.is_empty());
    }
}

#[test]
fn test_optimizer_keeps_faulting_dead_assignment() {
    let source = "entero a = 0;\nentero b = 7 % a;\nmostrar(1);";
    let plain = Compiler::new(CompileOptions {
        optimize: false,
        ..CompileOptions::default()
    })
    .compile_and_run(source);
    let optimized = run(source);
    assert_eq!(plain, optimized);

    assert!(optimized.captured_output.is_empty());
    assert_eq!(optimized.diagnostics.len(), 1);
    let diagnostic = &optimized.diagnostics[0];
    assert_eq!(diagnostic.phase, Phase::Execution);
    assert_eq!(diagnostic.line, 2);
    assert!(diagnostic.message.starts_with("ZeroDivisionError"));
}

#[test]
fn test_runtime_error_reports_source_line() {
    let source = "entero a = 0;\nmostrar(1);\nmostrar(7 % a);\nmostrar(2);";
    let outcome = run(source);
    assert_eq!(outcome.captured_output, "1\n");
    assert_eq!(outcome.diagnostics.len(), 1);
    let diagnostic = &outcome.diagnostics[0];
    assert_eq!(diagnostic.phase, Phase::Execution);
    assert_eq!(diagnostic.line, 3);
    assert!(diagnostic.message.starts_with("ZeroDivisionError"));
}

#[test]
fn test_errors_in_several_phases_are_collected() {
    let source = "inicio\nentero x = 5 @;\nentero = 3;\nmostrar(x);\nfin";
    let outcome = run(source);
    let groups = outcome.by_phase();
    assert!(groups.contains_key(&Phase::Lexical));
    assert!(groups.contains_key(&Phase::Syntactic));
    assert!(!groups.contains_key(&Phase::Execution));
    assert!(outcome.captured_output.is_empty());
}

#[test]
fn test_outcome_serializes_to_json() {
    let outcome = run("mostrar(y);");
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["captured_output"], "");
    assert_eq!(json["diagnostics"][0]["phase"], "semantic");
    assert_eq!(json["diagnostics"][0]["line"], 1);
}

#[test]
fn test_compile_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", SUM_PROGRAM).unwrap();
    let outcome = compile_file(file.path()).unwrap();
    assert_eq!(outcome.captured_output, "suma 10\n");
}

#[test]
fn test_compile_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = compile_file(dir.path().join("missing.psc")).unwrap_err();
    assert!(matches!(err, PscError::IoError(_)));
}
