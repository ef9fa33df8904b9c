// Integration tests for the standard libraries
//
// Tests cover:
// - core: type values, to_string, cast, assert
// - math and data::vector reductions
// - meta: capturing and evaluating expressions
// - data::frame: reading CSV files

use pretty_assertions::assert_eq;
use qry::errors::{ErrorKind, QryError};
use qry::interpreter::native_functions::frame::DataFrame;
use qry::interpreter::native_functions::vector::FloatVector;
use qry::interpreter::{Interpreter, Value};
use std::fs;
use std::path::PathBuf;

fn run_code(code: &str) -> Result<Value, QryError> {
    let mut interp = Interpreter::new()?;
    interp.run(code)
}

fn value_of(code: &str) -> Value {
    match run_code(code) {
        Ok(value) => value,
        Err(err) => panic!("{} failed: {}", code, err.render()),
    }
}

/// A CSV file in the temp directory, removed on drop
struct TempCsv(PathBuf);

impl TempCsv {
    fn new(name: &str, contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("qry_{}_{}.csv", name, std::process::id()));
        fs::write(&path, contents).unwrap();
        TempCsv(path)
    }

    fn path(&self) -> String {
        self.0.display().to_string()
    }
}

impl Drop for TempCsv {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

#[test]
fn test_cast() {
    assert_eq!(value_of("cast(Int, 2.5)"), Value::Int(2));
    assert_eq!(value_of("cast(Int, -2.5)"), Value::Int(-2));
    assert_eq!(value_of("cast(Float, 2)"), Value::Float(2.0));
    assert_eq!(value_of("cast(String, 7)"), Value::str("7"));
    assert_eq!(value_of("cast(Bool, 0)"), Value::Bool(false));
    assert_eq!(value_of("cast(Int, true)"), Value::Int(1));
    assert_eq!(value_of("cast(Int, -9223372036854775808.0)"), Value::Int(i64::MIN));
}

#[test]
fn test_cast_out_of_range_float_to_int() {
    for code in ["cast(Int, cast(Float, \"1e300\"))", "cast(Int, cast(Float, \"-1e300\"))", "cast(Int, 9223372036854775807.0)"] {
        let err = run_code(code).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedConversion, "{}", code);
    }
}

#[test]
fn test_cast_without_conversion_is_unimplemented() {
    let err = run_code("cast(Float, true)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnimplementedMethod);
    assert_eq!(err.message, "unimplemented method \"cast\" for signature: Float|Bool");
}

#[test]
fn test_to_string() {
    assert_eq!(value_of("to_string(true)"), Value::str("true"));
    assert_eq!(value_of("to_string(\"as is\")"), Value::str("as is"));
    assert_eq!(value_of("to_string(Int)"), Value::str("Int"));
    assert_eq!(value_of("to_string(1.0)"), Value::str("1.0"));
}

#[test]
fn test_type_of() {
    assert_eq!(value_of("type_of(\"x\")"), Value::Type("String"));
    assert_eq!(value_of("type_of(type_of(1))"), Value::Type("Type"));
    assert_eq!(value_of("use data::*\ntype_of(intvec(1))"), Value::Type("IntVector"));
    assert_eq!(value_of("type_of(fn() { 1 })"), Value::Type("Function"));
}

#[test]
fn test_assert_failure_quotes_expression() {
    let err = run_code("assert(false)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::AssertionFailed);
    assert_eq!(err.message, "assertion failed: false");
}

#[test]
fn test_assert_sees_caller_scope() {
    assert_eq!(value_of("check <- fn(n) { assert(n > 0); n }\ncheck(4)"), Value::Int(4));
    let err = run_code("check <- fn(n) { assert(n > 0); n }\ncheck(-4)").unwrap_err();
    assert_eq!(err.message, "assertion failed: (n > 0)");
}

#[test]
fn test_math() {
    assert_eq!(value_of("use math::*\nmin(3, 9) + max(3, 9)"), Value::Int(12));
    assert_eq!(value_of("use math::*\nabs(-2.5)"), Value::Float(2.5));
    let err = run_code("use math::*\nmin(1, 2.0)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnimplementedMethod);
}

#[test]
fn test_vectors() {
    assert_eq!(value_of("use data::*\nintvec(4, 5, 6) |> sum()"), Value::Int(15));
    assert_eq!(value_of("use data::*\nintvec(4, 5, 6) |> length()"), Value::Int(3));
    assert_eq!(value_of("use data::*\nfloatvec(1, 2.0) |> mean()"), Value::Float(1.5));
    assert_eq!(value_of("use data::*\nfloatvec() |> sum()"), Value::Float(0.0));

    let err = run_code("use data::*\nfloatvec(1, \"two\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);

    let err = run_code("use data::*\nsum(3)").unwrap_err();
    assert_eq!(err.message, "unimplemented method \"sum\" for signature: Int");
}

#[test]
fn test_vector_sum_overflow() {
    let err = run_code("use data::*\nintvec(9223372036854775807, 1) |> sum()").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
}

#[test]
fn test_meta_evaluates_in_captured_environment() {
    let code = "
        use meta::*
        x <- 1
        ast <- get_ast(1 + 1 + x)
        x <- 40
        eval_ast(ast)
    ";
    assert_eq!(value_of(code), Value::Int(3));
    assert_eq!(value_of("use meta::*\nget_ast(1 + 1 + x) |> to_string()"), Value::str("((1 + 1) + x)"));
}

#[test]
fn test_meta_unbound_names_fail_on_evaluation() {
    let err = run_code("use meta::*\nast <- get_ast(nowhere + 1)\neval_ast(ast)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameNotFound);
}

#[test]
fn test_read_csv() {
    let csv = TempCsv::new("people", "name,age,score\nann,30,1.5\nbob,41,2\ncid,,3.25\n");
    let mut interp = Interpreter::new().unwrap();
    interp.run("use data::*").unwrap();

    let frame = interp.run(&format!("read_csv(\"{}\")", csv.path())).unwrap();
    let df = frame.as_host::<DataFrame>().unwrap();
    assert_eq!(df.columns, vec!["name", "age", "score"]);
    assert_eq!(df.rows.len(), 3);
    assert_eq!(df.rows[2][1], Value::Null);

    let source = format!("df <- read_csv(\"{}\")\ndf |> column(\"score\") |> sum()", csv.path());
    assert_eq!(interp.run(&source).unwrap(), Value::Float(6.75));

    let scores = interp.run("df |> column(\"score\")").unwrap();
    assert_eq!(scores.as_host::<FloatVector>(), Some(&FloatVector(vec![1.5, 2.0, 3.25])));

    assert_eq!(interp.run("df |> num_rows()").unwrap(), Value::Int(3));
    assert_eq!(interp.run("df |> num_cols()").unwrap(), Value::Int(3));

    let err = interp.run("df |> column(\"age\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    let err = interp.run("df |> column(\"height\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameNotFound);
}

#[test]
fn test_read_missing_csv() {
    let err = run_code("use data::*\nread_csv(\"/no/such/dir/file.csv\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
}
