// Integration tests for query pipelines against an in-memory SQLite database
//
// Each test seeds a `people` table with three rows, builds pipelines with
// the data::sql verbs, and checks both the generated SQL and the rows the
// database returns.

use pretty_assertions::assert_eq;
use qry::errors::{ErrorKind, QryError};
use qry::interpreter::native_functions::frame::DataFrame;
use qry::interpreter::{Interpreter, Value};

const SETUP: &str = r#"use data::*
conn <- connect_sqlite(":memory:")
execute(conn, "create table people (name text, age integer)")
"#;

const INSERT: &str = r#"execute(conn, "insert into people (name, age) values ('ruan', 26), ('ruanlater', 27), ('thirdperson', 27)")"#;

fn seeded() -> Interpreter {
    let mut interp = Interpreter::new().unwrap();
    interp.run(SETUP).unwrap();
    interp.run(INSERT).unwrap();
    interp.run("people <- get_table(conn, \"people\")").unwrap();
    interp
}

fn run_code(code: &str) -> Result<Value, QryError> {
    seeded().run(code)
}

fn value_of(code: &str) -> Value {
    match run_code(code) {
        Ok(value) => value,
        Err(err) => panic!("{} failed: {}", code, err.render()),
    }
}

#[test]
fn test_insert_reports_affected_rows() {
    let mut interp = Interpreter::new().unwrap();
    interp.run(SETUP).unwrap();
    assert_eq!(interp.run(INSERT).unwrap(), Value::Int(3));
}

#[test]
fn test_filter_collects_matching_rows() {
    assert_eq!(value_of("people |> filter(age < 27) |> collect() |> num_rows()"), Value::Int(1));
    assert_eq!(value_of("people |> filter(age >= 27) |> count_rows()"), Value::Int(2));
}

#[test]
fn test_filter_with_several_conditions() {
    assert_eq!(value_of("people |> filter(age > 26, name == \"ruanlater\") |> count_rows()"), Value::Int(1));
    assert_eq!(value_of("people |> filter(age != 26 && name != \"ruanlater\") |> count_rows()"), Value::Int(1));
    assert_eq!(value_of("people |> filter(age == 26 || name == \"thirdperson\") |> count_rows()"), Value::Int(2));
    assert_eq!(value_of("people |> filter(!(age == 26)) |> count_rows()"), Value::Int(2));
}

#[test]
fn test_filter_sql() {
    assert_eq!(
        value_of("people |> filter(age != 26 && name == \"it's\") |> to_sql()"),
        Value::str("select * from (select * from people) qry_alias_1 where ((age <> 26) and (name = 'it''s'))")
    );
}

#[test]
fn test_interpolation_reads_caller_bindings() {
    assert_eq!(value_of("max_age <- 26\npeople |> filter(age <= {{max_age}}) |> count_rows()"), Value::Int(1));
    assert_eq!(
        value_of("max_age <- 26\npeople |> filter(age <= {{max_age + 1}}) |> to_sql()"),
        Value::str("select * from (select * from people) qry_alias_1 where (age <= 27)")
    );
}

#[test]
fn test_interpolation_inside_function_uses_its_arguments() {
    let code = "
        older_than <- fn(limit: Int) { people |> filter(age > {{limit}}) |> count_rows() }
        older_than(26)
    ";
    assert_eq!(value_of(code), Value::Int(2));
}

#[test]
fn test_interpolating_null_is_rejected() {
    let err = run_code("nothing <- null\npeople |> filter(age == {{nothing}})").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SqlTranslation);
}

#[test]
fn test_aggregate_by_group() {
    let code = "people |> aggregate(group(age), total_years = sum(age)) |> collect()";
    let mut interp = seeded();
    let frame = interp.run(code).unwrap();
    let frame = frame.as_host::<DataFrame>().unwrap();
    assert_eq!(frame.columns, vec!["age", "total_years"]);
    assert_eq!(frame.rows.len(), 2);
    assert_eq!(interp.run(&format!("{} |> column(\"total_years\") |> sum()", code)).unwrap(), Value::Int(80));
}

#[test]
fn test_aggregate_sql() {
    assert_eq!(
        value_of("people |> aggregate(group(age), n = count()) |> to_sql()"),
        Value::str("select age, count(*) as n from (select * from people) qry_alias_1 group by age")
    );
}

#[test]
fn test_group_key_must_be_a_column() {
    let err = run_code("people |> aggregate(group(age + 1), n = count())").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SqlTranslation);
}

#[test]
fn test_aggregate_then_filter_on_new_column() {
    let code = "
        people
          |> aggregate(group(age), n = count())
          |> filter(n > 1)
          |> count_rows()
    ";
    assert_eq!(value_of(code), Value::Int(1));
}

#[test]
fn test_cross_join_with_itself() {
    assert_eq!(value_of("people |> cross_join(people) |> count_rows()"), Value::Int(9));
}

#[test]
fn test_self_join_renames_clashing_columns() {
    let mut interp = seeded();
    let frame = interp.run("people |> cross_join(people) |> collect()").unwrap();
    let frame = frame.as_host::<DataFrame>().unwrap();
    assert_eq!(frame.columns, vec!["name", "age", "name_rhs", "age_rhs"]);
    assert_eq!(interp.run("people |> cross_join(people) |> collect() |> num_cols()").unwrap(), Value::Int(4));
    assert_eq!(
        interp.run("people |> cross_join(people) |> filter(age < age_rhs) |> count_rows()").unwrap(),
        Value::Int(2)
    );
    assert_eq!(
        interp.run("people |> left_join(people, age == age_rhs) |> count_rows()").unwrap(),
        Value::Int(5)
    );
}

#[test]
fn test_left_join_keeps_unmatched_rows() {
    let code = r#"
        execute(conn, "create table pets (owner text, pet text)")
        execute(conn, "insert into pets (owner, pet) values ('ruan', 'cat')")
        pets <- get_table(conn, "pets")
        people |> left_join(pets, name == owner) |> count_rows()
    "#;
    assert_eq!(value_of(code), Value::Int(3));
}

#[test]
fn test_select_and_mutate() {
    assert_eq!(value_of("people |> select(name) |> collect() |> num_cols()"), Value::Int(1));
    assert_eq!(value_of("people |> mutate(next = age + 1) |> collect() |> num_cols()"), Value::Int(3));
    assert_eq!(
        value_of("people |> mutate(next = age + 1) |> filter(next > 27) |> collect() |> column(\"next\") |> sum()"),
        Value::Int(56)
    );
}

#[test]
fn test_string_concatenation_uses_sqlite_operator() {
    assert_eq!(
        value_of("people |> mutate(greeting = \"hi \" + name) |> to_sql()"),
        Value::str("select *, ('hi ' || name) as greeting from (select * from people) qry_alias_1")
    );
}

#[test]
fn test_select_requires_plain_columns() {
    let err = run_code("people |> select(1 + 1)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SqlTranslation);
    assert_eq!(err.message, "expected a column name, found binary operation");
}

#[test]
fn test_unknown_column_suggests_closest() {
    let err = run_code("people |> filter(agee > 1)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SqlTranslation);
    assert_eq!(err.message, "unknown column: agee");
    assert_eq!(err.suggestion.as_deref(), Some("age"));
    assert_eq!(err.note.as_deref(), Some("columns available: name, age"));
}

#[test]
fn test_ill_typed_operator_does_not_translate() {
    let err = run_code("people |> filter(name + 1 > 2)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SqlTranslation);
    assert_eq!(err.message, "no SQL translation for String + Int");
}

#[test]
fn test_columns_dropped_by_select_are_gone() {
    let err = run_code("people |> select(name) |> filter(age > 1)").unwrap_err();
    assert_eq!(err.message, "unknown column: age");
}

#[test]
fn test_chaining_does_not_modify_the_source_pipeline() {
    let code = "
        adults <- people |> filter(age > 26)
        people |> count_rows()
    ";
    assert_eq!(value_of(code), Value::Int(3));
    assert_eq!(value_of("base <- people\nbase |> filter(age > 26) |> count_rows()"), Value::Int(2));
    assert_eq!(value_of("base <- people\nbase |> filter(age > 26)\nbase |> to_sql()"), Value::str("select * from people"));
}

#[test]
fn test_pipeline_prints_as_sql() {
    let mut interp = seeded();
    let query = interp.run("people |> filter(age > 26)").unwrap();
    assert_eq!(query.type_name(), "QueryPipeline");
    assert_eq!(
        interp.stringify(&query),
        "select * from (select * from people) qry_alias_1 where (age > 26)"
    );
}

#[test]
fn test_collected_frame_renders_as_json() {
    let mut interp = seeded();
    let frame = interp.run("people |> filter(age < 27) |> collect()").unwrap();
    assert_eq!(interp.stringify(&frame), r#"{"columns":["name","age"],"rows":[["ruan",26]]}"#);
}

#[test]
fn test_database_errors_surface() {
    let err = run_code("execute(conn, \"insert into nowhere values (1)\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Database);
    let err = run_code("get_table(conn, \"nowhere\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Database);
}

#[test]
fn test_verbs_need_a_pipeline() {
    let err = run_code("1 |> filter(age > 1)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}
