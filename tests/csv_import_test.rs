use multidb::{
    connect_adapter, ConnectionParams, CsvImportPipeline, DatabaseAdapter, DbCliError, Deny, EmbeddedParams,
    FailureKind, ImportRequest, ImportStatus, ProgressEvent, ProposedAction, Scalar,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn numbered_csv(header: &str, rows: usize) -> NamedTempFile {
    let mut body = format!("{}\n", header);
    for i in 1..=rows {
        body.push_str(&format!("{},name {}\n", i, i));
    }
    csv_file(&body)
}

fn sqlite() -> Box<dyn DatabaseAdapter> {
    connect_adapter(ConnectionParams::Sqlite(EmbeddedParams::in_memory())).unwrap()
}

fn duckdb() -> Box<dyn DatabaseAdapter> {
    connect_adapter(ConnectionParams::DuckDb(EmbeddedParams::in_memory())).unwrap()
}

fn count(db: &mut dyn DatabaseAdapter, table: &str) -> Scalar {
    db.execute(&format!("SELECT COUNT(*) FROM {}", table), &[])
        .first_value()
        .cloned()
        .unwrap_or(Scalar::Null)
}

#[test]
fn emits_one_progress_event_per_chunk() {
    let mut db = sqlite();
    db.execute("CREATE TABLE people (id INTEGER, name TEXT)", &[]);
    let file = numbered_csv("id,name", 25);
    let mut request = ImportRequest::new(file.path(), "people");
    request.chunk_size = 10;

    let mut events: Vec<ProgressEvent> = Vec::new();
    let result = CsvImportPipeline::new(db.as_mut())
        .with_progress(|event| events.push(*event))
        .import(&request);

    assert!(result.is_success(), "{}", result.message);
    assert_eq!(result.total_rows, 25);
    assert_eq!(result.chunks, 3);
    assert_eq!(events.len(), 3);
    assert_eq!(events.iter().map(|e| e.chunk_index).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(events.iter().map(|e| e.rows_so_far).collect::<Vec<_>>(), vec![10, 20, 25]);
    assert_eq!(count(db.as_mut(), "people"), Scalar::Int(25));
}

#[test]
fn exact_multiple_of_chunk_size() {
    let mut db = sqlite();
    db.execute("CREATE TABLE people (id INTEGER, name TEXT)", &[]);
    let file = numbered_csv("id,name", 20);
    let mut request = ImportRequest::new(file.path(), "people");
    request.chunk_size = 10;

    let mut last = None;
    let result = CsvImportPipeline::new(db.as_mut())
        .with_progress(|event| last = Some(*event))
        .import(&request);

    assert_eq!(result.chunks, 2);
    assert_eq!(last.map(|e| e.rows_so_far), Some(20));
}

#[test]
fn missing_table_without_create_flag_writes_nothing() {
    let mut db = sqlite();
    let file = numbered_csv("id,name", 3);

    let result = CsvImportPipeline::new(db.as_mut()).import(&ImportRequest::new(file.path(), "people"));

    assert_eq!(result.status, ImportStatus::Failed);
    assert_eq!(result.failure_kind(), Some(FailureKind::Validation));
    assert!(result.message.contains("--create-table"), "{}", result.message);
    assert_eq!(result.total_rows, 0);
    assert!(!db.table_exists("people").unwrap());
}

#[test]
fn creates_table_with_inferred_types() {
    let mut db = sqlite();
    let file = csv_file("id,First Name,score,active\n1,Ann,9.5,true\n2,Bob,7,false\n3,Cy,NA,true\n");
    let mut request = ImportRequest::new(file.path(), "players");
    request.create_table_if_missing = true;

    let result = CsvImportPipeline::new(db.as_mut()).import(&request);
    assert!(result.is_success(), "{}", result.message);
    assert!(result.table_created);
    assert_eq!(result.total_rows, 3);

    let ddl = result.ddl.unwrap();
    assert!(ddl.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"), "{}", ddl);
    assert!(ddl.contains("\"First_Name\" TEXT"), "{}", ddl);
    assert!(ddl.contains("\"score\" REAL"), "{}", ddl);

    let rows = db.execute("SELECT id, First_Name, score, active FROM players ORDER BY id", &[]);
    assert_eq!(
        rows.row_data(),
        &[
            vec![Scalar::Int(1), Scalar::from("Ann"), Scalar::Float(9.5), Scalar::Int(1)],
            vec![Scalar::Int(2), Scalar::from("Bob"), Scalar::Float(7.0), Scalar::Int(0)],
            vec![Scalar::Int(3), Scalar::from("Cy"), Scalar::Null, Scalar::Int(1)],
        ][..]
    );
}

#[test]
fn creates_duckdb_table_with_sized_integers() {
    let mut db = duckdb();
    let file = csv_file("code,amount,label\n5,40000,x\n6,-2,y\n");
    let mut request = ImportRequest::new(file.path(), "ledger");
    request.create_table_if_missing = true;

    let result = CsvImportPipeline::new(db.as_mut()).import(&request);
    assert!(result.is_success(), "{}", result.message);

    let columns = db.list_columns("ledger");
    let types: Vec<String> = columns.column_values(1).into_iter().map(|v| v.to_string()).collect();
    assert_eq!(types, vec!["TINYINT", "INTEGER", "VARCHAR"]);
    assert_eq!(count(db.as_mut(), "ledger"), Scalar::Int(2));
}

#[test]
fn failure_in_second_chunk_keeps_first_chunk_only() {
    let mut db = sqlite();
    db.execute("CREATE TABLE readings (v INTEGER CHECK (v < 100))", &[]);
    let file = csv_file("v\n1\n2\n3\n500\n5\n6\n");
    let mut request = ImportRequest::new(file.path(), "readings");
    request.chunk_size = 2;

    let mut events = 0;
    let result = CsvImportPipeline::new(db.as_mut())
        .with_progress(|_| events += 1)
        .import(&request);

    assert_eq!(result.status, ImportStatus::Failed);
    assert_eq!(result.total_rows, 2);
    assert_eq!(result.chunks, 1);
    assert_eq!(events, 1);
    match &result.error {
        Some(DbCliError::PartialImport {
            chunk, rows_committed, ..
        }) => {
            assert_eq!(*chunk, 2);
            assert_eq!(*rows_committed, 2);
        }
        other => panic!("expected partial import error, got {:?}", other),
    }

    let rows = db.execute("SELECT v FROM readings ORDER BY v", &[]);
    assert_eq!(rows.row_data(), &[vec![Scalar::Int(1)], vec![Scalar::Int(2)]][..]);
}

#[test]
fn declined_table_creation_cancels_without_side_effects() {
    let mut db = sqlite();
    let file = numbered_csv("id,name", 2);
    let mut request = ImportRequest::new(file.path(), "people");
    request.create_table_if_missing = true;
    request.interactive = true;

    let result = CsvImportPipeline::new(db.as_mut()).with_confirmation(Deny).import(&request);

    assert_eq!(result.status, ImportStatus::Cancelled);
    assert!(result.error.is_none());
    assert!(!result.table_created);
    assert!(!db.table_exists("people").unwrap());
}

#[test]
fn confirmation_sees_the_proposed_ddl() {
    let mut db = sqlite();
    let file = numbered_csv("id,name", 2);
    let mut request = ImportRequest::new(file.path(), "people");
    request.create_table_if_missing = true;
    request.interactive = true;

    let mut proposals = Vec::new();
    let result = CsvImportPipeline::new(db.as_mut())
        .with_confirmation(|action: &ProposedAction| {
            proposals.push(action.to_string());
            true
        })
        .import(&request);

    assert!(result.is_success(), "{}", result.message);
    assert_eq!(proposals.len(), 1);
    assert!(proposals[0].contains("CREATE TABLE people"), "{}", proposals[0]);
    assert_eq!(count(db.as_mut(), "people"), Scalar::Int(2));
}

#[test]
fn header_only_file_imports_zero_rows() {
    let mut db = sqlite();
    db.execute("CREATE TABLE people (id INTEGER, name TEXT)", &[]);
    let file = csv_file("id,name\n");

    let mut events = 0;
    let result = CsvImportPipeline::new(db.as_mut())
        .with_progress(|_| events += 1)
        .import(&ImportRequest::new(file.path(), "people"));

    assert!(result.is_success(), "{}", result.message);
    assert_eq!(result.total_rows, 0);
    assert_eq!(events, 0);
}
