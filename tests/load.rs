mod common;

use common::{FakeDb, TestWorkspace};
use sql_import::db::with_teardown;
use sql_import::error::ImportError;
use sql_import::insert::load_with_inserts;
use sql_import::load::{LoadOptions, run_import};
use sql_import::schema::get_columns;

fn people_db() -> FakeDb {
    FakeDb::new(&[("id", "int", -1), ("name", "varchar", 5)])
}

#[test]
fn plain_load_issues_bulk_insert_and_commits() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n2,bob\n");
    let mut db = people_db();

    let report = run_import(&mut db, &input, "dbo.people", b',', &LoadOptions::default())
        .expect("import");
    assert_eq!(report.rows_loaded, 2);
    assert_eq!(report.table, "dbo.people");

    let bulk = db.statements_containing("BULK INSERT dbo.people");
    assert_eq!(bulk.len(), 1);
    assert!(bulk[0].contains("FORMATFILE = '"));
    assert!(bulk[0].contains("FIRSTROW = 1"));
    assert!(bulk[0].contains("MAXERRORS = 0"));
    assert!(!bulk[0].contains("TABLOCK"));
    assert!(db.commits >= 1);
    assert_eq!(db.rollbacks, 0);
}

#[test]
fn table_lock_and_max_errors_reach_the_statement() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n");
    let mut db = people_db();
    let options = LoadOptions {
        table_lock: true,
        max_errors: 10,
        ..LoadOptions::default()
    };

    run_import(&mut db, &input, "t", b',', &options).expect("import");
    let bulk = db.statements_containing("BULK INSERT t");
    assert!(bulk[0].contains("TABLOCK"));
    assert!(bulk[0].contains("MAXERRORS = 10"));
}

#[test]
fn truncate_happens_before_the_load_and_survives_its_failure() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n");
    let mut db = people_db().fail_on("BULK INSERT");
    let options = LoadOptions {
        truncate: true,
        ..LoadOptions::default()
    };

    let err = run_import(&mut db, &input, "t", b',', &options).expect_err("load fails");
    assert!(matches!(err, ImportError::Load { .. }));

    // Truncation ran, committed, and is not undone by the later failure.
    let truncate_at = db.position_of("TRUNCATE TABLE t").expect("truncate issued");
    let bulk_at = db.position_of("BULK INSERT t").expect("bulk insert issued");
    assert!(truncate_at < bulk_at);
    assert!(db.commits >= 1);
    assert_eq!(db.rollbacks, 1);
}

#[test]
fn load_failure_carries_statement_and_detail() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n");
    let mut db = people_db().fail_on("BULK INSERT");

    let err = run_import(&mut db, &input, "t", b',', &LoadOptions::default())
        .expect_err("load fails");
    let message = err.to_string();
    assert!(message.contains("BULK INSERT t"));
    assert!(message.contains("fake engine failure"));
}

#[test]
fn constraint_and_index_management_brackets_the_load() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n");
    let mut db = people_db();
    let options = LoadOptions {
        manage_constraints: true,
        manage_indexes: true,
        ..LoadOptions::default()
    };

    run_import(&mut db, &input, "t", b',', &options).expect("import");

    let nocheck = db.position_of("NOCHECK CONSTRAINT ALL").expect("disable");
    let disable = db.position_of("ALTER INDEX ALL ON t DISABLE").expect("disable idx");
    let bulk = db.position_of("BULK INSERT t").expect("bulk");
    let rebuild = db.position_of("ALTER INDEX ALL ON t REBUILD").expect("rebuild");
    let recheck = db.position_of("CHECK CONSTRAINT ALL").expect("re-enable");
    assert!(nocheck < bulk);
    assert!(disable < bulk);
    assert!(bulk < rebuild);
    assert!(rebuild < recheck);
}

#[test]
fn failed_index_rebuild_does_not_fail_a_committed_load() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n");
    let mut db = people_db().fail_on("REBUILD");
    let options = LoadOptions {
        manage_indexes: true,
        ..LoadOptions::default()
    };

    // The load committed; the rebuild failure is a warning, not an error.
    let report = run_import(&mut db, &input, "t", b',', &options).expect("import succeeds");
    assert_eq!(report.rows_loaded, 1);
    assert_eq!(db.rollbacks, 0);
}

#[test]
fn failed_constraint_reenable_does_not_fail_a_committed_load() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n");
    let mut db = people_db().fail_on("WITH CHECK CHECK");
    let options = LoadOptions {
        manage_constraints: true,
        ..LoadOptions::default()
    };

    run_import(&mut db, &input, "t", b',', &options).expect("import succeeds");
    assert_eq!(db.rollbacks, 0);
}

#[test]
fn constraint_disable_failure_before_the_load_is_fatal() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n");
    let mut db = people_db().fail_on("NOCHECK");
    let options = LoadOptions {
        manage_constraints: true,
        ..LoadOptions::default()
    };

    let err = run_import(&mut db, &input, "t", b',', &options).expect_err("fatal");
    assert!(matches!(err, ImportError::Db { .. }));
    assert!(db.position_of("BULK INSERT").is_none());
    assert_eq!(db.rollbacks, 1);
}

#[test]
fn skip_header_excludes_the_header_from_the_row_count() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "id,name\n1,ann\n2,bob\n");
    let mut db = people_db();
    let options = LoadOptions {
        skip_header: true,
        ..LoadOptions::default()
    };

    let report = run_import(&mut db, &input, "t", b',', &options).expect("import");
    assert_eq!(report.rows_loaded, 2);
}

#[test]
fn missing_source_fails_before_any_bulk_statement() {
    let mut db = people_db();
    let err = run_import(
        &mut db,
        std::path::Path::new("/no/such/input.csv"),
        "t",
        b',',
        &LoadOptions::default(),
    )
    .expect_err("io failure");
    assert!(matches!(err, ImportError::Io(_)));
    assert!(db.position_of("BULK INSERT").is_none());
}

#[test]
fn high_performance_preset_bundles_throughput_options() {
    let mut options = LoadOptions::default();
    options.apply_high_performance();
    assert_eq!(options.batch_size, 10_000);
    assert_eq!(options.timeout_secs, 1_200);
    assert!(options.manage_constraints);
    assert!(options.manage_indexes);
    assert!(options.table_lock);
}

#[test]
fn handle_is_closed_after_a_successful_invocation() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n");
    let mut db = people_db();

    with_teardown(&mut db, |db| {
        run_import(db, &input, "t", b',', &LoadOptions::default()).map(|report| report.rows_loaded)
    })
    .expect("import");
    assert!(db.closed);
}

#[test]
fn handle_is_closed_after_a_failed_invocation() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n");
    let mut db = people_db().fail_on("BULK INSERT");

    let err = with_teardown(&mut db, |db| {
        run_import(db, &input, "t", b',', &LoadOptions::default()).map(|report| report.rows_loaded)
    })
    .expect_err("load fails");
    assert!(matches!(err, ImportError::Load { .. }));
    assert!(db.closed);
    assert_eq!(db.rollbacks, 1);
}

#[test]
fn handle_is_closed_when_the_source_is_unreadable() {
    let mut db = people_db();
    with_teardown(&mut db, |db| {
        run_import(
            db,
            std::path::Path::new("/no/such/input.csv"),
            "t",
            b',',
            &LoadOptions::default(),
        )
    })
    .expect_err("io failure");
    assert!(db.closed);
}

#[test]
fn row_insert_fallback_batches_and_commits() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.csv", "1,ann\n2,bob\n3,cec\n");
    let mut db = people_db();
    let columns = get_columns(&mut db, "t").expect("columns");

    let rows = load_with_inserts(&mut db, &input, "t", &columns, b',', false, 2)
        .expect("insert load");
    assert_eq!(rows, 3);

    let inserts = db.statements_containing("INSERT INTO t (id, name) VALUES");
    assert_eq!(inserts.len(), 2);
    assert!(inserts[0].contains("('1', 'ann'), ('2', 'bob')"));
    assert!(inserts[1].contains("('3', 'cec')"));
    assert_eq!(db.commits, 2);
}
