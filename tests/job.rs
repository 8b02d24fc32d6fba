use sql_import::job::JobRequest;

#[test]
fn request_defaults_apply_when_fields_are_omitted() {
    let request: JobRequest = serde_json::from_str(
        r#"{
            "source_path": "/tmp/extract.csv",
            "server": "warehouse-sql",
            "database": "dw",
            "table": "dbo.staging"
        }"#,
    )
    .expect("parse");
    assert_eq!(request.port, 1433);
    assert_eq!(request.delimiter, ",");
    assert!(!request.skip_header);
    assert!(!request.truncate);
    assert!(!request.trusted_connection);
    assert!(request.username.is_none());
}

#[test]
fn request_without_table_is_rejected() {
    let err = serde_json::from_str::<JobRequest>(
        r#"{ "source_path": "/tmp/x.csv", "server": "s", "database": "d" }"#,
    )
    .expect_err("missing table");
    assert!(err.to_string().contains("table"));
}

#[test]
fn full_request_round_trips_all_options() {
    let request: JobRequest = serde_json::from_str(
        r#"{
            "source_path": "/data/extract.tsv",
            "server": "sql01",
            "port": 14330,
            "database": "dw",
            "table": "dbo.facts",
            "delimiter": "tab",
            "skip_header": true,
            "truncate": true,
            "username": "loader",
            "password": "secret",
            "manage_constraints": true,
            "manage_indexes": true
        }"#,
    )
    .expect("parse");
    assert_eq!(request.port, 14330);
    assert_eq!(request.delimiter, "tab");
    assert!(request.skip_header && request.truncate);
    assert!(request.manage_constraints && request.manage_indexes);
}
