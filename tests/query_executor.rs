use std::sync::Arc;

use dmrs::drivers::{InMemoryTestDriver, InMemoryTestResponseBuilder};
use dmrs::error::{DmRsError, RelationRole};
use dmrs::query::QueryState;
use dmrs::traits::DatabaseDriver;
use dmrs::types::{ColumnMeta, IndexOrder, TypeParser, UniqueKey};
use dmrs::{
    Connection, DmConfig, DmDialect, DriverError, Instance, ModelDefinition, OutFormat, OutRow,
    Parameters, QueryOptions, QueryOutcome, QueryType, SqlValue, Transaction, TransactionState,
    WriteTarget,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn connect(driver: &Arc<InMemoryTestDriver>, config: DmConfig) -> (DmDialect, Connection) {
    init_logs();
    let dialect = DmDialect::new(Arc::clone(driver) as Arc<dyn DatabaseDriver>);
    let connection = dialect.connect(&config).await.unwrap();
    (dialect, connection)
}

fn users() -> Arc<ModelDefinition> {
    Arc::new(
        ModelDefinition::new("User", "users")
            .primary_key("id")
            .auto_increment("id"),
    )
}

fn rows(outcome: QueryOutcome) -> Vec<OutRow> {
    match outcome {
        QueryOutcome::Rows(rows) => rows,
        other => panic!("Expected rows, got {other:?}"),
    }
}

#[tokio::test]
async fn test_select_binds_named_parameters() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_response(
            InMemoryTestResponseBuilder::new()
                .columns(&["id", "name"])
                .row(&[1.into(), "John".into()])
                .build(),
        ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let mut query = dialect.query(&connection, QueryOptions::new(QueryType::Select));
    assert_eq!(query.state(), QueryState::Pending);
    let outcome = query
        .run(
            "SELECT id, name FROM users WHERE name = $name AND age > $age",
            &Parameters::named([("name", SqlValue::from("John")), ("age", 30.into())]),
        )
        .await
        .unwrap();

    assert_eq!(query.state(), QueryState::Succeeded);
    driver.assert_last_query(
        "SELECT id, name FROM users WHERE name = ? AND age > ?",
        &[SqlValue::from("John"), SqlValue::Int32(30)],
    );
    let rows = rows(outcome);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&SqlValue::Int32(1)));
    assert_eq!(rows[0].get("name"), Some(&SqlValue::from("John")));
}

#[tokio::test]
async fn test_select_narrows_wide_integers() {
    let response = || {
        InMemoryTestResponseBuilder::new()
            .typed_column("big", "BIGINT")
            .row(&[SqlValue::BigInt(9007199254740993)])
            .build()
    };
    let driver = Arc::new(InMemoryTestDriver::new().with_responses([response(), response()]));
    let (dialect, narrow) = connect(&driver, DmConfig::new()).await;
    let strings = dialect
        .connect(&DmConfig::new().big_number_strings(true))
        .await
        .unwrap();

    let outcome = dialect
        .query(&narrow, QueryOptions::new(QueryType::Select))
        .run("SELECT big FROM t", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(rows(outcome)[0].values(), &[SqlValue::Int64(9007199254740993)]);

    let outcome = dialect
        .query(&strings, QueryOptions::new(QueryType::Select))
        .run("SELECT big FROM t", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(rows(outcome)[0].values(), &[SqlValue::from("9007199254740993")]);
}

#[tokio::test]
async fn test_wide_integers_outside_select_are_untouched() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_response(
            InMemoryTestResponseBuilder::new()
                .typed_column("big", "BIGINT")
                .row(&[SqlValue::BigInt(12)])
                .build(),
        ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Call))
        .run("CALL big_proc()", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(rows(outcome)[0].values(), &[SqlValue::BigInt(12)]);
}

#[tokio::test]
async fn test_call_returns_first_result_set() {
    let response = || {
        InMemoryTestResponseBuilder::new()
            .columns(&["id", "name"])
            .row(&[1.into(), "a".into()])
            .row(&[2.into(), "b".into()])
            .next_result_set()
            .columns(&["total"])
            .row(&[2.into()])
            .build()
    };
    let driver = Arc::new(InMemoryTestDriver::new().with_responses([response(), response()]));
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Call))
        .run("CALL list_users()", &Parameters::None)
        .await
        .unwrap();
    let rows = rows(outcome);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("name"), Some(&SqlValue::from("b")));
    assert_eq!(rows[0].get("total"), None);

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Raw))
        .run("CALL list_users()", &Parameters::None)
        .await
        .unwrap();
    let QueryOutcome::Raw(result) = outcome else {
        panic!("Expected the raw result");
    };
    assert_eq!(result.len(), 2);
    assert_eq!(result.more_results().len(), 1);
    assert_eq!(result.more_results()[0][0].get("total").unwrap(), &SqlValue::Int32(2));
}

#[tokio::test]
async fn test_select_array_format_and_plain() {
    let response = || {
        InMemoryTestResponseBuilder::new()
            .columns(&["id", "name"])
            .row(&[1.into(), "a".into()])
            .row(&[2.into(), "b".into()])
            .build()
    };
    let driver = Arc::new(InMemoryTestDriver::new().with_responses([response(), response()]));
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let outcome = dialect
        .query(
            &connection,
            QueryOptions::new(QueryType::Select).out_format(OutFormat::Array),
        )
        .run("SELECT id, name FROM users", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(
        rows(outcome),
        vec![
            OutRow::Array(vec![1.into(), "a".into()]),
            OutRow::Array(vec![2.into(), "b".into()]),
        ]
    );

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Select).plain(true))
        .run("SELECT id, name FROM users", &Parameters::None)
        .await
        .unwrap();
    match outcome {
        QueryOutcome::Row(Some(row)) => assert_eq!(row.get("name"), Some(&SqlValue::from("a"))),
        other => panic!("Expected a single row, got {other:?}"),
    }
}

#[tokio::test]
async fn test_clob_columns_are_fetched_as_strings() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_responses([
            InMemoryTestResponseBuilder::new()
                .typed_column("body", "CLOB")
                .row(&[SqlValue::Bytes(b"hello".to_vec())])
                .build(),
            InMemoryTestResponseBuilder::new()
                .typed_column("score", "NUMBER")
                .row(&[SqlValue::from("1.50")])
                .build(),
        ]),
    );
    init_logs();
    let mut dialect = DmDialect::new(Arc::clone(&driver) as Arc<dyn DatabaseDriver>);
    let parser: TypeParser = Arc::new(|_: &ColumnMeta, value: SqlValue| match value {
        SqlValue::Text(text) => text.parse().map(SqlValue::Double).unwrap_or(SqlValue::Text(text)),
        other => other,
    });
    dialect.type_parsers_mut().refresh("NUMBER", parser);
    let connection = dialect.connect(&DmConfig::new()).await.unwrap();

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Select))
        .run("SELECT body FROM posts", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(rows(outcome)[0].values(), &[SqlValue::from("hello")]);

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Select))
        .run("SELECT score FROM posts", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(rows(outcome)[0].values(), &[SqlValue::Double(1.5)]);
}

#[tokio::test]
async fn test_multi_row_insert_synthesizes_ids() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_response(
            InMemoryTestResponseBuilder::new()
                .rows_affected(3)
                .insert_id(100)
                .build(),
        ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Insert).model(users()))
        .run("INSERT INTO users (name) VALUES ('a'), ('b'), ('c')", &Parameters::None)
        .await
        .unwrap();

    match outcome {
        QueryOutcome::Written {
            target: WriteTarget::Rows(rows),
            rows_affected,
        } => {
            assert_eq!(rows_affected, 3);
            let ids: Vec<_> = rows.iter().map(|row| row.get("id").cloned()).collect();
            assert_eq!(
                ids,
                vec![
                    Some(SqlValue::Int64(100)),
                    Some(SqlValue::Int64(101)),
                    Some(SqlValue::Int64(102)),
                ]
            );
        }
        other => panic!("Expected synthesized rows, got {other:?}"),
    }
}

#[tokio::test]
async fn test_insert_id_range_overflow_falls_back_to_insert_id() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_response(
            InMemoryTestResponseBuilder::new()
                .rows_affected(3)
                .insert_id(u64::MAX - 1)
                .build(),
        ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Insert).model(users()))
        .run("INSERT INTO users (name) VALUES ('a'), ('b'), ('c')", &Parameters::None)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        QueryOutcome::Written {
            target: WriteTarget::InsertId(Some(u64::MAX - 1)),
            rows_affected: 3,
        }
    );
}

#[tokio::test]
async fn test_insert_without_auto_increment_key_returns_insert_id() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_response(
            InMemoryTestResponseBuilder::new()
                .rows_affected(1)
                .insert_id(7)
                .build(),
        ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;
    let model = Arc::new(ModelDefinition::new("Tag", "tags").primary_key("name"));

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Insert).model(model))
        .run("INSERT INTO tags (name) VALUES ('x')", &Parameters::None)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        QueryOutcome::Written {
            target: WriteTarget::InsertId(Some(7)),
            rows_affected: 1,
        }
    );
}

#[tokio::test]
async fn test_insert_back_fills_bound_instance() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_response(
            InMemoryTestResponseBuilder::new()
                .rows_affected(1)
                .insert_id(42)
                .build(),
        ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let outcome = dialect
        .query(
            &connection,
            QueryOptions::new(QueryType::Insert)
                .model(users())
                .instance(Instance::new().with("name", "alice")),
        )
        .run("INSERT INTO users (name) VALUES ($1)", &Parameters::positional(["alice"]))
        .await
        .unwrap();

    match outcome {
        QueryOutcome::Written {
            target: WriteTarget::Entity(instance),
            rows_affected: 1,
        } => {
            assert_eq!(instance.get("id"), Some(&SqlValue::Int64(42)));
            assert_eq!(instance.get("name"), Some(&SqlValue::from("alice")));
        }
        other => panic!("Expected the bound instance, got {other:?}"),
    }
}

#[tokio::test]
async fn test_insert_adopts_identifier_from_returned_row() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_response(
            InMemoryTestResponseBuilder::new()
                .columns(&["id"])
                .row(&[SqlValue::Int64(9)])
                .build(),
        ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;
    let model = Arc::new(ModelDefinition::new("User", "users").primary_key("id"));

    let outcome = dialect
        .query(
            &connection,
            QueryOptions::new(QueryType::Insert)
                .model(model)
                .instance(Instance::new().with("name", "bob")),
        )
        .run("INSERT INTO users (name) VALUES ('bob') RETURNING id", &Parameters::None)
        .await
        .unwrap();

    match outcome {
        QueryOutcome::Written {
            target: WriteTarget::Entity(instance),
            ..
        } => assert_eq!(instance.get("id"), Some(&SqlValue::Int64(9))),
        other => panic!("Expected the bound instance, got {other:?}"),
    }
}

#[tokio::test]
async fn test_write_shapes() {
    let driver = Arc::new(InMemoryTestDriver::new().with_responses([
        InMemoryTestResponseBuilder::new().rows_affected(1).build(),
        InMemoryTestResponseBuilder::new().rows_affected(4).build(),
        InMemoryTestResponseBuilder::new().rows_affected(1).build(),
        InMemoryTestResponseBuilder::new().rows_affected(2).build(),
    ]));
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;
    let instance = Instance::new().with("id", 1).with("name", "carol");

    let outcome = dialect
        .query(
            &connection,
            QueryOptions::new(QueryType::Update).instance(instance.clone()),
        )
        .run("UPDATE users SET name = 'carol' WHERE id = 1", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        QueryOutcome::Written {
            target: WriteTarget::Entity(instance.clone()),
            rows_affected: 1,
        }
    );

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::BulkDelete))
        .run("DELETE FROM users", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(outcome, QueryOutcome::Affected(4));

    let upsert = || QueryOptions::new(QueryType::Upsert).instance(instance.clone());
    let outcome = dialect
        .query(&connection, upsert())
        .run("MERGE INTO users ...", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        QueryOutcome::Upserted {
            instance: Some(instance.clone()),
            created: true,
        }
    );

    let outcome = dialect
        .query(&connection, upsert())
        .run("MERGE INTO users ...", &Parameters::None)
        .await
        .unwrap();
    assert!(matches!(outcome, QueryOutcome::Upserted { created: false, .. }));
}

#[tokio::test]
async fn test_describe_and_show_indexes() {
    let driver = Arc::new(
        InMemoryTestDriver::new()
            .with_response(
                InMemoryTestResponseBuilder::new()
                    .columns(&["Field", "Type", "Null", "Key", "Default", "Extra", "Comment"])
                    .row(&[
                        "id".into(),
                        "bigint".into(),
                        "NO".into(),
                        "PRI".into(),
                        SqlValue::Null,
                        "auto_increment".into(),
                        "".into(),
                    ])
                    .row(&[
                        "status".into(),
                        "enum('on','off')".into(),
                        "YES".into(),
                        "".into(),
                        "on".into(),
                        "".into(),
                        "current state".into(),
                    ])
                    .build(),
            )
            .with_response(
                InMemoryTestResponseBuilder::new()
                    .columns(&[
                        "Table",
                        "Non_unique",
                        "Key_name",
                        "Seq_in_index",
                        "Column_name",
                        "Collation",
                        "Sub_part",
                        "Index_type",
                    ])
                    .row(&[
                        "users".into(),
                        0.into(),
                        "uniq_email".into(),
                        1.into(),
                        "email".into(),
                        "A".into(),
                        10.into(),
                        "BTREE".into(),
                    ])
                    .build(),
            ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Describe))
        .run("DESCRIBE users", &Parameters::None)
        .await
        .unwrap();
    let QueryOutcome::Columns(columns) = outcome else {
        panic!("Expected column descriptions");
    };
    assert_eq!(columns["id"].type_name, "BIGINT");
    assert!(columns["id"].primary_key);
    assert!(columns["id"].auto_increment);
    assert_eq!(columns["status"].type_name, "ENUM('on','off')");
    assert_eq!(columns["status"].default_value, Some(SqlValue::from("on")));
    assert_eq!(columns["status"].comment.as_deref(), Some("current state"));

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::ShowIndexes))
        .run("SHOW INDEX FROM users", &Parameters::None)
        .await
        .unwrap();
    let QueryOutcome::Indexes(indexes) = outcome else {
        panic!("Expected index descriptions");
    };
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].unique);
    assert!(!indexes[0].primary);
    assert_eq!(indexes[0].fields[0].attribute, "email");
    assert_eq!(indexes[0].fields[0].length, Some(10));
    assert_eq!(indexes[0].fields[0].order, Some(IndexOrder::Asc));
}

#[tokio::test]
async fn test_show_tables_and_version() {
    let driver = Arc::new(InMemoryTestDriver::new().with_responses([
        InMemoryTestResponseBuilder::new()
            .columns(&["TABLE_NAME"])
            .row(&["users".into()])
            .row(&["orders".into()])
            .build(),
        InMemoryTestResponseBuilder::new()
            .columns(&["BANNER"])
            .row(&["DM Database Server 64 V8".into()])
            .build(),
    ]));
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::ShowTables))
        .run("SELECT TABLE_NAME FROM USER_TABLES", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        QueryOutcome::Tables(vec!["users".to_string(), "orders".to_string()])
    );

    let outcome = dialect
        .query(&connection, QueryOptions::new(QueryType::Version))
        .run("SELECT BANNER FROM V$VERSION", &Parameters::None)
        .await
        .unwrap();
    assert_eq!(outcome, QueryOutcome::Version(Some("V8".to_string())));
}

#[tokio::test]
async fn test_server_version_falls_back_to_default() {
    let driver = Arc::new(InMemoryTestDriver::new().with_responses([
        InMemoryTestResponseBuilder::new()
            .columns(&["BANNER"])
            .row(&["DM Database Server 64 V8".into()])
            .build(),
        InMemoryTestResponseBuilder::new()
            .columns(&["BANNER"])
            .row(&["unknown build".into()])
            .build(),
    ]));
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    assert_eq!(dialect.server_version(&connection).await.unwrap(), "V8");
    driver.assert_last_query("SELECT BANNER FROM V$VERSION", &[]);
    assert_eq!(
        dialect.server_version(&connection).await.unwrap(),
        DmDialect::DEFAULT_VERSION
    );
}

#[tokio::test]
async fn test_raw_result_keeps_metadata() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_response(
            InMemoryTestResponseBuilder::new()
                .typed_column("CONSTRAINT_NAME", "VARCHAR")
                .row(&["fk_user".into()])
                .build(),
        ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let outcome = dialect
        .query(
            &connection,
            QueryOptions::new(QueryType::ForeignKeys).extended_meta_data(true),
        )
        .run("SELECT CONSTRAINT_NAME FROM USER_CONSTRAINTS", &Parameters::None)
        .await
        .unwrap();
    let QueryOutcome::Raw(result) = outcome else {
        panic!("Expected the raw result");
    };
    assert_eq!(result.len(), 1);
    let metadata = result.metadata.unwrap();
    assert_eq!(metadata[0].name, "CONSTRAINT_NAME");
}

#[tokio::test]
async fn test_duplicate_entry_without_declared_key() {
    let driver = Arc::new(InMemoryTestDriver::new().with_error(DriverError::server(
        1062,
        "Duplicate entry 'alice-5' for key 'users.uniq_name_age'",
    )));
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let mut query = dialect.query(&connection, QueryOptions::new(QueryType::Insert).model(users()));
    let err = query
        .run(
            "INSERT INTO users (name, age) VALUES ($1, $2)",
            &Parameters::positional([SqlValue::from("alice"), 5.into()]),
        )
        .await
        .unwrap_err();

    assert_eq!(query.state(), QueryState::Failed);
    match err {
        DmRsError::UniqueConstraint { fields, source, .. } => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields["uniq_name_age"], "alice-5");
            assert_eq!(
                source.sql.as_deref(),
                Some("INSERT INTO users (name, age) VALUES (?, ?)")
            );
            assert_eq!(source.parameters, vec![SqlValue::from("alice"), 5.into()]);
        }
        other => panic!("Expected UniqueConstraint, got {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_entry_with_declared_key() {
    let driver = Arc::new(InMemoryTestDriver::new().with_error(DriverError::server(
        1062,
        "Duplicate entry 'alice-5' for key 'uniq_name_age'",
    )));
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;
    let model = Arc::new(ModelDefinition::new("User", "users").unique_key(
        "uniq_name_age",
        UniqueKey::new(["name", "age"]).with_message("name and age taken"),
    ));

    let err = dialect
        .query(&connection, QueryOptions::new(QueryType::Insert).model(model))
        .run("INSERT INTO users (name, age) VALUES ('alice', 5)", &Parameters::None)
        .await
        .unwrap_err();

    match err {
        DmRsError::UniqueConstraint {
            message, fields, ..
        } => {
            assert_eq!(message, "name and age taken");
            assert_eq!(fields["name"], "alice");
            assert_eq!(fields["age"], "5");
        }
        other => panic!("Expected UniqueConstraint, got {other:?}"),
    }
}

#[tokio::test]
async fn test_foreign_key_violation_reports_instance_value() {
    let driver = Arc::new(InMemoryTestDriver::new().with_error(DriverError::server(
        1452,
        "Cannot add or update a child row: a foreign key constraint fails (`shop`.`orders`, \
         CONSTRAINT `fk_orders_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`))",
    )));
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let err = dialect
        .query(
            &connection,
            QueryOptions::new(QueryType::Insert).instance(Instance::new().with("user_id", 77)),
        )
        .run("INSERT INTO orders (user_id) VALUES (77)", &Parameters::None)
        .await
        .unwrap_err();

    match err {
        DmRsError::ForeignKeyConstraint {
            role,
            table,
            fields,
            value,
            index,
            ..
        } => {
            assert_eq!(role, RelationRole::Child);
            assert_eq!(table.as_deref(), Some("users"));
            assert_eq!(fields, Some(vec!["user_id".to_string()]));
            assert_eq!(value, Some(SqlValue::Int32(77)));
            assert_eq!(index.as_deref(), Some("fk_orders_user"));
        }
        other => panic!("Expected ForeignKeyConstraint, got {other:?}"),
    }
}

#[tokio::test]
async fn test_deadlock_rolls_back_transaction() {
    let driver = Arc::new(
        InMemoryTestDriver::new()
            .with_error(DriverError::server(1213, "Deadlock found when trying to get lock"))
            .with_error(DriverError::client("ECONNRESET", "reset during rollback")),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;
    let transaction = Transaction::new(&connection);

    let err = dialect
        .query(
            &connection,
            QueryOptions::new(QueryType::Update).transaction(transaction.clone()),
        )
        .run("UPDATE accounts SET balance = 0", &Parameters::None)
        .await
        .unwrap_err();

    assert_eq!(transaction.state(), TransactionState::RolledBack);
    assert_eq!(err.driver_error().and_then(|e| e.errno), Some(1213));
    assert!(matches!(err, DmRsError::QueryFailed { .. }));
    driver.assert_query_count(2);
    driver.assert_last_query("ROLLBACK", &[]);
}

#[tokio::test]
async fn test_deadlock_outside_transaction_is_only_reported() {
    let driver = Arc::new(
        InMemoryTestDriver::new()
            .with_error(DriverError::server(1213, "Deadlock found when trying to get lock")),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let err = dialect
        .query(&connection, QueryOptions::new(QueryType::Update))
        .run("UPDATE accounts SET balance = 0", &Parameters::None)
        .await
        .unwrap_err();

    assert_eq!(err.driver_error().and_then(|e| e.errno), Some(1213));
    driver.assert_query_count(1);
}

#[tokio::test]
async fn test_transaction_commit_finishes_once() {
    let driver = Arc::new(InMemoryTestDriver::new());
    let (_dialect, connection) = connect(&driver, DmConfig::new()).await;
    let transaction = Transaction::new(&connection);

    transaction.commit().await.unwrap();
    driver.assert_last_query("COMMIT", &[]);
    assert_eq!(transaction.state(), TransactionState::Committed);

    let err = transaction.rollback().await.unwrap_err();
    assert!(matches!(
        err,
        DmRsError::TransactionFinished(TransactionState::Committed)
    ));
    driver.assert_query_count(1);
}

#[tokio::test]
async fn test_warnings_are_fetched_when_enabled() {
    let driver = Arc::new(InMemoryTestDriver::new().with_responses([
        InMemoryTestResponseBuilder::new()
            .rows_affected(1)
            .warning_status(1)
            .build(),
        InMemoryTestResponseBuilder::new()
            .columns(&["Level", "Code", "Message"])
            .row(&["Warning".into(), 1265.into(), "Data truncated for column 'name'".into()])
            .build(),
    ]));
    init_logs();
    let dialect =
        DmDialect::new(Arc::clone(&driver) as Arc<dyn DatabaseDriver>).show_warnings(true);
    let connection = dialect.connect(&DmConfig::new()).await.unwrap();

    let mut query = dialect.query(&connection, QueryOptions::new(QueryType::Raw));
    let outcome = query
        .run("UPDATE users SET name = 'a very long name'", &Parameters::None)
        .await
        .unwrap();

    driver.assert_last_query("SHOW WARNINGS", &[]);
    assert_eq!(query.warnings(), ["Data truncated for column 'name'"]);
    let QueryOutcome::Raw(result) = outcome else {
        panic!("Expected the raw result");
    };
    assert_eq!(result.warnings, ["Data truncated for column 'name'"]);
    assert_eq!(result.rows_affected, 1);
}

#[tokio::test]
async fn test_failed_warning_fetch_is_not_an_error() {
    let driver = Arc::new(
        InMemoryTestDriver::new()
            .with_response(
                InMemoryTestResponseBuilder::new()
                    .rows_affected(2)
                    .warning_status(3)
                    .build(),
            )
            .with_error(DriverError::server(1064, "syntax error")),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    let mut query = dialect.query(
        &connection,
        QueryOptions::new(QueryType::BulkUpdate).show_warnings(true),
    );
    let outcome = query
        .run("UPDATE users SET age = age + 1", &Parameters::None)
        .await
        .unwrap();

    assert_eq!(outcome, QueryOutcome::Affected(2));
    assert!(query.warnings().is_empty());
    driver.assert_query_count(2);
}

#[tokio::test]
async fn test_warnings_are_skipped_when_disabled() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_response(
            InMemoryTestResponseBuilder::new()
                .rows_affected(1)
                .warning_status(1)
                .build(),
        ),
    );
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;

    dialect
        .query(&connection, QueryOptions::new(QueryType::BulkUpdate))
        .run("UPDATE users SET age = 1", &Parameters::None)
        .await
        .unwrap();

    driver.assert_query_count(1);
}

#[tokio::test]
async fn test_other_queries_return_bound_instance() {
    let driver = Arc::new(InMemoryTestDriver::new());
    let (dialect, connection) = connect(&driver, DmConfig::new()).await;
    let instance = Instance::new().with("id", 3);

    let outcome = dialect
        .query(
            &connection,
            QueryOptions::new(QueryType::Other).instance(instance.clone()),
        )
        .run("SET SCHEMA shop", &Parameters::None)
        .await
        .unwrap();

    assert_eq!(outcome, QueryOutcome::Entity(Some(instance)));
}
