//! Retrieval tests: scripted executors replay canned catalog rows and the
//! readers must reconstruct the exact schema graph.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tablemorph::{
    create_reader, BasicType, ColumnInfo, DbEngine, DbEngines, ForeignKeyInfo, IndexInfo,
    IndexKind, SchemaError, SchemaInfo, SchemaReader, SqlExecutor, TableInfo, TypeInfo,
};

use common::{boolean, int, null, row, text, MockExecutor};

const GROUPS_DDL: &str = "CREATE TABLE [Groups] (\n\
    \x20 [Id] INTEGER NOT NULL CONSTRAINT [pk_Groups] PRIMARY KEY AUTOINCREMENT,\n\
    \x20 [Title] NVARCHAR(50) NOT NULL COLLATE NOCASE,\n\
    \x20 CONSTRAINT [uq_Groups_Title] UNIQUE ([Title])\n\
    )";

const USERS_DDL: &str = "CREATE TABLE [Users] (\n\
    \x20 [Id] INTEGER NOT NULL CONSTRAINT [pk_Users] PRIMARY KEY AUTOINCREMENT,\n\
    \x20 [Name] NVARCHAR(100) NOT NULL COLLATE NOCASE,\n\
    \x20 [GroupId] INTEGER NOT NULL,\n\
    \x20 CONSTRAINT [fk_Users_Groups] FOREIGN KEY ([GroupId]) REFERENCES [Groups] ([Id])\n\
    )";

fn table_info_cols() -> &'static [&'static str] {
    &["cid", "name", "type", "notnull", "dflt_value", "pk"]
}

fn sqlite_catalog() -> MockExecutor {
    MockExecutor::new()
        .on(
            &["SELECT name FROM sqlite_master"],
            vec![row(&["name"], vec![text("Groups")]), row(&["name"], vec![text("Users")])],
        )
        .on(
            &["SELECT sql FROM sqlite_master", "= 'Groups'"],
            vec![row(&["sql"], vec![text(GROUPS_DDL)])],
        )
        .on(
            &["SELECT sql FROM sqlite_master", "= 'Users'"],
            vec![row(&["sql"], vec![text(USERS_DDL)])],
        )
        .on(
            &["PRAGMA table_info([Groups])"],
            vec![
                row(
                    table_info_cols(),
                    vec![int(0), text("Id"), text("INTEGER"), int(1), null(), int(1)],
                ),
                row(
                    table_info_cols(),
                    vec![int(1), text("Title"), text("NVARCHAR(50)"), int(1), null(), int(0)],
                ),
            ],
        )
        .on(
            &["PRAGMA table_info([Users])"],
            vec![
                row(
                    table_info_cols(),
                    vec![int(0), text("Id"), text("INTEGER"), int(1), null(), int(1)],
                ),
                row(
                    table_info_cols(),
                    vec![int(1), text("Name"), text("NVARCHAR(100)"), int(1), null(), int(0)],
                ),
                row(
                    table_info_cols(),
                    vec![int(2), text("GroupId"), text("INTEGER"), int(1), null(), int(0)],
                ),
            ],
        )
        .on(
            &["PRAGMA index_list([Groups])"],
            vec![row(
                &["seq", "name", "unique", "origin", "partial"],
                vec![
                    int(0),
                    text("sqlite_autoindex_Groups_1"),
                    int(1),
                    text("u"),
                    int(0),
                ],
            )],
        )
        .on(&["PRAGMA index_list([Users])"], vec![])
        .on(
            &["PRAGMA index_info([sqlite_autoindex_Groups_1])"],
            vec![row(
                &["seqno", "cid", "name"],
                vec![int(0), int(1), text("Title")],
            )],
        )
        .on(&["PRAGMA foreign_key_list([Groups])"], vec![])
        .on(
            &["PRAGMA foreign_key_list([Users])"],
            vec![row(
                &["id", "seq", "table", "from", "to"],
                vec![int(0), int(0), text("Groups"), text("GroupId"), text("Id")],
            )],
        )
}

fn expected_sqlite_schema() -> SchemaInfo {
    let mut groups = TableInfo::new("Groups");
    groups
        .add_column(ColumnInfo::new(
            "Id",
            TypeInfo::new(BasicType::Autoincrement, false),
        ))
        .unwrap();
    groups
        .add_column(ColumnInfo::new(
            "Title",
            TypeInfo::with_length(BasicType::VarText, false, 50),
        ))
        .unwrap();
    groups
        .add_index(IndexInfo::new(
            "pk_Groups",
            IndexKind::PrimaryKey,
            vec!["Id"],
        ))
        .unwrap();
    groups
        .add_index(IndexInfo::new(
            "uq_Groups_Title",
            IndexKind::Unique,
            vec!["Title"],
        ))
        .unwrap();

    let mut users = TableInfo::new("Users");
    users
        .add_column(ColumnInfo::new(
            "Id",
            TypeInfo::new(BasicType::Autoincrement, false),
        ))
        .unwrap();
    users
        .add_column(ColumnInfo::new(
            "Name",
            TypeInfo::with_length(BasicType::VarText, false, 100),
        ))
        .unwrap();
    users
        .add_column(ColumnInfo::new(
            "GroupId",
            TypeInfo::new(BasicType::Long, false),
        ))
        .unwrap();
    users
        .add_index(IndexInfo::new("pk_Users", IndexKind::PrimaryKey, vec!["Id"]))
        .unwrap();
    users
        .add_foreign_key(ForeignKeyInfo::new(
            "fk_Users_Groups",
            vec!["GroupId"],
            "Groups",
            vec!["Id"],
        ))
        .unwrap();

    let mut schema = SchemaInfo::new();
    schema.add_table(groups).unwrap();
    schema.add_table(users).unwrap();
    schema
}

#[tokio::test]
async fn sqlite_reader_reconstructs_the_schema() {
    let executor: Arc<dyn SqlExecutor> = Arc::new(sqlite_catalog());
    let reader = create_reader(DbEngine::Sqlite, executor);
    let schema = reader.retrieve_schema(DbEngines::SQLITE).await.unwrap();
    assert_eq!(schema, expected_sqlite_schema());
}

#[tokio::test]
async fn sqlite_reader_recovers_names_the_pragmas_do_not_expose() {
    let executor: Arc<dyn SqlExecutor> = Arc::new(sqlite_catalog());
    let reader = create_reader(DbEngine::Sqlite, executor);

    // The rowid-alias primary key never shows up in index_list; its name
    // comes from the stored DDL.
    let indexes = reader.retrieve_indexes("Users").await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, "pk_Users");
    assert_eq!(indexes[0].kind, IndexKind::PrimaryKey);

    // The unique constraint's auto-index name is replaced by the declared
    // constraint name.
    let indexes = reader.retrieve_indexes("Groups").await.unwrap();
    let unique = indexes.iter().find(|i| i.kind == IndexKind::Unique).unwrap();
    assert_eq!(unique.name, "uq_Groups_Title");

    // foreign_key_list carries no names; the declared one is matched by its
    // column lists.
    let fks = reader.retrieve_foreign_keys("Users").await.unwrap();
    assert_eq!(fks[0].name, "fk_Users_Groups");
}

#[tokio::test]
async fn sqlite_reader_rejects_fixed_width_columns() {
    let executor: Arc<dyn SqlExecutor> = Arc::new(
        MockExecutor::new()
            .on(
                &["SELECT sql FROM sqlite_master", "= 'Legacy'"],
                vec![row(&["sql"], vec![text("CREATE TABLE [Legacy] ([Code] CHAR(3))")])],
            )
            .on(
                &["PRAGMA table_info([Legacy])"],
                vec![row(
                    table_info_cols(),
                    vec![int(0), text("Code"), text("CHAR(3)"), int(0), null(), int(0)],
                )],
            ),
    );
    let reader = create_reader(DbEngine::Sqlite, executor);
    let err = reader.retrieve_columns("Legacy").await.unwrap_err();
    assert!(matches!(err, SchemaError::NotSupported(_)));
}

fn mssql_column_cols() -> &'static [&'static str] {
    &[
        "ColumnName",
        "IsNullable",
        "IsAutoincrement",
        "OrdinalPosition",
        "DataType",
        "CharMaxLength",
    ]
}

fn mssql_catalog() -> MockExecutor {
    MockExecutor::new()
        .on(
            &["information_schema.tables"],
            vec![row(&["table_name"], vec![text("Users")])],
        )
        .on(
            &["sys.columns sc", "'Users'"],
            vec![
                row(
                    mssql_column_cols(),
                    vec![
                        text("Id"),
                        boolean(false),
                        boolean(true),
                        int(1),
                        text("bigint"),
                        null(),
                    ],
                ),
                row(
                    mssql_column_cols(),
                    vec![
                        text("Name"),
                        boolean(false),
                        boolean(false),
                        int(2),
                        text("nvarchar"),
                        int(100),
                    ],
                ),
                row(
                    mssql_column_cols(),
                    vec![
                        text("Bio"),
                        boolean(true),
                        boolean(false),
                        int(3),
                        text("nvarchar"),
                        int(-1),
                    ],
                ),
            ],
        )
        .on(
            &["sys.index_columns", "'Users'"],
            vec![
                row(
                    &[
                        "IndexName",
                        "TableName",
                        "ColumnName",
                        "IsPrimaryKey",
                        "IsUniqueConstraint",
                    ],
                    vec![
                        text("pk_Users"),
                        text("Users"),
                        text("Id"),
                        boolean(true),
                        boolean(false),
                    ],
                ),
                row(
                    &[
                        "IndexName",
                        "TableName",
                        "ColumnName",
                        "IsPrimaryKey",
                        "IsUniqueConstraint",
                    ],
                    vec![
                        text("uq_Users_Name"),
                        text("Users"),
                        text("Name"),
                        boolean(false),
                        boolean(true),
                    ],
                ),
            ],
        )
        .on(&["sys.foreign_key_columns", "'Users'"], vec![])
}

#[tokio::test]
async fn mssql_reader_reconstructs_the_schema() {
    let executor: Arc<dyn SqlExecutor> = Arc::new(mssql_catalog());
    let reader = create_reader(DbEngine::SqlServer, executor);
    let schema = reader.retrieve_schema(DbEngines::SQL_SERVER).await.unwrap();

    let users = schema.table("Users").unwrap();
    let columns = users.columns();
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[0].ty.basic_type, BasicType::Autoincrement);
    assert_eq!(columns[1].ty, TypeInfo::with_length(BasicType::VarText, false, 100));
    // -1 means NVARCHAR(MAX): unbounded.
    assert_eq!(columns[2].ty, TypeInfo::new(BasicType::VarText, true));

    assert_eq!(users.primary_key().unwrap().name, "pk_Users");
    assert_eq!(users.unique_constraints().count(), 1);
}

#[tokio::test]
async fn mssql_reader_rejects_non_bigint_identity() {
    let executor: Arc<dyn SqlExecutor> = Arc::new(MockExecutor::new().on(
        &["sys.columns sc", "'Counters'"],
        vec![row(
            mssql_column_cols(),
            vec![
                text("Id"),
                boolean(false),
                boolean(true),
                int(1),
                text("int"),
                null(),
            ],
        )],
    ));
    let reader = create_reader(DbEngine::SqlServer, executor);
    let err = reader.retrieve_columns("Counters").await.unwrap_err();
    assert!(matches!(err, SchemaError::NotSupported(_)));
}

#[tokio::test]
async fn postgres_reader_is_partial() {
    let executor: Arc<dyn SqlExecutor> = Arc::new(
        MockExecutor::new().on(
            &["information_schema.columns", "'Users'"],
            vec![
                row(
                    &[
                        "column_name",
                        "is_nullable",
                        "character_maximum_length",
                        "column_default",
                        "data_type",
                    ],
                    vec![
                        text("id"),
                        text("NO"),
                        null(),
                        text("nextval('users_id_seq'::regclass)"),
                        text("bigint"),
                    ],
                ),
                row(
                    &[
                        "column_name",
                        "is_nullable",
                        "character_maximum_length",
                        "column_default",
                        "data_type",
                    ],
                    vec![
                        text("name"),
                        text("YES"),
                        int(80),
                        null(),
                        text("character varying"),
                    ],
                ),
            ],
        ),
    );
    let reader = create_reader(DbEngine::Postgres, executor);

    let columns = reader.retrieve_columns("Users").await.unwrap();
    assert_eq!(columns[0].ty.basic_type, BasicType::Autoincrement);
    assert_eq!(
        columns[1].ty,
        TypeInfo::with_length(BasicType::VarText, true, 80)
    );

    assert!(matches!(
        reader.retrieve_indexes("Users").await,
        Err(SchemaError::NotSupported(_))
    ));
    assert!(matches!(
        reader.retrieve_foreign_keys("Users").await,
        Err(SchemaError::NotSupported(_))
    ));
}
