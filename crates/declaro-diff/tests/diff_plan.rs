use declaro_core::{
    Column, DiffFlags, Flavor, ForeignKey, Index, ObjectKey, ObjectKind, Options, Routine,
    RoutineKind, Schema, StatementRef, Table, Vendor,
};
use declaro_diff::{diff, AlterClause, DiffKind, Safety};

fn flavor() -> Flavor {
    Flavor::new(Vendor::Mysql, 8, 0, 36)
}

fn schema(tables: Vec<Table>) -> Schema {
    let mut schema = Schema::new("app", flavor());
    schema.tables = tables;
    schema
}

fn table(name: &str, origin: usize) -> Table {
    let mut table = Table::new(name);
    table.columns.push(Column::new("id", "int").not_null());
    table.indexes.push(Index::primary_key(&["id"]));
    table.origin = Some(StatementRef(origin));
    table
}

fn with_fk(mut table: Table, column: &str, target: &str) -> Table {
    table.columns.push(Column::new(column, "int"));
    table
        .indexes
        .push(Index::new(format!("fk_{}_{target}", table.name), &[column]));
    table.foreign_keys.push(ForeignKey::new(
        format!("fk_{}_{target}", table.name),
        &[column],
        target,
        &["id"],
    ));
    table
}

fn keys(diff: &declaro_diff::Diff) -> Vec<(DiffKind, String)> {
    diff.object_diffs
        .iter()
        .map(|object| (object.kind, object.key.name.clone()))
        .collect()
}

fn position(order: &[(DiffKind, String)], kind: DiffKind, name: &str) -> usize {
    order
        .iter()
        .position(|(k, n)| *k == kind && n == name)
        .unwrap_or_else(|| panic!("{name} missing from {order:?}"))
}

#[test]
fn identical_schemas_have_empty_diff() {
    let desired = schema(vec![with_fk(table("orders", 1), "user_id", "users"), table("users", 0)]);
    let mut actual = desired.clone();
    for table in &mut actual.tables {
        table.auto_increment = Some(1000);
        table.create_statement = format!("CREATE TABLE `{}` (...)", table.name);
        table.origin = None;
    }
    actual.tables.reverse();

    let result = diff(&desired, &actual, &Options::default());
    assert!(result.is_empty(), "unexpected diff:\n{result}");
    assert!(result.render(&DiffFlags::default()).is_empty());
}

#[test]
fn int_to_bigint_is_one_unsafe_clause() {
    let actual = schema(vec![table("users", 0)]);
    let mut desired = actual.clone();
    desired.tables[0].columns[0].type_name = "bigint".to_string();

    let result = diff(&desired, &actual, &Options::default());
    assert_eq!(result.len(), 1);
    let object = &result.object_diffs[0];
    assert_eq!(object.kind, DiffKind::Alter);
    assert_eq!(object.key, ObjectKey::table("users"));
    assert_eq!(object.clauses.len(), 1);
    assert!(matches!(object.clauses[0], AlterClause::ModifyColumn { .. }));
    assert_eq!(object.safety, Safety::Unsafe);
    assert_eq!(
        result.render(&DiffFlags::default()),
        vec!["ALTER TABLE `users` MODIFY COLUMN `id` bigint NOT NULL"]
    );

    let strict = DiffFlags {
        allow_unsafe: false,
        ..DiffFlags::default()
    };
    assert!(result.render(&strict).is_empty());
    assert_eq!(result.blocked(&strict).len(), 1);
}

#[test]
fn json_plan_names_operations_and_safety() {
    let actual = schema(vec![table("users", 0)]);
    let mut desired = actual.clone();
    desired.tables[0].columns[0].type_name = "bigint".to_string();

    let value = serde_json::to_value(diff(&desired, &actual, &Options::default())).unwrap();
    let object = &value["object_diffs"][0];
    assert_eq!(object["kind"], "alter");
    assert_eq!(object["key"]["name"], "users");
    assert_eq!(object["safety"], "unsafe");
    assert_eq!(object["clauses"][0]["op"], "modify_column");
    assert_eq!(object["clauses"][0]["to"]["name"], "id");
    assert!(object.get("omitted_foreign_keys").is_none());
}

#[test]
fn added_tables_follow_foreign_keys() {
    let desired = schema(vec![
        with_fk(with_fk(table("items", 0), "order_id", "orders"), "product_id", "products"),
        with_fk(table("orders", 1), "user_id", "users"),
        table("users", 2),
        table("products", 3),
    ]);
    let actual = schema(Vec::new());

    let order = keys(&diff(&desired, &actual, &Options::default()));
    assert_eq!(order.len(), 4);
    assert!(position(&order, DiffKind::Add, "users") < position(&order, DiffKind::Add, "orders"));
    assert!(position(&order, DiffKind::Add, "orders") < position(&order, DiffKind::Add, "items"));
    assert!(position(&order, DiffKind::Add, "products") < position(&order, DiffKind::Add, "items"));
}

#[test]
fn dropped_tables_go_referencing_first() {
    let desired = schema(Vec::new());
    let actual = schema(vec![table("users", 0), with_fk(table("orders", 1), "user_id", "users")]);

    let result = diff(&desired, &actual, &Options::default());
    let order = keys(&result);
    assert_eq!(
        order,
        vec![
            (DiffKind::Drop, "orders".to_string()),
            (DiffKind::Drop, "users".to_string()),
        ]
    );
    assert!(result.object_diffs.iter().all(|object| object.safety == Safety::Destructive));
    assert!(result.render(&DiffFlags::default()).is_empty());

    let allow = DiffFlags {
        allow_destructive: true,
        ..DiffFlags::default()
    };
    assert_eq!(
        result.render(&allow),
        vec!["DROP TABLE `orders`", "DROP TABLE `users`"]
    );
}

#[test]
fn foreign_key_drops_are_split_out_and_run_first() {
    let actual = schema(vec![table("users", 0), with_fk(table("orders", 1), "user_id", "users")]);
    let mut orders = with_fk(table("orders", 1), "user_id", "users");
    orders.foreign_keys.clear();
    orders.columns.push(Column::new("note", "text"));
    let desired = schema(vec![orders]);

    let result = diff(&desired, &actual, &Options::default());
    let order = keys(&result);
    assert_eq!(
        order,
        vec![
            (DiffKind::Alter, "orders".to_string()),
            (DiffKind::Drop, "users".to_string()),
            (DiffKind::Alter, "orders".to_string()),
        ]
    );
    assert!(result.object_diffs[0]
        .clauses
        .iter()
        .all(AlterClause::is_foreign_key_drop));
    assert_eq!(result.object_diffs[0].safety, Safety::Safe);
    assert_eq!(result.object_diffs[2].clauses.len(), 1);
}

#[test]
fn cyclic_tables_defer_their_foreign_keys() {
    let desired = schema(vec![
        with_fk(table("a", 0), "b_id", "b"),
        with_fk(table("b", 1), "a_id", "a"),
    ]);
    let actual = schema(Vec::new());

    let result = diff(&desired, &actual, &Options::default());
    let statements = result.render(&DiffFlags::default());
    assert_eq!(statements.len(), 3);
    assert!(statements[0].starts_with("CREATE TABLE `a`"));
    assert!(!statements[0].contains("FOREIGN KEY"));
    assert!(statements[1].starts_with("CREATE TABLE `b`"));
    assert!(statements[1].contains("CONSTRAINT `fk_b_a` FOREIGN KEY"));
    assert_eq!(
        statements[2],
        "ALTER TABLE `a` ADD CONSTRAINT `fk_a_b` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`) ON DELETE RESTRICT ON UPDATE RESTRICT"
    );
}

#[test]
fn new_foreign_key_to_altered_table_waits_for_the_alter() {
    let actual = schema(vec![table("users", 0)]);
    let mut users = table("users", 0);
    users.columns.push(Column::new("code", "int"));
    users.indexes.push(Index::new("code", &["code"]).unique());
    let mut badges = table("badges", 1);
    badges.columns.push(Column::new("user_code", "int"));
    badges
        .foreign_keys
        .push(ForeignKey::new("fk_badge_user", &["user_code"], "users", &["code"]));
    let desired = schema(vec![users, badges]);

    let order = keys(&diff(&desired, &actual, &Options::default()));
    assert_eq!(
        order,
        vec![
            (DiffKind::Add, "badges".to_string()),
            (DiffKind::Alter, "users".to_string()),
            (DiffKind::Alter, "badges".to_string()),
        ]
    );
}

#[test]
fn dropping_a_column_is_blocked_without_permission() {
    let mut actual = schema(vec![table("users", 0)]);
    actual.tables[0].columns.push(Column::new("legacy", "text"));
    let mut desired = schema(vec![table("users", 0)]);
    desired.tables[0].columns.push(Column::new("email", "varchar(255)"));

    let result = diff(&desired, &actual, &Options::default());
    assert_eq!(result.len(), 1);
    assert_eq!(result.max_safety(), Some(Safety::Destructive));
    let flags = DiffFlags::default();
    assert!(result.render(&flags).is_empty());
    assert_eq!(result.blocked(&flags)[0].key, ObjectKey::table("users"));

    let flags = DiffFlags {
        allow_destructive: true,
        alter_algorithm: Some("INPLACE".to_string()),
        alter_lock: Some("NONE".to_string()),
        ..DiffFlags::default()
    };
    assert_eq!(
        result.render(&flags),
        vec!["ALTER TABLE `users` DROP COLUMN `legacy`, ADD COLUMN `email` varchar(255) NULL, ALGORITHM=INPLACE, LOCK=NONE"]
    );
}

fn routine(name: &str, body: &str) -> Routine {
    Routine {
        name: name.to_string(),
        kind: RoutineKind::Procedure,
        params: String::new(),
        returns: None,
        body: body.to_string(),
        deterministic: false,
        data_access: "CONTAINS SQL".to_string(),
        security: "DEFINER".to_string(),
        comment: String::new(),
        sql_mode: String::new(),
        create_statement: String::new(),
        origin: Some(StatementRef(0)),
    }
}

#[test]
fn routines_come_after_tables_and_are_replaced() {
    let mut actual = schema(Vec::new());
    actual.routines.push(routine("refresh", "BEGIN SELECT 1; END"));
    actual.routines.push(routine("obsolete", "BEGIN END"));
    let mut desired = schema(vec![table("users", 5)]);
    desired.routines.push(routine("refresh", "BEGIN SELECT 2; END"));

    let result = diff(&desired, &actual, &Options::default());
    let order = keys(&result);
    assert_eq!(
        order,
        vec![
            (DiffKind::Add, "users".to_string()),
            (DiffKind::Alter, "refresh".to_string()),
            (DiffKind::Drop, "obsolete".to_string()),
        ]
    );
    assert_eq!(result.object_diffs[1].key.kind, ObjectKind::Procedure);
    assert_eq!(result.object_diffs[1].safety, Safety::Safe);
    assert_eq!(result.object_diffs[2].safety, Safety::Unsafe);

    let statements = result.render(&DiffFlags::default());
    assert_eq!(statements[1], "DROP PROCEDURE `refresh`");
    assert!(statements[2].starts_with("CREATE PROCEDURE `refresh`()"));
    assert!(statements[2].ends_with("BEGIN SELECT 2; END"));
    assert_eq!(statements[3], "DROP PROCEDURE `obsolete`");
}
