use declaro_core::{
    Column, Flavor, LogicalSchema, Options, Schema, Severity, Statement, StatementKind,
    StatementRef, Table,
};
use declaro_lint::{
    check_schema, rules, CheckContext, Checker, Finding, RuleError, RuleRegistry,
    RULE_INTERNAL_ERROR,
};
use declaro_workspace::WorkspaceSchema;

struct Panics;

impl Checker for Panics {
    fn name(&self) -> &'static str {
        "panics"
    }

    fn description(&self) -> &'static str {
        "always panics"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, _ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        panic!("index out of range");
    }
}

struct Fails;

impl Checker for Fails {
    fn name(&self) -> &'static str {
        "fails"
    }

    fn description(&self) -> &'static str {
        "always errors"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, _ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Err(RuleError::Internal("lookup table missing".to_string()))
    }
}

fn workspace_schema() -> WorkspaceSchema {
    let mut logical = LogicalSchema::new("app");
    logical.push(
        Statement::new(StatementKind::CreateTable, "CREATE TABLE t (\n  id int\n)", "t.sql", 3)
            .with_object("t"),
    );
    let mut table = Table::new("t");
    table.columns.push(Column::new("id", "int(11)"));
    table.origin = Some(StatementRef(0));
    let mut schema = Schema::new("_declaro_tmp_app", Flavor::UNKNOWN);
    schema.tables.push(table);
    WorkspaceSchema {
        schema,
        logical,
        failures: Vec::new(),
    }
}

#[test]
fn failing_rules_do_not_stop_the_others() {
    let mut registry = RuleRegistry::new();
    registry
        .register(Box::new(Panics))
        .register(Box::new(rules::HasPrimaryKey))
        .register(Box::new(Fails));

    let result = check_schema(&workspace_schema(), &Options::default(), &registry);

    let internal: Vec<&str> = result
        .annotations
        .iter()
        .filter(|annotation| annotation.rule == RULE_INTERNAL_ERROR)
        .map(|annotation| annotation.message.as_str())
        .collect();
    assert_eq!(internal.len(), 2);
    assert!(internal.iter().any(|msg| msg.contains("panics") && msg.contains("index out of range")));
    assert!(internal.iter().any(|msg| msg.contains("fails") && msg.contains("lookup table missing")));

    let has_pk: Vec<_> = result
        .annotations
        .iter()
        .filter(|annotation| annotation.rule == "has-pk")
        .collect();
    assert_eq!(has_pk.len(), 1);
    assert_eq!(has_pk[0].location(), "t.sql:3");
    assert_eq!(result.exit_severity(), Severity::Error);
}

#[test]
fn ignored_rules_are_never_run() {
    let mut registry = RuleRegistry::new();
    registry.register(Box::new(Panics));
    let mut options = Options::default();
    options.rule_severity.insert("panics".to_string(), Severity::Ignore);

    let result = check_schema(&workspace_schema(), &options, &registry);
    assert!(result.is_empty());
    assert_eq!(result.exit_severity(), Severity::Ignore);
}

#[test]
fn registering_a_rule_twice_replaces_it() {
    let mut registry = RuleRegistry::standard();
    let before = registry.len();
    registry.register(Box::new(rules::HasPrimaryKey));
    assert_eq!(registry.len(), before);
    assert!(registry.get("has-pk").is_some());
    assert_eq!(registry.names().last(), Some(&"has-pk"));
}

fn folded_schema(declared_as: &str) -> WorkspaceSchema {
    let mut logical = LogicalSchema::new("app");
    logical.push(
        Statement::new(
            StatementKind::CreateTable,
            format!("CREATE TABLE {declared_as} (\n  id int\n)"),
            "users.sql",
            1,
        )
        .with_object(declared_as),
    );
    let mut table = Table::new("users");
    table.columns.push(Column::new("id", "int(11)"));
    let mut schema = Schema::new("_declaro_tmp_app", Flavor::UNKNOWN);
    schema.tables.push(table);
    WorkspaceSchema {
        schema,
        logical,
        failures: Vec::new(),
    }
}

#[test]
fn findings_on_case_folded_tables_keep_their_location() {
    let mut registry = RuleRegistry::new();
    registry.register(Box::new(rules::HasPrimaryKey));
    let mut options = Options::default();
    options.force_severity(&["has-pk"], Severity::Error);

    let result = check_schema(&folded_schema("Users"), &options, &registry);

    assert_eq!(result.annotations.len(), 1);
    assert_eq!(result.annotations[0].location(), "users.sql:1");
    assert_eq!(result.exit_severity(), Severity::Error);
}

#[test]
fn findings_without_a_declaration_are_kept_unlocated() {
    let mut registry = RuleRegistry::new();
    registry.register(Box::new(rules::HasPrimaryKey));
    let mut options = Options::default();
    options.force_severity(&["has-pk"], Severity::Error);

    let result = check_schema(&folded_schema("accounts"), &options, &registry);

    assert_eq!(result.annotations.len(), 1);
    let annotation = &result.annotations[0];
    assert_eq!(annotation.statement, None);
    assert_eq!(annotation.location(), "<schema>");
    assert!(annotation.message.contains("`users`"));
    assert_eq!(result.exit_severity(), Severity::Error);
}
