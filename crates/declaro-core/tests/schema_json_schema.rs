use declaro_core::{Column, Flavor, ForeignKey, Index, Schema, Table, Vendor};
use jsonschema::JSONSchema;
use schemars::schema_for;

fn sample_schema() -> Schema {
    let mut users = Table::new("users");
    users.columns.push(Column::new("id", "int unsigned").not_null());
    users.columns.push(Column::new("email", "varchar(255)"));
    users.indexes.push(Index::primary_key(&["id"]));
    users.indexes.push(Index::new("uniq_email", &["email"]).unique());

    let mut orders = Table::new("orders");
    orders.columns.push(Column::new("id", "bigint").not_null());
    orders.columns.push(Column::new("user_id", "int unsigned"));
    orders.indexes.push(Index::primary_key(&["id"]));
    orders
        .foreign_keys
        .push(ForeignKey::new("fk_orders_user", &["user_id"], "users", &["id"]));

    let mut schema = Schema::new("shop", Flavor::new(Vendor::Mysql, 8, 0, 36));
    schema.tables = vec![users, orders];
    schema
}

#[test]
fn json_schema_describes_model() {
    let generated = schema_for!(Schema);
    let generated_json = serde_json::to_value(&generated).expect("serialize generated schema");

    let definitions = generated_json
        .get("definitions")
        .and_then(|value| value.as_object())
        .expect("definitions");
    for name in ["Table", "Column", "Index", "ForeignKey", "Routine", "Flavor"] {
        assert!(definitions.contains_key(name), "missing definition {name}");
    }
}

#[test]
fn serialized_schema_validates_against_json_schema() {
    let generated = serde_json::to_value(schema_for!(Schema)).expect("serialize generated schema");
    let compiled = JSONSchema::compile(&generated).expect("compile json schema");

    let instance = serde_json::to_value(sample_schema()).expect("serialize schema");
    assert!(compiled.is_valid(&instance));

    let mut broken = instance.clone();
    broken["tables"][0]["columns"][0]["nullable"] = serde_json::json!("no");
    assert!(!compiled.is_valid(&broken));
}
