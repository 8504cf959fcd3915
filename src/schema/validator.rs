//! Schema validation against a baseline.
//!
//! Four independent passes run unconditionally: object counts, required
//! objects, forbidden objects, and ownership. Ownership applies a strict
//! precedence per object: forbidden owner, then a per-object exception
//! (qualified name first, bare name as fallback), then the category-wide
//! expected owner. The allowed-owners whitelist is checked after that chain
//! for every object and may append a second violation for the same object.

use std::collections::{BTreeMap, BTreeSet};

use crate::schema::{
    CountMismatch, DatabaseSchema, ForbiddenObject, MissingObject, ObjectKind, OwnershipViolation,
    SchemaBaseline, SchemaValidationResult, ViolationKind,
};

pub fn validate_schema(
    schema: &DatabaseSchema,
    baseline: Option<&SchemaBaseline>,
) -> SchemaValidationResult {
    // No baseline configured is not drift.
    let Some(baseline) = baseline else {
        return SchemaValidationResult::default();
    };

    let mut result = SchemaValidationResult::default();

    check_counts(schema, baseline, &mut result.count_mismatches);
    check_required_objects(schema, baseline, &mut result.missing_objects);
    check_forbidden_objects(schema, baseline, &mut result.forbidden_objects);
    check_ownership(schema, baseline, &mut result.ownership_violations);

    result.has_drift = !result.count_mismatches.is_empty()
        || !result.missing_objects.is_empty()
        || !result.forbidden_objects.is_empty()
        || !result.ownership_violations.is_empty();

    result
}

fn check_counts(schema: &DatabaseSchema, baseline: &SchemaBaseline, out: &mut Vec<CountMismatch>) {
    let checks = [
        (ObjectKind::Table, baseline.expected_tables, schema.tables.len()),
        (ObjectKind::View, baseline.expected_views, schema.views.len()),
        (
            ObjectKind::Sequence,
            baseline.expected_sequences,
            schema.sequences.len(),
        ),
        (
            ObjectKind::Function,
            baseline.expected_functions,
            schema.functions.len(),
        ),
        (
            ObjectKind::Procedure,
            baseline.expected_procedures,
            schema.procedures.len(),
        ),
        (ObjectKind::Role, baseline.expected_roles, schema.roles.len()),
        (
            ObjectKind::Extension,
            baseline.expected_extensions,
            schema.extensions.len(),
        ),
    ];

    for (kind, expected, actual) in checks {
        if let Some(expected) = expected {
            let actual = actual as i64;
            if expected != actual {
                out.push(CountMismatch {
                    object_kind: kind,
                    expected,
                    actual,
                });
            }
        }
    }
}

fn check_required_objects(
    schema: &DatabaseSchema,
    baseline: &SchemaBaseline,
    out: &mut Vec<MissingObject>,
) {
    let tables = name_index(schema.tables.iter().map(|t| (t.qualified_name(), t.name.clone())));
    let views = name_index(schema.views.iter().map(|v| (v.qualified_name(), v.name.clone())));
    let functions = name_index(
        schema
            .functions
            .iter()
            .map(|f| (f.qualified_name(), f.name.clone())),
    );
    let procedures = name_index(
        schema
            .procedures
            .iter()
            .map(|p| (p.qualified_name(), p.name.clone())),
    );
    let extensions: BTreeSet<String> = schema.extensions.iter().map(|e| e.name.clone()).collect();

    let passes = [
        (ObjectKind::Table, &baseline.required_tables, &tables),
        (ObjectKind::View, &baseline.required_views, &views),
        (ObjectKind::Function, &baseline.required_functions, &functions),
        (
            ObjectKind::Procedure,
            &baseline.required_procedures,
            &procedures,
        ),
        (ObjectKind::Extension, &baseline.required_extensions, &extensions),
    ];

    for (kind, required, present) in passes {
        for name in required {
            if !present.contains(name) {
                out.push(MissingObject {
                    object_kind: kind,
                    name: name.clone(),
                });
            }
        }
    }
}

/// Indexes objects under both their qualified and bare names so baselines may
/// reference either form.
fn name_index(objects: impl Iterator<Item = (String, String)>) -> BTreeSet<String> {
    let mut index = BTreeSet::new();
    for (qualified, bare) in objects {
        index.insert(qualified);
        index.insert(bare);
    }
    index
}

fn check_forbidden_objects(
    schema: &DatabaseSchema,
    baseline: &SchemaBaseline,
    out: &mut Vec<ForbiddenObject>,
) {
    let tables = name_index(schema.tables.iter().map(|t| (t.qualified_name(), t.name.clone())));
    for name in &baseline.forbidden_tables {
        if tables.contains(name) {
            out.push(ForbiddenObject {
                object_kind: ObjectKind::Table,
                name: name.clone(),
            });
        }
    }
}

struct OwnerRules<'a> {
    forbidden: BTreeSet<&'a str>,
    allowed: BTreeSet<&'a str>,
    allowed_display: String,
    exceptions: &'a BTreeMap<String, String>,
    expected_owner: Option<&'a str>,
}

impl<'a> OwnerRules<'a> {
    fn new(
        baseline: &'a SchemaBaseline,
        exceptions: &'a BTreeMap<String, String>,
        expected_owner: Option<&'a str>,
    ) -> Self {
        Self {
            forbidden: baseline.forbidden_owners.iter().map(String::as_str).collect(),
            allowed: baseline.allowed_owners.iter().map(String::as_str).collect(),
            allowed_display: format!("one of: {:?}", baseline.allowed_owners),
            exceptions,
            expected_owner,
        }
    }
}

fn check_ownership(
    schema: &DatabaseSchema,
    baseline: &SchemaBaseline,
    out: &mut Vec<OwnershipViolation>,
) {
    // Database ownership is a single comparison with no precedence chain.
    if let Some(expected) = &baseline.expected_database_owner {
        if &schema.owner != expected {
            out.push(OwnershipViolation {
                object_kind: ObjectKind::Database,
                object_name: schema.database_name.clone(),
                actual_owner: schema.owner.clone(),
                expected_owner: expected.clone(),
                kind: ViolationKind::DatabaseOwner,
            });
        }
    }

    let table_rules = OwnerRules::new(
        baseline,
        &baseline.table_owner_exceptions,
        baseline.expected_table_owner.as_deref(),
    );
    for table in &schema.tables {
        check_object_owner(
            ObjectKind::Table,
            &table.qualified_name(),
            &table.name,
            &table.owner,
            &table_rules,
            out,
        );
    }

    let view_rules = OwnerRules::new(
        baseline,
        &baseline.view_owner_exceptions,
        baseline.expected_view_owner.as_deref(),
    );
    for view in &schema.views {
        check_object_owner(
            ObjectKind::View,
            &view.qualified_name(),
            &view.name,
            &view.owner,
            &view_rules,
            out,
        );
    }

    let sequence_rules = OwnerRules::new(
        baseline,
        &baseline.sequence_owner_exceptions,
        baseline.expected_sequence_owner.as_deref(),
    );
    for sequence in &schema.sequences {
        check_object_owner(
            ObjectKind::Sequence,
            &sequence.qualified_name(),
            &sequence.name,
            &sequence.owner,
            &sequence_rules,
            out,
        );
    }

    let function_rules = OwnerRules::new(
        baseline,
        &baseline.function_owner_exceptions,
        baseline.expected_function_owner.as_deref(),
    );
    for function in &schema.functions {
        check_object_owner(
            ObjectKind::Function,
            &function.signature(),
            &function.name,
            &function.owner,
            &function_rules,
            out,
        );
    }

    let procedure_rules = OwnerRules::new(
        baseline,
        &baseline.procedure_owner_exceptions,
        baseline.expected_procedure_owner.as_deref(),
    );
    for procedure in &schema.procedures {
        check_object_owner(
            ObjectKind::Procedure,
            &procedure.signature(),
            &procedure.name,
            &procedure.owner,
            &procedure_rules,
            out,
        );
    }
}

fn check_object_owner(
    kind: ObjectKind,
    qualified: &str,
    bare: &str,
    owner: &str,
    rules: &OwnerRules<'_>,
    out: &mut Vec<OwnershipViolation>,
) {
    if rules.forbidden.contains(owner) {
        out.push(OwnershipViolation {
            object_kind: kind,
            object_name: qualified.to_string(),
            actual_owner: owner.to_string(),
            expected_owner: "(any non-forbidden owner)".to_string(),
            kind: ViolationKind::ForbiddenOwner,
        });
    } else if let Some(expected) = lookup_exception(rules.exceptions, qualified, bare) {
        if owner != expected {
            out.push(OwnershipViolation {
                object_kind: kind,
                object_name: qualified.to_string(),
                actual_owner: owner.to_string(),
                expected_owner: expected.to_string(),
                kind: ViolationKind::WrongOwner,
            });
        }
    } else if let Some(expected) = rules.expected_owner {
        if owner != expected {
            out.push(OwnershipViolation {
                object_kind: kind,
                object_name: qualified.to_string(),
                actual_owner: owner.to_string(),
                expected_owner: expected.to_string(),
                kind: ViolationKind::WrongOwner,
            });
        }
    }

    // The whitelist check is deliberately independent of the chain above and
    // may add a second violation for the same object.
    if !rules.allowed.is_empty() && !rules.allowed.contains(owner) {
        out.push(OwnershipViolation {
            object_kind: kind,
            object_name: qualified.to_string(),
            actual_owner: owner.to_string(),
            expected_owner: rules.allowed_display.clone(),
            kind: ViolationKind::WrongOwner,
        });
    }
}

/// Ordered lookup: the qualified key wins, the bare key is the fallback.
fn lookup_exception<'a>(
    exceptions: &'a BTreeMap<String, String>,
    qualified: &str,
    bare: &str,
) -> Option<&'a str> {
    [qualified, bare]
        .into_iter()
        .find_map(|key| exceptions.get(key).map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ExtensionObject, RoleObject, TableObject, ViewObject};

    fn table(schema_name: &str, name: &str, owner: &str) -> TableObject {
        TableObject {
            schema: schema_name.to_string(),
            name: name.to_string(),
            owner: owner.to_string(),
        }
    }

    fn schema_with_tables(tables: Vec<TableObject>) -> DatabaseSchema {
        DatabaseSchema {
            database_name: "appdb".to_string(),
            owner: "app_owner".to_string(),
            tables,
            ..Default::default()
        }
    }

    #[test]
    fn nil_baseline_is_not_drift() {
        let schema = schema_with_tables(vec![table("public", "orders", "app_owner")]);
        let result = validate_schema(&schema, None);
        assert!(!result.has_drift);
        assert!(result.count_mismatches.is_empty());
        assert!(result.ownership_violations.is_empty());
    }

    #[test]
    fn missing_required_table_in_empty_schema() {
        let baseline = SchemaBaseline {
            required_tables: vec!["public.orders".to_string()],
            ..Default::default()
        };
        let result = validate_schema(&DatabaseSchema::default(), Some(&baseline));

        assert!(result.has_drift);
        assert_eq!(result.missing_objects.len(), 1);
        assert_eq!(result.missing_objects[0].object_kind, ObjectKind::Table);
        assert_eq!(result.missing_objects[0].name, "public.orders");
    }

    #[test]
    fn required_lookup_accepts_bare_names() {
        let schema = schema_with_tables(vec![table("public", "orders", "app_owner")]);
        let baseline = SchemaBaseline {
            required_tables: vec!["orders".to_string()],
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));
        assert!(result.missing_objects.is_empty());
    }

    #[test]
    fn view_count_mismatch_reports_expected_and_actual() {
        let baseline = SchemaBaseline {
            expected_views: Some(2),
            ..Default::default()
        };
        let result = validate_schema(&DatabaseSchema::default(), Some(&baseline));

        assert!(result.has_drift);
        assert_eq!(result.count_mismatches.len(), 1);
        let mismatch = &result.count_mismatches[0];
        assert_eq!(mismatch.object_kind, ObjectKind::View);
        assert_eq!(mismatch.expected, 2);
        assert_eq!(mismatch.actual, 0);
        assert_eq!(mismatch.diff(), -2);
    }

    #[test]
    fn count_diff_is_signed() {
        let mismatch = CountMismatch {
            object_kind: ObjectKind::Table,
            expected: 124,
            actual: 126,
        };
        assert_eq!(mismatch.diff(), 2);
    }

    #[test]
    fn forbidden_owner_produces_exactly_one_forbidden_violation() {
        let schema = schema_with_tables(vec![table("public", "orders", "test_user")]);
        let baseline = SchemaBaseline {
            forbidden_owners: vec!["test_user".to_string()],
            expected_table_owner: Some("app_owner".to_string()),
            table_owner_exceptions: [("public.orders".to_string(), "app_owner".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));

        // Precedence: neither the exception nor the expected-owner check may
        // stack a wrong_owner on top of the forbidden finding.
        assert_eq!(result.ownership_violations.len(), 1);
        assert_eq!(
            result.ownership_violations[0].kind,
            ViolationKind::ForbiddenOwner
        );
    }

    #[test]
    fn forbidden_owner_still_fails_the_whitelist_check() {
        let schema = schema_with_tables(vec![table("public", "orders", "test_user")]);
        let baseline = SchemaBaseline {
            forbidden_owners: vec!["test_user".to_string()],
            allowed_owners: vec!["app_owner".to_string()],
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));

        assert_eq!(result.ownership_violations.len(), 2);
        assert_eq!(
            result.ownership_violations[0].kind,
            ViolationKind::ForbiddenOwner
        );
        assert_eq!(result.ownership_violations[1].kind, ViolationKind::WrongOwner);
        assert!(result.ownership_violations[1]
            .expected_owner
            .starts_with("one of:"));
    }

    #[test]
    fn exception_overrides_category_owner_qualified_key_first() {
        let schema = schema_with_tables(vec![
            table("public", "orders", "etl_user"),
            table("public", "customers", "app_owner"),
        ]);
        let baseline = SchemaBaseline {
            expected_table_owner: Some("app_owner".to_string()),
            table_owner_exceptions: [("public.orders".to_string(), "etl_user".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));
        assert!(result.ownership_violations.is_empty());
    }

    #[test]
    fn exception_falls_back_to_bare_name() {
        let schema = schema_with_tables(vec![table("public", "orders", "etl_user")]);
        let baseline = SchemaBaseline {
            expected_table_owner: Some("app_owner".to_string()),
            table_owner_exceptions: [("orders".to_string(), "etl_user".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));
        assert!(result.ownership_violations.is_empty());
    }

    #[test]
    fn violated_exception_reports_wrong_owner() {
        let schema = schema_with_tables(vec![table("public", "orders", "intern")]);
        let baseline = SchemaBaseline {
            table_owner_exceptions: [("public.orders".to_string(), "etl_user".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));

        assert_eq!(result.ownership_violations.len(), 1);
        let violation = &result.ownership_violations[0];
        assert_eq!(violation.kind, ViolationKind::WrongOwner);
        assert_eq!(violation.expected_owner, "etl_user");
        assert_eq!(violation.actual_owner, "intern");
    }

    #[test]
    fn whitelist_and_expected_owner_may_both_fire() {
        let schema = schema_with_tables(vec![table("public", "orders", "stranger")]);
        let baseline = SchemaBaseline {
            expected_table_owner: Some("app_owner".to_string()),
            allowed_owners: vec!["app_owner".to_string(), "etl_user".to_string()],
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));

        assert_eq!(result.ownership_violations.len(), 2);
        assert!(result
            .ownership_violations
            .iter()
            .all(|v| v.kind == ViolationKind::WrongOwner));
    }

    #[test]
    fn database_owner_check_uses_its_own_kind() {
        let schema = schema_with_tables(Vec::new());
        let baseline = SchemaBaseline {
            expected_database_owner: Some("dba".to_string()),
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));

        assert_eq!(result.ownership_violations.len(), 1);
        let violation = &result.ownership_violations[0];
        assert_eq!(violation.kind, ViolationKind::DatabaseOwner);
        assert_eq!(violation.object_kind, ObjectKind::Database);
        assert_eq!(violation.object_name, "appdb");
        assert_eq!(violation.actual_owner, "app_owner");
    }

    #[test]
    fn required_and_forbidden_passes_are_independent() {
        let schema = schema_with_tables(vec![table("public", "debug_dump", "app_owner")]);
        let baseline = SchemaBaseline {
            required_tables: vec!["public.orders".to_string()],
            forbidden_tables: vec!["public.debug_dump".to_string()],
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));

        assert_eq!(result.missing_objects.len(), 1);
        assert_eq!(result.missing_objects[0].name, "public.orders");
        assert_eq!(result.forbidden_objects.len(), 1);
        assert_eq!(result.forbidden_objects[0].name, "public.debug_dump");
    }

    #[test]
    fn all_passes_accumulate_in_one_run() {
        let schema = DatabaseSchema {
            database_name: "appdb".to_string(),
            owner: "postgres".to_string(),
            tables: vec![table("public", "orders", "test_user")],
            views: vec![ViewObject {
                schema: "public".to_string(),
                name: "order_totals".to_string(),
                owner: "app_owner".to_string(),
            }],
            roles: vec![RoleObject {
                name: "app_owner".to_string(),
                ..Default::default()
            }],
            extensions: vec![ExtensionObject {
                name: "pgcrypto".to_string(),
                version: "1.3".to_string(),
            }],
            ..Default::default()
        };
        let baseline = SchemaBaseline {
            expected_tables: Some(3),
            required_extensions: vec!["uuid-ossp".to_string()],
            forbidden_owners: vec!["test_user".to_string()],
            expected_database_owner: Some("dba".to_string()),
            ..Default::default()
        };
        let result = validate_schema(&schema, Some(&baseline));

        assert!(result.has_drift);
        assert_eq!(result.count_mismatches.len(), 1);
        assert_eq!(result.missing_objects.len(), 1);
        assert_eq!(result.ownership_violations.len(), 2);
    }
}
