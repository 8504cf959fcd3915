pub mod inspect;
pub mod validator;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Catalog snapshot of one database, as produced by introspection or loaded
/// from a snapshot file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSchema {
    pub database_name: String,
    pub owner: String,
    pub encoding: String,
    pub collation: String,
    pub roles: Vec<RoleObject>,
    pub tables: Vec<TableObject>,
    pub views: Vec<ViewObject>,
    pub sequences: Vec<SequenceObject>,
    pub functions: Vec<FunctionObject>,
    pub procedures: Vec<ProcedureObject>,
    pub extensions: Vec<ExtensionObject>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleObject {
    pub name: String,
    pub is_superuser: bool,
    pub can_login: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableObject {
    pub schema: String,
    pub name: String,
    pub owner: String,
}

impl TableObject {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewObject {
    pub schema: String,
    pub name: String,
    pub owner: String,
}

impl ViewObject {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceObject {
    pub schema: String,
    pub name: String,
    pub owner: String,
}

impl SequenceObject {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionObject {
    pub schema: String,
    pub name: String,
    pub owner: String,
    pub arguments: String,
}

impl FunctionObject {
    /// Signature-qualified name used for ownership findings and exception
    /// lookups: `public.refresh_totals(integer)`.
    pub fn signature(&self) -> String {
        format!("{}.{}({})", self.schema, self.name, self.arguments)
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcedureObject {
    pub schema: String,
    pub name: String,
    pub owner: String,
    pub arguments: String,
}

impl ProcedureObject {
    pub fn signature(&self) -> String {
        format!("{}.{}({})", self.schema, self.name, self.arguments)
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionObject {
    pub name: String,
    pub version: String,
}

/// What a schema is expected to contain. Every field is optional; an unset
/// field disables that check entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaBaseline {
    pub expected_tables: Option<i64>,
    pub expected_views: Option<i64>,
    pub expected_sequences: Option<i64>,
    pub expected_functions: Option<i64>,
    pub expected_procedures: Option<i64>,
    pub expected_roles: Option<i64>,
    pub expected_extensions: Option<i64>,

    pub required_tables: Vec<String>,
    pub required_views: Vec<String>,
    pub required_extensions: Vec<String>,
    pub required_functions: Vec<String>,
    pub required_procedures: Vec<String>,

    pub forbidden_tables: Vec<String>,

    pub expected_database_owner: Option<String>,
    pub expected_table_owner: Option<String>,
    pub expected_view_owner: Option<String>,
    pub expected_sequence_owner: Option<String>,
    pub expected_function_owner: Option<String>,
    pub expected_procedure_owner: Option<String>,

    pub allowed_owners: Vec<String>,
    pub forbidden_owners: Vec<String>,

    pub table_owner_exceptions: BTreeMap<String, String>,
    pub view_owner_exceptions: BTreeMap<String, String>,
    pub sequence_owner_exceptions: BTreeMap<String, String>,
    pub function_owner_exceptions: BTreeMap<String, String>,
    pub procedure_owner_exceptions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Database,
    Table,
    View,
    Sequence,
    Function,
    Procedure,
    Extension,
    Role,
}

impl ObjectKind {
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Database => "Databases",
            Self::Table => "Tables",
            Self::View => "Views",
            Self::Sequence => "Sequences",
            Self::Function => "Functions",
            Self::Procedure => "Procedures",
            Self::Extension => "Extensions",
            Self::Role => "Roles",
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Database => "Database",
            Self::Table => "Table",
            Self::View => "View",
            Self::Sequence => "Sequence",
            Self::Function => "Function",
            Self::Procedure => "Procedure",
            Self::Extension => "Extension",
            Self::Role => "Role",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    WrongOwner,
    ForbiddenOwner,
    DatabaseOwner,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaValidationResult {
    pub has_drift: bool,
    pub count_mismatches: Vec<CountMismatch>,
    pub missing_objects: Vec<MissingObject>,
    pub forbidden_objects: Vec<ForbiddenObject>,
    pub ownership_violations: Vec<OwnershipViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountMismatch {
    pub object_kind: ObjectKind,
    pub expected: i64,
    pub actual: i64,
}

impl CountMismatch {
    /// Signed deviation: expected 124, actual 126 reports +2.
    pub fn diff(&self) -> i64 {
        self.actual - self.expected
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissingObject {
    pub object_kind: ObjectKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForbiddenObject {
    pub object_kind: ObjectKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnershipViolation {
    pub object_kind: ObjectKind,
    pub object_name: String,
    pub actual_owner: String,
    pub expected_owner: String,
    pub kind: ViolationKind,
}
