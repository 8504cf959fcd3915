//! Catalog introspection.
//!
//! Connects to a PostgreSQL database and reads the catalogs into a
//! [`DatabaseSchema`] snapshot. Snapshots can also be loaded from a YAML or
//! JSON file so validation runs without touching the network.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio_postgres::NoTls;
use tracing::warn;

use crate::schema::{
    DatabaseSchema, ExtensionObject, FunctionObject, ProcedureObject, RoleObject, SequenceObject,
    TableObject, ViewObject,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSpec {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionSpec {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            database: String::new(),
            username: String::new(),
            password: String::new(),
            connect_timeout_secs: 10,
        }
    }
}

const SYSTEM_SCHEMAS: &str = "('pg_catalog', 'information_schema')";

pub async fn inspect_database(spec: &ConnectionSpec) -> Result<DatabaseSchema> {
    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&spec.host)
        .port(spec.port)
        .dbname(&spec.database)
        .user(&spec.username)
        .connect_timeout(Duration::from_secs(spec.connect_timeout_secs.max(1)));
    if !spec.password.is_empty() {
        pg_config.password(&spec.password);
    }

    let (client, connection) = pg_config
        .connect(NoTls)
        .await
        .with_context(|| format!("failed connecting to {}:{}", spec.host, spec.port))?;

    tokio::spawn(async move {
        if let Err(error) = connection.await {
            warn!("database connection closed with error: {error}");
        }
    });

    let mut schema = DatabaseSchema::default();

    let row = client
        .query_one(
            "SELECT d.datname, pg_get_userbyid(d.datdba), \
             pg_encoding_to_char(d.encoding), d.datcollate \
             FROM pg_database d WHERE d.datname = current_database()",
            &[],
        )
        .await
        .context("failed reading database metadata")?;
    schema.database_name = row.get(0);
    schema.owner = row.get(1);
    schema.encoding = row.get(2);
    schema.collation = row.get(3);

    for row in client
        .query(
            "SELECT rolname, rolsuper, rolcanlogin FROM pg_roles \
             WHERE rolname NOT LIKE 'pg\\_%' ORDER BY rolname",
            &[],
        )
        .await
        .context("failed listing roles")?
    {
        schema.roles.push(RoleObject {
            name: row.get(0),
            is_superuser: row.get(1),
            can_login: row.get(2),
        });
    }

    for row in client
        .query(
            &format!(
                "SELECT schemaname, tablename, tableowner FROM pg_tables \
                 WHERE schemaname NOT IN {SYSTEM_SCHEMAS} ORDER BY schemaname, tablename"
            ),
            &[],
        )
        .await
        .context("failed listing tables")?
    {
        schema.tables.push(TableObject {
            schema: row.get(0),
            name: row.get(1),
            owner: row.get(2),
        });
    }

    for row in client
        .query(
            &format!(
                "SELECT schemaname, viewname, viewowner FROM pg_views \
                 WHERE schemaname NOT IN {SYSTEM_SCHEMAS} ORDER BY schemaname, viewname"
            ),
            &[],
        )
        .await
        .context("failed listing views")?
    {
        schema.views.push(ViewObject {
            schema: row.get(0),
            name: row.get(1),
            owner: row.get(2),
        });
    }

    for row in client
        .query(
            &format!(
                "SELECT schemaname, sequencename, sequenceowner FROM pg_sequences \
                 WHERE schemaname NOT IN {SYSTEM_SCHEMAS} ORDER BY schemaname, sequencename"
            ),
            &[],
        )
        .await
        .context("failed listing sequences")?
    {
        schema.sequences.push(SequenceObject {
            schema: row.get(0),
            name: row.get(1),
            owner: row.get(2),
        });
    }

    for row in client
        .query(
            &format!(
                "SELECT n.nspname, p.proname, pg_get_userbyid(p.proowner), \
                 pg_get_function_identity_arguments(p.oid) \
                 FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace \
                 WHERE p.prokind = 'f' AND n.nspname NOT IN {SYSTEM_SCHEMAS} \
                 ORDER BY n.nspname, p.proname"
            ),
            &[],
        )
        .await
        .context("failed listing functions")?
    {
        schema.functions.push(FunctionObject {
            schema: row.get(0),
            name: row.get(1),
            owner: row.get(2),
            arguments: row.get(3),
        });
    }

    for row in client
        .query(
            &format!(
                "SELECT n.nspname, p.proname, pg_get_userbyid(p.proowner), \
                 pg_get_function_identity_arguments(p.oid) \
                 FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace \
                 WHERE p.prokind = 'p' AND n.nspname NOT IN {SYSTEM_SCHEMAS} \
                 ORDER BY n.nspname, p.proname"
            ),
            &[],
        )
        .await
        .context("failed listing procedures")?
    {
        schema.procedures.push(ProcedureObject {
            schema: row.get(0),
            name: row.get(1),
            owner: row.get(2),
            arguments: row.get(3),
        });
    }

    for row in client
        .query(
            "SELECT extname, extversion FROM pg_extension ORDER BY extname",
            &[],
        )
        .await
        .context("failed listing extensions")?
    {
        schema.extensions.push(ExtensionObject {
            name: row.get(0),
            version: row.get(1),
        });
    }

    Ok(schema)
}

/// Loads a schema snapshot from disk. The extension picks the format; YAML is
/// the default because baseline files are YAML too.
pub fn load_snapshot(path: &Path) -> Result<DatabaseSchema> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed reading snapshot: {}", path.display()))?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        serde_json::from_str(&data)
            .with_context(|| format!("failed parsing JSON snapshot: {}", path.display()))
    } else {
        serde_yaml::from_str(&data)
            .with_context(|| format!("failed parsing YAML snapshot: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_files_round_trip_from_yaml() {
        let doc = r#"
database_name: appdb
owner: app_owner
tables:
  - schema: public
    name: orders
    owner: app_owner
extensions:
  - name: pgcrypto
    version: "1.3"
"#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.yaml");
        fs::write(&path, doc).expect("write snapshot");

        let schema = load_snapshot(&path).expect("load snapshot");
        assert_eq!(schema.database_name, "appdb");
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].qualified_name(), "public.orders");
        assert_eq!(schema.extensions[0].name, "pgcrypto");
    }
}
