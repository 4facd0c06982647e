use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use gcloud_gax::grpc::{Code, Status};
use gcloud_googleapis::spanner::admin::database::v1::{
    CreateDatabaseRequest, GetDatabaseDdlRequest, GetDatabaseRequest, UpdateDatabaseDdlRequest,
};
use gcloud_googleapis::spanner::admin::instance::v1::{
    CreateInstanceRequest, GetInstanceRequest, Instance,
};
use gcloud_spanner::admin::AdminClientConfig;
use gcloud_spanner::admin::client::Client as AdminClient;
use gcloud_spanner::client::{Client, ClientConfig};
use gcloud_spanner::mutation::insert_or_update;
use gcloud_spanner::statement::Statement;
use gcloud_spanner::value::CommitTimestamp;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::config::SpannerConfig;
use crate::models::Record;
use crate::store::RecordStore;

/// Record store backed by a single Spanner table
///
/// Each record is one row: `record_id` is the primary key and `data` holds
/// the serialized record, `record_id` included. `data` is a STRING column
/// because Spanner's JSON type reorders object keys.
#[derive(Clone)]
pub struct SpannerStore {
    inner: Arc<Client>,
    table: String,
}

impl SpannerStore {
    /// Connect to Spanner, provisioning the instance, database and table if missing.
    ///
    /// The gcloud-spanner library picks up `SPANNER_EMULATOR_HOST` from the
    /// environment and talks to the emulator when it is set.
    pub async fn from_config(config: &SpannerConfig, table: &str) -> Result<Self> {
        auto_provision(config, table).await?;

        let database_path = config.database_path();

        match &config.emulator_host {
            Some(host) => tracing::info!("Connecting to Spanner emulator at: {}", host),
            None => tracing::info!("Connecting to production Spanner"),
        }

        let client = Client::new(&database_path, ClientConfig::default())
            .await
            .context("Failed to create Spanner client")?;

        tracing::info!(
            "Successfully connected to Spanner database: {} (table '{}')",
            database_path,
            table
        );

        Ok(Self {
            inner: Arc::new(client),
            table: table.to_string(),
        })
    }

    #[cfg(test)]
    fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl RecordStore for SpannerStore {
    async fn get(&self, record_id: &str) -> Result<Option<Record>> {
        let mut statement = Statement::new(format!(
            "SELECT data FROM {} WHERE record_id = @record_id",
            self.table
        ));
        statement.add_param("record_id", &record_id.to_string());

        let mut tx = self
            .inner
            .single()
            .await
            .context("Failed to create read transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to query record from Spanner")?;

        let Some(row) = result_set.next().await? else {
            tracing::debug!("Record not found with id: {}", record_id);
            return Ok(None);
        };

        let data_str: String = row.column_by_name("data")?;
        let data: JsonValue =
            serde_json::from_str(&data_str).context("Failed to deserialize record JSON")?;
        let record = Record::from_value(data)?;

        if record.record_id() != Some(record_id) {
            bail!(
                "Row '{}' holds a record with mismatched id {:?}",
                record_id,
                record.record_id()
            );
        }

        tracing::debug!("Read record with id: {}", record_id);
        Ok(Some(record))
    }

    /// Writes the batch with one `apply` call. Spanner commits it as a unit,
    /// which is stronger than the per-item guarantee callers may rely on.
    async fn put_batch(&self, records: Vec<Record>) -> Result<()> {
        let count = records.len();
        let mut mutations = Vec::with_capacity(count);

        for record in &records {
            let record_id = record
                .record_id()
                .context("Cannot store a record without a string record_id")?
                .to_string();
            let data_str =
                serde_json::to_string(record.fields()).context("Failed to serialize record JSON")?;

            mutations.push(insert_or_update(
                &self.table,
                &["record_id", "data", "updated_at"],
                &[&record_id, &data_str, &CommitTimestamp::new()],
            ));
        }

        self.inner
            .apply(mutations)
            .await
            .context("Failed to write record batch to Spanner")?;

        tracing::debug!("Wrote {} records to table '{}'", count, self.table);
        Ok(())
    }
}

/// Automatically provision the Spanner instance, database, and records table
///
/// Enables zero-setup local development with the emulator.
async fn auto_provision(config: &SpannerConfig, table: &str) -> Result<()> {
    tracing::info!("Starting auto-provisioning checks...");

    let admin_client = AdminClient::new(AdminClientConfig::default())
        .await
        .context("Failed to create Spanner admin client")?;

    let project_path = format!("projects/{}", config.project);
    let instance_path = format!("{}/instances/{}", project_path, config.instance);
    let database_path = config.database_path();

    ensure_instance_exists(&admin_client, config, &project_path, &instance_path).await?;
    ensure_database_exists(&admin_client, &instance_path, &database_path).await?;
    ensure_table_exists(&admin_client, &database_path, table).await?;

    tracing::info!("Auto-provisioning complete");
    Ok(())
}

/// Look up an admin resource and run `create` only when the lookup reports NotFound
///
/// `create` is a lazy future, so it is never polled when the resource exists.
async fn ensure_resource<L, C>(kind: &str, path: &str, lookup: L, create: C) -> Result<()>
where
    L: Future<Output = std::result::Result<(), Status>>,
    C: Future<Output = Result<()>>,
{
    match lookup.await {
        Ok(()) => {
            tracing::info!("{} already exists: {}", kind, path);
            Ok(())
        }
        Err(status) if status.code() == Code::NotFound => {
            tracing::info!("{} not found, creating: {}", kind, path);
            create.await?;
            tracing::info!("{} created successfully: {}", kind, path);
            Ok(())
        }
        Err(e) => bail!(
            "Failed to check {} existence: {}",
            kind.to_lowercase(),
            e.message()
        ),
    }
}

async fn ensure_instance_exists(
    admin_client: &AdminClient,
    config: &SpannerConfig,
    project_path: &str,
    instance_path: &str,
) -> Result<()> {
    let lookup = async {
        let request = GetInstanceRequest {
            name: instance_path.to_string(),
            field_mask: None,
        };
        admin_client.instance().get_instance(request, None).await.map(|_| ())
    };

    ensure_resource(
        "Instance",
        instance_path,
        lookup,
        create_instance(admin_client, config, project_path, instance_path),
    )
    .await
}

async fn create_instance(
    admin_client: &AdminClient,
    config: &SpannerConfig,
    project_path: &str,
    instance_path: &str,
) -> Result<()> {
    let instance_config = match config.emulator_host {
        Some(_) => format!("{}/instanceConfigs/emulator-config", project_path),
        None => format!("{}/instanceConfigs/regional-us-central1", project_path),
    };

    let request = CreateInstanceRequest {
        parent: project_path.to_string(),
        instance_id: config.instance.clone(),
        instance: Some(Instance {
            name: instance_path.to_string(),
            config: instance_config,
            display_name: format!("{} instance", config.instance),
            node_count: 1,
            ..Default::default()
        }),
    };

    admin_client
        .instance()
        .create_instance(request, None)
        .await
        .context("Failed to start instance creation")?
        .wait(None)
        .await
        .context("Failed to create instance")?;
    Ok(())
}

async fn ensure_database_exists(
    admin_client: &AdminClient,
    instance_path: &str,
    database_path: &str,
) -> Result<()> {
    let lookup = async {
        let request = GetDatabaseRequest {
            name: database_path.to_string(),
        };
        admin_client.database().get_database(request, None).await.map(|_| ())
    };

    ensure_resource(
        "Database",
        database_path,
        lookup,
        create_database(admin_client, instance_path, database_path),
    )
    .await
}

async fn create_database(
    admin_client: &AdminClient,
    instance_path: &str,
    database_path: &str,
) -> Result<()> {
    let database_id = database_path
        .rsplit('/')
        .next()
        .context("Invalid database path")?;

    let request = CreateDatabaseRequest {
        parent: instance_path.to_string(),
        create_statement: format!("CREATE DATABASE `{}`", database_id),
        extra_statements: vec![],
        encryption_config: None,
        database_dialect: 1, // Google Standard SQL
        proto_descriptors: vec![],
    };

    admin_client
        .database()
        .create_database(request, None)
        .await
        .context("Failed to start database creation")?
        .wait(None)
        .await
        .context("Failed to create database")?;
    Ok(())
}

/// DDL for the records table
fn records_table_ddl(table: &str) -> String {
    format!(
        r#"
CREATE TABLE {table} (
    record_id STRING(MAX) NOT NULL,
    data STRING(MAX) NOT NULL,
    updated_at TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
) PRIMARY KEY (record_id)
"#
    )
    .trim()
    .to_string()
}

/// Whether any DDL statement creates `table`; Spanner identifiers are case-insensitive
fn ddl_declares_table(statements: &[String], table: &str) -> bool {
    statements.iter().any(|stmt| {
        stmt.trim_start()
            .strip_prefix("CREATE TABLE ")
            .map(|rest| {
                rest.split(|c: char| c.is_whitespace() || c == '(')
                    .next()
                    .unwrap_or_default()
                    .trim_matches('`')
                    .eq_ignore_ascii_case(table)
            })
            .unwrap_or(false)
    })
}

async fn ensure_table_exists(
    admin_client: &AdminClient,
    database_path: &str,
    table: &str,
) -> Result<()> {
    let get_ddl_request = GetDatabaseDdlRequest {
        database: database_path.to_string(),
    };

    let ddl_response = admin_client
        .database()
        .get_database_ddl(get_ddl_request, None)
        .await
        .context("Failed to get database DDL")?;

    if ddl_declares_table(&ddl_response.into_inner().statements, table) {
        tracing::info!("Table '{}' already exists", table);
        return Ok(());
    }

    tracing::info!("Table '{}' not found, creating...", table);

    let update_request = UpdateDatabaseDdlRequest {
        database: database_path.to_string(),
        statements: vec![records_table_ddl(table)],
        operation_id: String::new(),
        proto_descriptors: vec![],
        throughput_mode: false,
    };

    let mut operation = admin_client
        .database()
        .update_database_ddl(update_request, None)
        .await
        .context("Failed to start table creation")?;

    operation
        .wait(None)
        .await
        .context("Failed to create table")?;

    tracing::info!("Table '{}' created successfully", table);
    Ok(())
}
