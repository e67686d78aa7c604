//! `indykite_application_space` resource.
//!
//! Creating an application space provisions its identity knowledge graph
//! (IKG). Create only returns once the IKG reports
//! [`IKG_STATUS_ACTIVE`], polling on a [`WaitSchedule`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{
    changed, computed_id_attribute, create_time_attribute, default_true,
    deletion_protection_attribute, description_attribute, display_name_attribute,
    ensure_deletable, name_attribute, parent_id_attribute, parse_state, to_state,
    update_time_attribute, Resource,
};
use crate::client::{ConfigClient, ReadTarget};
use crate::error::ProviderError;
use crate::generated::config::{
    ApplicationSpace, CreateApplicationSpaceRequest, DbConnection, UpdateApplicationSpaceRequest,
};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::validation::Validator;

/// Resource type name.
pub const RESOURCE_TYPE: &str = "indykite_application_space";

/// IKG status of a ready application space.
pub const IKG_STATUS_ACTIVE: &str = "APP_SPACE_IKG_STATUS_STATUS_ACTIVE";

/// Regions an application space can be created in.
pub const REGIONS: &[&str] = &["europe-west1", "us-east1"];

/// Regions a replica IKG can be placed in.
pub const REPLICA_REGIONS: &[&str] = &["europe-west1", "us-east1", "us-west1"];

/// Supported IKG sizes.
pub const IKG_SIZES: &[&str] = &[
    "2GB", "4GB", "8GB", "16GB", "32GB", "64GB", "128GB", "192GB", "256GB", "384GB", "512GB",
];

const DEFAULT_IKG_SIZE: &str = "2GB";

/// Delays between IKG status checks after a create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSchedule {
    /// Delays before the first checks, in order.
    pub initial: Vec<Duration>,
    /// Delay between checks once `initial` is exhausted.
    pub interval: Duration,
    /// Give up once the next check would start after this much time.
    pub max_wait: Duration,
}

impl Default for WaitSchedule {
    fn default() -> Self {
        Self {
            initial: vec![
                Duration::ZERO,
                Duration::from_secs(10),
                Duration::from_secs(60),
                Duration::from_secs(120),
            ],
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(20 * 60),
        }
    }
}

impl WaitSchedule {
    /// Delay before check number `attempt`, counting from zero.
    pub fn delay(&self, attempt: usize) -> Duration {
        self.initial.get(attempt).copied().unwrap_or(self.interval)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct DbConnectionState {
    url: String,
    username: String,
    password: String,
    name: String,
}

impl From<DbConnectionState> for DbConnection {
    fn from(state: DbConnectionState) -> Self {
        Self {
            url: state.url,
            username: state.username,
            password: state.password,
            name: state.name,
        }
    }
}

impl From<DbConnection> for DbConnectionState {
    fn from(conn: DbConnection) -> Self {
        Self {
            url: conn.url,
            username: conn.username,
            password: conn.password,
            name: conn.name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ApplicationSpaceState {
    id: String,
    customer_id: String,
    name: String,
    display_name: String,
    description: String,
    region: String,
    ikg_size: String,
    replica_region: String,
    ikg_status: String,
    db_connection: Vec<DbConnectionState>,
    create_time: String,
    update_time: String,
    #[serde(default = "default_true")]
    deletion_protection: bool,
}

impl ApplicationSpaceState {
    fn from_api(space: ApplicationSpace, deletion_protection: bool) -> Self {
        Self {
            id: space.id,
            customer_id: space.customer_id,
            name: space.name,
            display_name: space.display_name,
            description: space.description,
            region: space.region,
            ikg_size: space.ikg_size,
            replica_region: space.replica_region,
            ikg_status: space.ikg_status,
            db_connection: space.db_connection.map(Into::into).into_iter().collect(),
            create_time: space.create_time,
            update_time: space.update_time,
            deletion_protection,
        }
    }

    fn db_connection(&self) -> Option<DbConnection> {
        self.db_connection.first().cloned().map(Into::into)
    }
}

/// Application spaces of a customer.
#[derive(Debug, Clone, Default)]
pub struct ApplicationSpaceResource {
    schedule: WaitSchedule,
}

impl ApplicationSpaceResource {
    /// Create the resource with the default IKG wait schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom IKG wait schedule.
    pub fn with_schedule(schedule: WaitSchedule) -> Self {
        Self { schedule }
    }

    async fn fetch(
        &self,
        client: &dyn ConfigClient,
        target: ReadTarget,
        deletion_protection: bool,
    ) -> Result<ApplicationSpaceState, ProviderError> {
        let space = client.read_application_space(target).await?;
        Ok(ApplicationSpaceState::from_api(space, deletion_protection))
    }

    async fn wait_for_active(
        &self,
        client: &dyn ConfigClient,
        id: &str,
        deletion_protection: bool,
    ) -> Result<ApplicationSpaceState, ProviderError> {
        let deadline = Instant::now() + self.schedule.max_wait;

        for attempt in 0.. {
            let wait = self.schedule.delay(attempt);
            if Instant::now() + wait > deadline {
                break;
            }
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            match self
                .fetch(client, ReadTarget::id(id), deletion_protection)
                .await
            {
                Ok(state) if state.ikg_status == IKG_STATUS_ACTIVE => {
                    debug!(id = %id, attempt, "IKG is active");
                    return Ok(state);
                },
                Ok(state) => {
                    debug!(id = %id, attempt, status = %state.ikg_status, "IKG not active yet");
                },
                Err(e) => {
                    warn!(id = %id, attempt, error = %e, "Failed to read IKG status, retrying");
                },
            }
        }

        Err(ProviderError::DeadlineExceeded(
            "timed out waiting for IKG status to become active".to_string(),
        ))
    }
}

#[async_trait]
impl Resource for ApplicationSpaceResource {
    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        let db_connection = Block::new()
            .with_attribute(
                "url",
                Attribute::required_string().with_description("Connection URL of the database."),
            )
            .with_attribute(
                "username",
                Attribute::required_string().with_description("Database user."),
            )
            .with_attribute(
                "password",
                Attribute::required_string()
                    .sensitive()
                    .with_description("Password of the database user."),
            )
            .with_attribute(
                "name",
                Attribute::optional_string().with_description("Name of the database."),
            );

        Schema::v0()
            .with_description("Application space is a workspace of a customer with its own identity knowledge graph.")
            .with_attribute("id", computed_id_attribute("Identifier of the application space."))
            .with_attribute(
                "customer_id",
                parent_id_attribute("Identifier of the customer owning the application space."),
            )
            .with_attribute("name", name_attribute())
            .with_attribute("display_name", display_name_attribute())
            .with_attribute("description", description_attribute())
            .with_attribute(
                "region",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::one_of(REGIONS.iter().copied()))
                    .with_description("Region where the application space is located. Valid values are: europe-west1, us-east1."),
            )
            .with_attribute(
                "ikg_size",
                Attribute::optional_string()
                    .with_force_new()
                    .with_default(Value::String(DEFAULT_IKG_SIZE.to_string()))
                    .with_validator(Validator::one_of(IKG_SIZES.iter().copied()))
                    .with_description("IKG size that will be allocated, which corresponds also to number of CPU nodes (default 2GB)."),
            )
            .with_attribute(
                "replica_region",
                Attribute::optional_string()
                    .with_force_new()
                    .with_validator(Validator::one_of(REPLICA_REGIONS.iter().copied()))
                    .with_description("Replica region specifies where the replica IKG is created. Replica must be a different region than the master, but also on the same geographical continent."),
            )
            .with_attribute(
                "ikg_status",
                Attribute::computed_string().with_description("Status of the identity knowledge graph."),
            )
            .with_attribute("create_time", create_time_attribute())
            .with_attribute("update_time", update_time_attribute())
            .with_attribute("deletion_protection", deletion_protection_attribute())
            .with_block(
                "db_connection",
                NestedBlock::list(db_connection).with_max_items(1),
            )
    }

    async fn create(
        &self,
        client: &dyn ConfigClient,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let planned: ApplicationSpaceState = parse_state(planned)?;
        let created = client
            .create_application_space(CreateApplicationSpaceRequest {
                db_connection: planned.db_connection(),
                organization_id: planned.customer_id.clone(),
                name: planned.name.clone(),
                display_name: planned.display_name.clone(),
                description: planned.description.clone(),
                region: planned.region.clone(),
                ikg_size: planned.ikg_size.clone(),
                replica_region: planned.replica_region.clone(),
            })
            .await?;
        info!(id = %created.id, name = %planned.name, "Application space created, waiting for IKG");

        let state = self
            .wait_for_active(client, &created.id, planned.deletion_protection)
            .await?;
        to_state(&state)
    }

    async fn read(&self, client: &dyn ConfigClient, state: Value) -> Result<Value, ProviderError> {
        let state: ApplicationSpaceState = parse_state(state)?;
        let state = self
            .fetch(
                client,
                ReadTarget::from_state_id(&state.id),
                state.deletion_protection,
            )
            .await?;
        to_state(&state)
    }

    async fn update(
        &self,
        client: &dyn ConfigClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: ApplicationSpaceState = parse_state(prior)?;
        let planned: ApplicationSpaceState = parse_state(planned)?;

        let mut unchanged = planned.clone();
        unchanged.deletion_protection = prior.deletion_protection;
        if unchanged == prior {
            debug!(id = %prior.id, "Only deletion_protection changed, skipping API call");
            return to_state(&planned);
        }

        let db_connection = if prior.db_connection != planned.db_connection {
            planned.db_connection()
        } else {
            None
        };
        client
            .update_application_space(
                &prior.id,
                UpdateApplicationSpaceRequest {
                    display_name: changed(&prior.display_name, &planned.display_name),
                    description: changed(&prior.description, &planned.description),
                    db_connection,
                },
            )
            .await?;

        let state = self
            .fetch(client, ReadTarget::id(prior.id), planned.deletion_protection)
            .await?;
        to_state(&state)
    }

    async fn delete(&self, client: &dyn ConfigClient, state: Value) -> Result<(), ProviderError> {
        let state: ApplicationSpaceState = parse_state(state)?;
        ensure_deletable(state.deletion_protection)?;
        client.delete_application_space(&state.id).await?;
        info!(id = %state.id, "Application space deleted");
        Ok(())
    }
}
