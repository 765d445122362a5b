pub mod auth;
pub mod connections;
pub mod error;
pub mod events;
pub mod history;
pub mod membership;
pub mod message;
pub mod presence;
pub mod receipts;
pub mod rooms;
pub mod throttle;

use cohort_db::DbPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Worker id baked into snowflakes minted by this process.
pub const SNOWFLAKE_WORKER_ID: u16 = 1;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub event_bus: events::EventBus,
    pub config: AppConfig,
    /// Group -> users with at least one connection joined to the room.
    pub presence: Arc<presence::PresenceTracker>,
    /// Connection <-> room subscriptions.
    pub rooms: Arc<rooms::RoomRegistry>,
    pub throttle: Arc<throttle::SendThrottle>,
    pub connections: Arc<connections::ConnectionLimiter>,
    pub shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig) -> Self {
        let event_bus = events::EventBus::new(config.event_bus_capacity);
        let presence = Arc::new(presence::PresenceTracker::new(event_bus.clone()));
        let rooms = Arc::new(rooms::RoomRegistry::new(presence.clone()));
        let throttle = Arc::new(throttle::SendThrottle::new(Duration::from_millis(
            config.min_send_interval_ms,
        )));
        let connections = Arc::new(connections::ConnectionLimiter::new(
            config.max_connections,
            config.max_connections_per_user,
        ));
        Self {
            db,
            event_bus,
            config,
            presence,
            rooms,
            throttle,
            connections,
            shutdown: Arc::new(Notify::new()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub jwt_expiry_seconds: u64,
    /// Minimum gap between two accepted sends of the same user.
    pub min_send_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub event_bus_capacity: usize,
    pub max_connections: usize,
    pub max_connections_per_user: usize,
    pub history_default_limit: i64,
    pub history_max_limit: i64,
    /// Messages returned in the join ack. 0 disables join-time history.
    pub join_history_limit: i64,
    pub max_message_length: usize,
    pub max_attachments: usize,
    pub throttle_prune_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_expiry_seconds: 7 * 24 * 3600,
            min_send_interval_ms: 1000,
            heartbeat_interval_ms: 41_250,
            heartbeat_timeout_ms: 90_000,
            event_bus_capacity: 4096,
            max_connections: 2_000,
            max_connections_per_user: 5,
            history_default_limit: cohort_util::pagination::DEFAULT_HISTORY_LIMIT,
            history_max_limit: cohort_util::pagination::MAX_HISTORY_LIMIT,
            join_history_limit: 50,
            max_message_length: 4000,
            max_attachments: 10,
            throttle_prune_interval_secs: 60,
        }
    }
}

/// Drop stale throttle entries until shutdown is signalled.
pub async fn run_throttle_pruner(state: AppState) {
    let period = Duration::from_secs(state.config.throttle_prune_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = state.throttle.prune();
                if removed > 0 {
                    tracing::debug!(removed, "pruned send throttle entries");
                }
            }
            _ = state.shutdown.notified() => break,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use cohort_db::DbPool;

    pub async fn migrated_pool() -> DbPool {
        let pool = cohort_db::create_pool("sqlite::memory:", 1)
            .await
            .expect("pool");
        cohort_db::run_migrations(&pool).await.expect("migrations");
        pool
    }

    /// Seed user `id`, optionally with profile `id + 1000`.
    pub async fn seed_user(pool: &DbPool, id: i64, with_profile: bool) {
        cohort_db::users::create_user(
            pool,
            id,
            &format!("user{id}@example.com"),
            &format!("User{id}"),
            "Test",
            None,
        )
        .await
        .expect("create user");
        if with_profile {
            cohort_db::profiles::create_profile(pool, id + 1000, id, "math")
                .await
                .expect("create profile");
        }
    }
}
