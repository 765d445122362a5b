#![allow(dead_code)]

use cohort_core::auth::SessionIdentity;
use cohort_core::{AppConfig, AppState};
use uuid::Uuid;

pub async fn test_state(config: AppConfig) -> AppState {
    let pool = cohort_db::create_pool("sqlite::memory:", 1)
        .await
        .expect("pool");
    cohort_db::run_migrations(&pool).await.expect("migrations");
    AppState::new(pool, config)
}

pub fn fast_config() -> AppConfig {
    AppConfig {
        jwt_secret: "test-secret".into(),
        min_send_interval_ms: 0,
        ..AppConfig::default()
    }
}

/// Seed user `id` with profile `id + 1000` and return its session identity.
pub async fn seed_user(state: &AppState, id: i64) -> SessionIdentity {
    cohort_db::users::create_user(
        &state.db,
        id,
        &format!("user{id}@example.com"),
        &format!("User{id}"),
        "Test",
        None,
    )
    .await
    .expect("create user");
    cohort_db::profiles::create_profile(&state.db, id + 1000, id, "math")
        .await
        .expect("create profile");
    SessionIdentity {
        user_id: id,
        profile_id: id + 1000,
        firstname: format!("User{id}"),
        lastname: "Test".into(),
    }
}

pub async fn seed_group(state: &AppState, group_id: i64, members: &[&SessionIdentity]) {
    cohort_db::groups::create_group(&state.db, group_id, "Study", None, 5)
        .await
        .expect("create group");
    for member in members {
        cohort_db::members::add_member(&state.db, group_id, member.profile_id)
            .await
            .expect("add member");
    }
}

pub fn connect(state: &AppState, identity: &SessionIdentity) -> Uuid {
    let connection_id = Uuid::new_v4();
    state.rooms.register(connection_id, identity.user_id);
    connection_id
}
