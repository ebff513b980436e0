//! Bootstrap accounts created once at start (and by `--seed-only`).

use tracing::info;

use crate::config::SeedConfig;
use crate::db::Storage;
use crate::db::users::NewUser;
use crate::error::TrackerError;
use crate::service::password::hash_password;
use crate::types::{ApprovalStatus, Role};

/// Ensure an approved admin and authority account exist. An account is
/// created only when no user of that role exists yet and the configured
/// username is free; running it again changes nothing. Returns the
/// usernames created by this call.
pub async fn seed_defaults(
    storage: &Storage,
    cfg: &SeedConfig,
) -> Result<Vec<String>, TrackerError> {
    let accounts = [
        (
            Role::Admin,
            &cfg.admin_username,
            &cfg.admin_password,
            &cfg.admin_email,
            "System Administrator",
        ),
        (
            Role::Authority,
            &cfg.authority_username,
            &cfg.authority_password,
            &cfg.authority_email,
            "Transport Authority",
        ),
    ];
    let mut created = Vec::new();
    for (role, username, password, email, full_name) in accounts {
        if storage.count_users_with_roles(&[role]).await? > 0 {
            continue;
        }
        if storage.find_user_by_username(username).await?.is_some() {
            info!(%username, %role, "seed username already taken by another role, skipping");
            continue;
        }
        storage
            .create_user(NewUser {
                username: username.clone(),
                password_hash: hash_password(password)?,
                full_name: full_name.to_string(),
                email: Some(email.clone()),
                phone: None,
                role,
                university_id: None,
                employee_id: None,
                approval_status: ApprovalStatus::Approved,
                is_active: true,
            })
            .await?;
        info!(%username, %role, "seeded default account");
        created.push(username.clone());
    }
    Ok(created)
}
