//! Creates an API user with an argon2-hashed password.
//!
//! Usage: `cargo run --bin create_user -- <username> <password> [role]`

use diesel::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use rigtrack::{auth::password::hash_password, config::AppConfig, db, models::NewUser, schema::users};

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(username), Some(password)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: create_user <username> <password> [role]");
    };
    let role = args.next().unwrap_or_else(|| "user".to_string());

    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get()?;

    let user = NewUser {
        id: Uuid::new_v4(),
        username: username.clone(),
        password_hash: hash_password(&password)?,
        role,
    };

    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)?;

    tracing::info!(%username, user_id = %user.id, "user created");
    Ok(())
}
