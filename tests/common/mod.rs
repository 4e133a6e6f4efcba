use std::env;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use rigtrack::auth::credentials::DbCredentialStore;
use rigtrack::auth::jwt::JwtService;
use rigtrack::auth::password::hash_password;
use rigtrack::config::AppConfig;
use rigtrack::db::{self, PgPool};
use rigtrack::models::{NewCustomer, NewDevice, NewJob, NewProduct, NewUser};
use rigtrack::routes;
use rigtrack::state::AppState;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = test_config(database_url);

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let credentials = Arc::new(DbCredentialStore::new(pool.clone()));
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, credentials, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self { state, router })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    pub async fn insert_user(&self, username: &str, password: &str, role: &str) -> Result<Uuid> {
        let username = username.to_string();
        let password = password.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let user = NewUser {
                id: Uuid::new_v4(),
                username,
                password_hash: hash_password(&password)?,
                role,
            };
            diesel::insert_into(rigtrack::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn insert_customer(
        &self,
        company_name: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Uuid> {
        let customer = NewCustomer {
            id: Uuid::new_v4(),
            company_name: company_name.map(str::to_string),
            first_name: first_name.map(str::to_string),
            last_name: last_name.map(str::to_string),
        };
        let id = customer.id;
        self.with_conn(move |conn| {
            diesel::insert_into(rigtrack::schema::customers::table)
                .values(&customer)
                .execute(conn)
                .context("failed to insert customer")?;
            Ok(id)
        })
        .await
    }

    pub async fn insert_product(&self, name: &str, item_cost_per_day: f64) -> Result<Uuid> {
        let product = NewProduct {
            id: Uuid::new_v4(),
            name: name.to_string(),
            item_cost_per_day,
        };
        let id = product.id;
        self.with_conn(move |conn| {
            diesel::insert_into(rigtrack::schema::products::table)
                .values(&product)
                .execute(conn)
                .context("failed to insert product")?;
            Ok(id)
        })
        .await
    }

    pub async fn insert_device(
        &self,
        name: &str,
        barcode: &str,
        product_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let device = NewDevice {
            id: Uuid::new_v4(),
            name: name.to_string(),
            barcode: barcode.to_string(),
            device_type: None,
            status: "available".to_string(),
            location: None,
            product_id,
        };
        let id = device.id;
        self.with_conn(move |conn| {
            diesel::insert_into(rigtrack::schema::devices::table)
                .values(&device)
                .execute(conn)
                .context("failed to insert device")?;
            Ok(id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_job(
        &self,
        job_code: &str,
        customer_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Uuid> {
        let status_id: i32 = self
            .with_conn(|conn| {
                use rigtrack::schema::job_statuses::dsl::*;
                job_statuses
                    .filter(name.eq("open"))
                    .select(id)
                    .first(conn)
                    .context("failed to look up default status")
            })
            .await?;

        let job = NewJob {
            id: Uuid::new_v4(),
            job_code: job_code.to_string(),
            customer_id,
            status_id,
            description: None,
            start_date,
            end_date,
        };
        let id = job.id;
        self.with_conn(move |conn| {
            diesel::insert_into(rigtrack::schema::jobs::table)
                .values(&job)
                .execute(conn)
                .context("failed to insert job")?;
            Ok(id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn count_scans(&self) -> Result<i64> {
        self.with_conn(|conn| {
            use diesel::dsl::count_star;
            rigtrack::schema::scans::table
                .select(count_star())
                .first(conn)
                .context("failed to count scans")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn count_job_devices(&self, job_id: Uuid) -> Result<i64> {
        self.with_conn(move |conn| {
            use diesel::dsl::count_star;
            rigtrack::schema::job_devices::table
                .filter(rigtrack::schema::job_devices::job_id.eq(job_id))
                .select(count_star())
                .first(conn)
                .context("failed to count job devices")
        })
        .await
    }

    pub async fn login_token(&self, username: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/auth/login",
                &LoginPayload { username, password },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok(parsed.access_token)
    }

    /// Issues a token directly with the given TTL, bypassing login. Used to
    /// exercise expiry handling.
    #[allow(dead_code)]
    pub fn issue_token_with_ttl(
        &self,
        user_id: Uuid,
        username: &str,
        role: &str,
        ttl_minutes: i64,
    ) -> Result<String> {
        let mut config = (*self.state.config).clone();
        config.jwt_expiry_minutes = ttl_minutes;
        let jwt = JwtService::from_config(&config)?;
        jwt.issue(user_id, username, role)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(Method::PATCH)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        jwt_secret: "test-secret".to_string(),
        jwt_issuer: "test-issuer".to_string(),
        jwt_audience: "test-audience".to_string(),
        jwt_expiry_minutes: 60,
        cors_allowed_origin: None,
    }
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE scans, job_devices, jobs, devices, products, customers, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
