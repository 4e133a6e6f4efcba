use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use diesel::{dsl::exists, prelude::*, result::DatabaseErrorKind, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Customer, Device, Job, JobDevice, JobStatus, NewJob, NewJobDevice, Product};
use crate::pricing::effective_price;
use crate::schema::{customers, devices, job_devices, job_statuses, jobs, products};
use crate::state::AppState;

use super::devices::to_iso;

const DEFAULT_JOB_STATUS: &str = "open";

#[derive(Deserialize)]
pub struct JobListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub customer_id: Option<Uuid>,
    pub status_id: Option<i32>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct UpdateJobRequest {
    pub customer_id: Option<Uuid>,
    pub status_id: Option<i32>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = jobs)]
struct JobChangeset<'a> {
    customer_id: Option<Uuid>,
    status_id: Option<i32>,
    description: Option<&'a str>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub job_code: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub status_id: i32,
    pub status: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub device_count: i64,
    pub total_price: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct AssignmentResponse {
    pub device_id: Uuid,
    pub device_name: String,
    pub barcode: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub device_status: String,
    pub product_name: Option<String>,
    pub item_cost_per_day: Option<f64>,
    pub custom_price: Option<f64>,
    pub effective_price: f64,
    pub assigned_at: String,
}

#[derive(Serialize)]
pub struct JobDetailResponse {
    #[serde(flatten)]
    pub job: JobSummary,
    pub devices: Vec<AssignmentResponse>,
}

#[derive(Deserialize)]
pub struct AddDeviceRequest {
    pub device_id: Uuid,
    pub custom_price: Option<f64>,
}

#[derive(Deserialize)]
pub struct BulkAddRequest {
    pub devices: Vec<AddDeviceRequest>,
}

#[derive(Serialize)]
pub struct BulkAddFailure {
    pub device_id: Uuid,
    pub reason: String,
}

#[derive(Serialize)]
pub struct BulkAddResponse {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkAddFailure>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<Json<Vec<JobSummary>>> {
    let mut conn = state.db()?;

    let mut query = jobs::table
        .inner_join(customers::table)
        .inner_join(job_statuses::table)
        .select((
            jobs::all_columns,
            customers::all_columns,
            job_statuses::all_columns,
        ))
        .into_boxed();

    if let Some(status) = params
        .status
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        query = query.filter(job_statuses::name.eq(status.to_owned()));
    }

    let mut rows: Vec<(Job, Customer, JobStatus)> = query
        .order((jobs::start_date.desc(), jobs::created_at.desc()))
        .load(&mut conn)?;

    if let Some(search) = params
        .search
        .as_ref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
    {
        rows.retain(|(_, customer, _)| {
            customer_display_name(customer).to_lowercase().contains(&search)
        });
    }

    let job_ids: Vec<Uuid> = rows.iter().map(|(job, _, _)| job.id).collect();
    let totals = load_assignment_totals(&mut conn, &job_ids)?;

    let response = rows
        .into_iter()
        .map(|(job, customer, status)| {
            let (device_count, total_price) = totals.get(&job.id).copied().unwrap_or((0, 0.0));
            to_job_summary(job, &customer, &status, device_count, total_price)
        })
        .collect();

    Ok(Json(response))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<JobDetailResponse>> {
    let mut conn = state.db()?;

    let job: Job = jobs::table.find(job_id).first(&mut conn)?;
    let customer: Customer = customers::table.find(job.customer_id).first(&mut conn)?;
    let status: JobStatus = job_statuses::table.find(job.status_id).first(&mut conn)?;

    let assignments = load_assignments(&mut conn, job_id)?;
    let device_count = assignments.len() as i64;
    let total_price = assignments.iter().map(|row| row.effective_price).sum();

    Ok(Json(JobDetailResponse {
        job: to_job_summary(job, &customer, &status, device_count, total_price),
        devices: assignments,
    }))
}

pub async fn create_job(
    State(state): State<AppState>,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<JobSummary>)> {
    let Some(customer_id) = payload.customer_id else {
        return Err(AppError::invalid_input("customer_id is required"));
    };

    let mut conn = state.db()?;

    let job = conn.transaction::<Job, AppError, _>(|conn| {
        let customer_known: bool = diesel::select(exists(
            customers::table.filter(customers::id.eq(customer_id)),
        ))
        .get_result(conn)?;
        if !customer_known {
            return Err(AppError::invalid_input("customer does not exist"));
        }

        let status_id = match payload.status_id {
            Some(status_id) => {
                let known: bool = diesel::select(exists(
                    job_statuses::table.filter(job_statuses::id.eq(status_id)),
                ))
                .get_result(conn)?;
                if !known {
                    return Err(AppError::invalid_input("status does not exist"));
                }
                status_id
            }
            None => {
                let default: JobStatus = job_statuses::table
                    .filter(job_statuses::name.eq(DEFAULT_JOB_STATUS))
                    .first(conn)?;
                default.id
            }
        };

        let today = Utc::now().date_naive();
        let start_date = payload.start_date.unwrap_or(today);
        let end_date = payload.end_date.unwrap_or(today);
        let job_code = next_job_code(conn, today)?;

        let new_job = NewJob {
            id: Uuid::new_v4(),
            job_code,
            customer_id,
            status_id,
            description: payload.description.clone().filter(|s| !s.trim().is_empty()),
            start_date,
            end_date,
        };

        match diesel::insert_into(jobs::table)
            .values(&new_job)
            .execute(conn)
        {
            Ok(_) => {}
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                return Err(AppError::conflict("job code already taken"));
            }
            Err(err) => return Err(AppError::from(err)),
        }

        Ok(jobs::table.find(new_job.id).first(conn)?)
    })?;

    let customer: Customer = customers::table.find(job.customer_id).first(&mut conn)?;
    let status: JobStatus = job_statuses::table.find(job.status_id).first(&mut conn)?;

    info!(job_id = %job.id, job_code = %job.job_code, "job created");

    Ok((
        StatusCode::CREATED,
        Json(to_job_summary(job, &customer, &status, 0, 0.0)),
    ))
}

/// Applies only the supplied fields; everything else stays untouched.
pub async fn update_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> AppResult<Json<JobSummary>> {
    let mut conn = state.db()?;

    let existing: Job = jobs::table.find(job_id).first(&mut conn)?;

    if let Some(customer_id) = payload.customer_id {
        let known: bool = diesel::select(exists(
            customers::table.filter(customers::id.eq(customer_id)),
        ))
        .get_result(&mut conn)?;
        if !known {
            return Err(AppError::invalid_input("customer does not exist"));
        }
    }
    if let Some(status_id) = payload.status_id {
        let known: bool = diesel::select(exists(
            job_statuses::table.filter(job_statuses::id.eq(status_id)),
        ))
        .get_result(&mut conn)?;
        if !known {
            return Err(AppError::invalid_input("status does not exist"));
        }
    }

    let changeset = JobChangeset {
        customer_id: payload.customer_id,
        status_id: payload.status_id,
        description: payload.description.as_deref(),
        start_date: payload.start_date,
        end_date: payload.end_date,
    };

    let has_changes = payload.customer_id.is_some()
        || payload.status_id.is_some()
        || payload.description.is_some()
        || payload.start_date.is_some()
        || payload.end_date.is_some();

    let job = if has_changes {
        let now = Utc::now().naive_utc();
        diesel::update(jobs::table.find(job_id))
            .set((&changeset, jobs::updated_at.eq(now)))
            .execute(&mut conn)?;
        jobs::table.find(job_id).first(&mut conn)?
    } else {
        existing
    };

    let customer: Customer = customers::table.find(job.customer_id).first(&mut conn)?;
    let status: JobStatus = job_statuses::table.find(job.status_id).first(&mut conn)?;
    let totals = load_assignment_totals(&mut conn, &[job.id])?;
    let (device_count, total_price) = totals.get(&job.id).copied().unwrap_or((0, 0.0));

    Ok(Json(to_job_summary(
        job,
        &customer,
        &status,
        device_count,
        total_price,
    )))
}

/// Removes the job and its assignment rows in one transaction; either both
/// disappear or neither does.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;

    conn.transaction::<(), AppError, _>(|conn| {
        let known: bool =
            diesel::select(exists(jobs::table.filter(jobs::id.eq(job_id)))).get_result(conn)?;
        if !known {
            return Err(AppError::not_found());
        }

        let assigned_devices: Vec<Uuid> = job_devices::table
            .filter(job_devices::job_id.eq(job_id))
            .select(job_devices::device_id)
            .load(conn)?;

        diesel::delete(job_devices::table.filter(job_devices::job_id.eq(job_id))).execute(conn)?;
        diesel::delete(jobs::table.find(job_id)).execute(conn)?;
        release_devices(conn, &assigned_devices)?;
        Ok(())
    })?;

    info!(%job_id, "job deleted with its assignments");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_device(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<AddDeviceRequest>,
) -> AppResult<(StatusCode, Json<AssignmentResponse>)> {
    let mut conn = state.db()?;

    let response = conn.transaction::<AssignmentResponse, AppError, _>(|conn| {
        attach_device(
            conn,
            job_id,
            payload.device_id,
            payload.custom_price,
            user.user_id,
        )
    })?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn remove_device(
    State(state): State<AppState>,
    Path((job_id, device_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;

    conn.transaction::<(), AppError, _>(|conn| {
        let deleted = diesel::delete(
            job_devices::table
                .filter(job_devices::job_id.eq(job_id))
                .filter(job_devices::device_id.eq(device_id)),
        )
        .execute(conn)?;
        if deleted == 0 {
            return Err(AppError::not_found());
        }

        release_devices(conn, &[device_id])?;
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Best-effort batch: every entry is attempted in its own transaction and
/// failures are reported per entry instead of aborting the rest.
pub async fn bulk_add_devices(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<BulkAddRequest>,
) -> AppResult<Json<BulkAddResponse>> {
    if payload.devices.is_empty() {
        return Err(AppError::invalid_input("devices must not be empty"));
    }

    let mut conn = state.db()?;

    let job_known: bool =
        diesel::select(exists(jobs::table.filter(jobs::id.eq(job_id)))).get_result(&mut conn)?;
    if !job_known {
        return Err(AppError::not_found());
    }

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for entry in payload.devices {
        let attempt = conn.transaction::<AssignmentResponse, AppError, _>(|conn| {
            attach_device(conn, job_id, entry.device_id, entry.custom_price, user.user_id)
        });
        match attempt {
            Ok(_) => succeeded.push(entry.device_id),
            Err(err) => failed.push(BulkAddFailure {
                device_id: entry.device_id,
                reason: err.kind().as_str().to_string(),
            }),
        }
    }

    Ok(Json(BulkAddResponse { succeeded, failed }))
}

/// Inserts one assignment row. The duplicate pre-check is an optimization;
/// the composite primary key is the authoritative guard, so a concurrent
/// insert still surfaces as a conflict. The product's daily rate is
/// captured as `price_snapshot` at this instant.
fn attach_device(
    conn: &mut PgConnection,
    job_id: Uuid,
    device_id: Uuid,
    custom_price: Option<f64>,
    user_id: Uuid,
) -> Result<AssignmentResponse, AppError> {
    let job_known: bool =
        diesel::select(exists(jobs::table.filter(jobs::id.eq(job_id)))).get_result(conn)?;
    if !job_known {
        return Err(AppError::not_found());
    }

    let device: Option<Device> = devices::table.find(device_id).first(conn).optional()?;
    let Some(device) = device else {
        return Err(AppError::not_found());
    };

    let duplicate: Option<JobDevice> = job_devices::table
        .find((job_id, device_id))
        .first(conn)
        .optional()?;
    if duplicate.is_some() {
        return Err(AppError::conflict("device already assigned to this job"));
    }

    let product: Option<Product> = match device.product_id {
        Some(product_id) => products::table.find(product_id).first(conn).optional()?,
        None => None,
    };
    let price_snapshot = product.as_ref().map(|p| p.item_cost_per_day);

    let new_assignment = NewJobDevice {
        job_id,
        device_id,
        custom_price,
        price_snapshot,
        assigned_by: Some(user_id),
    };

    match diesel::insert_into(job_devices::table)
        .values(&new_assignment)
        .execute(conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("device already assigned to this job"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    // Availability is driven by assignment, not by scanning.
    let now = Utc::now().naive_utc();
    diesel::update(devices::table.find(device_id))
        .set((devices::status.eq("in_use"), devices::updated_at.eq(now)))
        .execute(conn)?;

    let assignment: JobDevice = job_devices::table.find((job_id, device_id)).first(conn)?;
    let device: Device = devices::table.find(device_id).first(conn)?;

    Ok(to_assignment_response(assignment, device, product.as_ref()))
}

/// Sets devices back to `available` unless they are still assigned to
/// another job. Manually-set `maintenance` is left alone.
fn release_devices(conn: &mut PgConnection, device_ids: &[Uuid]) -> Result<(), AppError> {
    if device_ids.is_empty() {
        return Ok(());
    }

    let still_assigned: Vec<Uuid> = job_devices::table
        .filter(job_devices::device_id.eq_any(device_ids))
        .select(job_devices::device_id)
        .load(conn)?;

    let releasable: Vec<Uuid> = device_ids
        .iter()
        .copied()
        .filter(|id| !still_assigned.contains(id))
        .collect();
    if releasable.is_empty() {
        return Ok(());
    }

    let now = Utc::now().naive_utc();
    diesel::update(
        devices::table
            .filter(devices::id.eq_any(&releasable))
            .filter(devices::status.eq("in_use")),
    )
    .set((devices::status.eq("available"), devices::updated_at.eq(now)))
    .execute(conn)?;
    Ok(())
}

fn load_assignments(
    conn: &mut PgConnection,
    job_id: Uuid,
) -> AppResult<Vec<AssignmentResponse>> {
    let rows: Vec<(JobDevice, Device)> = job_devices::table
        .inner_join(devices::table)
        .filter(job_devices::job_id.eq(job_id))
        .order(job_devices::assigned_at.asc())
        .select((job_devices::all_columns, devices::all_columns))
        .load(conn)?;

    let mut product_ids: Vec<Uuid> = rows
        .iter()
        .filter_map(|(_, device)| device.product_id)
        .collect();
    product_ids.sort();
    product_ids.dedup();

    let product_list: Vec<Product> = products::table
        .filter(products::id.eq_any(&product_ids))
        .load(conn)?;
    let product_map: HashMap<Uuid, Product> =
        product_list.into_iter().map(|p| (p.id, p)).collect();

    Ok(rows
        .into_iter()
        .map(|(assignment, device)| {
            let product = device.product_id.and_then(|id| product_map.get(&id));
            to_assignment_response(assignment, device, product)
        })
        .collect())
}

pub(crate) fn load_assignment_totals(
    conn: &mut PgConnection,
    job_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, (i64, f64)>> {
    if job_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, Option<f64>, Option<f64>)> = job_devices::table
        .filter(job_devices::job_id.eq_any(job_ids))
        .select((
            job_devices::job_id,
            job_devices::custom_price,
            job_devices::price_snapshot,
        ))
        .load(conn)?;

    let mut totals: HashMap<Uuid, (i64, f64)> = HashMap::new();
    for (job_id, custom_price, price_snapshot) in rows {
        let entry = totals.entry(job_id).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += effective_price(custom_price, price_snapshot);
    }
    Ok(totals)
}

fn to_assignment_response(
    assignment: JobDevice,
    device: Device,
    product: Option<&Product>,
) -> AssignmentResponse {
    AssignmentResponse {
        device_id: device.id,
        device_name: device.name,
        barcode: device.barcode,
        device_type: device.device_type,
        device_status: device.status,
        product_name: product.map(|p| p.name.clone()),
        item_cost_per_day: product.map(|p| p.item_cost_per_day),
        custom_price: assignment.custom_price,
        effective_price: effective_price(assignment.custom_price, assignment.price_snapshot),
        assigned_at: to_iso(assignment.assigned_at),
    }
}

pub(crate) fn to_job_summary(
    job: Job,
    customer: &Customer,
    status: &JobStatus,
    device_count: i64,
    total_price: f64,
) -> JobSummary {
    JobSummary {
        id: job.id,
        job_code: job.job_code,
        customer_id: job.customer_id,
        customer_name: customer_display_name(customer),
        status_id: status.id,
        status: status.name.clone(),
        description: job.description,
        start_date: job.start_date.to_string(),
        end_date: job.end_date.to_string(),
        device_count,
        total_price,
        created_at: to_iso(job.created_at),
        updated_at: to_iso(job.updated_at),
    }
}

/// Company name wins; otherwise "lastname, firstname" with empty parts
/// elided.
pub(crate) fn customer_display_name(customer: &Customer) -> String {
    if let Some(company) = customer
        .company_name
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        return company.to_string();
    }

    let parts: Vec<&str> = [customer.last_name.as_deref(), customer.first_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    parts.join(", ")
}

fn next_job_code(
    conn: &mut PgConnection,
    date: NaiveDate,
) -> Result<String, diesel::result::Error> {
    let prefix = format!("JOB{}", date.format("%Y%m%d"));
    let existing: i64 = jobs::table
        .filter(jobs::job_code.like(format!("{prefix}%")))
        .count()
        .get_result(conn)?;
    Ok(job_code_for(&prefix, existing + 1))
}

fn job_code_for(prefix: &str, sequence: i64) -> String {
    format!("{prefix}{sequence:03}")
}
