use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::{prelude::*, result::DatabaseErrorKind};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Device, NewDevice};
use crate::schema::{devices, products};
use crate::state::AppState;

pub const DEVICE_STATUSES: &[&str] = &["available", "in_use", "maintenance"];

const SEARCH_RESULT_CAP: i64 = 20;

pub(crate) fn is_valid_device_status(status: &str) -> bool {
    DEVICE_STATUSES.iter().any(|allowed| *allowed == status)
}

#[derive(Deserialize)]
pub struct DeviceListQuery {
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
pub struct DeviceSearchQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateDeviceRequest {
    pub name: String,
    pub barcode: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub product_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct DeviceResponse {
    pub id: Uuid,
    pub name: String,
    pub barcode: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub status: String,
    pub location: Option<String>,
    pub product_id: Option<Uuid>,
    pub last_scan: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            name: device.name,
            barcode: device.barcode,
            device_type: device.device_type,
            status: device.status,
            location: device.location,
            product_id: device.product_id,
            last_scan: device.last_scan.map(to_iso),
            active: device.active,
            created_at: to_iso(device.created_at),
            updated_at: to_iso(device.updated_at),
        }
    }
}

pub async fn list_devices(
    State(state): State<AppState>,
    Query(params): Query<DeviceListQuery>,
) -> AppResult<Json<Vec<DeviceResponse>>> {
    let mut conn = state.db()?;

    let mut query = devices::table.into_boxed();

    if !params.include_inactive {
        query = query.filter(devices::active.eq(true));
    }
    if let Some(device_type) = params
        .device_type
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        query = query.filter(devices::device_type.eq(device_type.to_owned()));
    }
    if let Some(status) = params
        .status
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        query = query.filter(devices::status.eq(status.to_owned()));
    }

    query = query.order(devices::name.asc());

    if let Some(limit) = params.limit {
        query = query.limit(limit.max(0));
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset.max(0));
    }

    let rows: Vec<Device> = query.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(DeviceResponse::from).collect()))
}

pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
) -> AppResult<Json<DeviceResponse>> {
    let mut conn = state.db()?;
    let device: Device = devices::table.find(device_id).first(&mut conn)?;
    Ok(Json(DeviceResponse::from(device)))
}

pub async fn create_device(
    State(state): State<AppState>,
    Json(payload): Json<CreateDeviceRequest>,
) -> AppResult<(StatusCode, Json<DeviceResponse>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::invalid_input("name must not be empty"));
    }
    let barcode = payload.barcode.trim();
    if barcode.is_empty() {
        return Err(AppError::invalid_input("barcode must not be empty"));
    }

    let status = payload
        .status
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("available");
    if !is_valid_device_status(status) {
        return Err(AppError::invalid_input(format!(
            "invalid device status '{status}'. Allowed statuses: {}",
            DEVICE_STATUSES.join(", ")
        )));
    }

    let mut conn = state.db()?;

    if let Some(product_id) = payload.product_id {
        let known: bool = diesel::select(diesel::dsl::exists(
            products::table.filter(products::id.eq(product_id)),
        ))
        .get_result(&mut conn)?;
        if !known {
            return Err(AppError::invalid_input("product does not exist"));
        }
    }

    let new_device = NewDevice {
        id: Uuid::new_v4(),
        name: name.to_string(),
        barcode: barcode.to_string(),
        device_type: payload.device_type.filter(|s| !s.trim().is_empty()),
        status: status.to_string(),
        location: payload.location.filter(|s| !s.trim().is_empty()),
        product_id: payload.product_id,
    };

    match diesel::insert_into(devices::table)
        .values(&new_device)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("barcode already registered"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let device: Device = devices::table.find(new_device.id).first(&mut conn)?;
    info!(device_id = %device.id, barcode = %device.barcode, "device created");
    Ok((StatusCode::CREATED, Json(DeviceResponse::from(device))))
}

/// Substring search over name, barcode, type and location. An empty query
/// returns an empty list rather than the whole catalog.
pub async fn search_devices(
    State(state): State<AppState>,
    Query(params): Query<DeviceSearchQuery>,
) -> AppResult<Json<Vec<DeviceResponse>>> {
    let Some(trimmed) = params
        .q
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    else {
        return Ok(Json(Vec::new()));
    };

    let mut conn = state.db()?;
    let pattern = format!("%{trimmed}%");

    let rows: Vec<Device> = devices::table
        .filter(
            devices::name
                .ilike(pattern.clone())
                .or(devices::barcode.ilike(pattern.clone()))
                .or(devices::device_type.ilike(pattern.clone()))
                .or(devices::location.ilike(pattern)),
        )
        .order(devices::name.asc())
        .limit(SEARCH_RESULT_CAP)
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(DeviceResponse::from).collect()))
}

/// Resolves a barcode to its device without recording a scan. Barcode
/// matching is a case-sensitive exact match.
pub async fn verify_barcode(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> AppResult<Json<DeviceResponse>> {
    let mut conn = state.db()?;
    let device: Device = devices::table
        .filter(devices::barcode.eq(&barcode))
        .first(&mut conn)?;
    Ok(Json(DeviceResponse::from(device)))
}

/// Devices are never physically deleted; scan history references them.
/// Deactivation hides a device from default listings.
pub async fn deactivate_device(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let updated = diesel::update(devices::table.find(device_id))
        .set((devices::active.eq(false), devices::updated_at.eq(now)))
        .execute(&mut conn)?;
    if updated == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
