use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use diesel::{dsl::exists, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Device, NewScan, Scan};
use crate::schema::{devices, jobs, scans};
use crate::state::AppState;

use super::devices::{to_iso, DeviceResponse};

pub const SCAN_STATUS_OK: &str = "ok";
pub const SCAN_STATUS_UNKNOWN_DEVICE: &str = "unknown_device";

#[derive(Deserialize)]
pub struct RecordScanRequest {
    pub barcode: String,
    pub job_id: Option<Uuid>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub id: Uuid,
    pub barcode: String,
    pub device_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub status: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub scanned_at: String,
}

impl From<Scan> for ScanResponse {
    fn from(scan: Scan) -> Self {
        Self {
            id: scan.id,
            barcode: scan.barcode,
            device_id: scan.device_id,
            job_id: scan.job_id,
            status: scan.status,
            location: scan.location,
            notes: scan.notes,
            scanned_at: to_iso(scan.scanned_at),
        }
    }
}

#[derive(Serialize)]
pub struct RecordScanResponse {
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceResponse>,
    pub scan: ScanResponse,
}

/// Appends exactly one scan row per call. Unknown barcodes are still
/// recorded (with a synthesized note) so the ledger stays a complete audit
/// trail regardless of catalog drift; resolution only updates the device's
/// `last_scan`, never its status.
pub async fn record_scan(
    State(state): State<AppState>,
    Json(payload): Json<RecordScanRequest>,
) -> AppResult<(StatusCode, Json<RecordScanResponse>)> {
    let barcode = payload.barcode.trim();
    if barcode.is_empty() {
        return Err(AppError::invalid_input("barcode must not be empty"));
    }

    let mut conn = state.db()?;

    if let Some(job_id) = payload.job_id {
        let known: bool =
            diesel::select(exists(jobs::table.filter(jobs::id.eq(job_id)))).get_result(&mut conn)?;
        if !known {
            return Err(AppError::not_found());
        }
    }

    let location = payload.location.filter(|s| !s.trim().is_empty());
    let notes = payload.notes.filter(|s| !s.trim().is_empty());

    let (scan, device) = conn.transaction::<(Scan, Option<Device>), AppError, _>(|conn| {
        let device: Option<Device> = devices::table
            .filter(devices::barcode.eq(barcode))
            .first(conn)
            .optional()?;

        let (status, notes) = match &device {
            Some(_) => (SCAN_STATUS_OK, notes.clone()),
            None => (
                SCAN_STATUS_UNKNOWN_DEVICE,
                notes
                    .clone()
                    .or_else(|| Some(format!("no matching device for barcode {barcode}"))),
            ),
        };

        let device = if let Some(device) = device {
            let now = Utc::now().naive_utc();
            diesel::update(devices::table.find(device.id))
                .set(devices::last_scan.eq(now))
                .execute(conn)?;
            Some(devices::table.find(device.id).first::<Device>(conn)?)
        } else {
            None
        };

        let new_scan = NewScan {
            id: Uuid::new_v4(),
            barcode: barcode.to_string(),
            device_id: device.as_ref().map(|d| d.id),
            job_id: payload.job_id,
            status: status.to_string(),
            location: location.clone(),
            notes,
        };

        diesel::insert_into(scans::table)
            .values(&new_scan)
            .execute(conn)?;

        let scan: Scan = scans::table.find(new_scan.id).first(conn)?;
        Ok((scan, device))
    })?;

    let resolved = device.is_some();
    info!(%barcode, resolved, "scan recorded");

    Ok((
        StatusCode::CREATED,
        Json(RecordScanResponse {
            resolved,
            device: device.map(DeviceResponse::from),
            scan: ScanResponse::from(scan),
        }),
    ))
}
