use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::{dsl::count_star, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Customer, Device, Job, JobStatus, Scan};
use crate::schema::{customers, devices, job_statuses, jobs, scans};
use crate::state::AppState;

use super::devices::to_iso;
use super::jobs::{customer_display_name, load_assignment_totals, to_job_summary, JobSummary};

const TOP_DEVICES: usize = 10;
const TOP_CUSTOMERS: usize = 10;
const RECENT_JOBS: i64 = 10;
const TRAILING_SCAN_DAYS: u64 = 7;

#[derive(Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Serialize)]
pub struct DayCount {
    pub date: String,
    pub count: i64,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub job_status_counts: Vec<StatusCount>,
    pub device_status_counts: Vec<StatusCount>,
    pub recent_jobs: Vec<JobSummary>,
    pub scans_per_day: Vec<DayCount>,
    pub generated_at: String,
}

#[derive(Deserialize)]
pub struct RangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Serialize)]
pub struct DeviceUsageRow {
    pub device_id: Uuid,
    pub device_name: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub status: String,
    pub scan_count: i64,
    pub last_scan: String,
}

#[derive(Serialize)]
pub struct DeviceUsageResponse {
    pub start_date: String,
    pub end_date: String,
    pub total_scans: i64,
    pub devices: Vec<DeviceUsageRow>,
    pub device_status_counts: Vec<StatusCount>,
}

#[derive(Serialize)]
pub struct JobReportRow {
    pub id: Uuid,
    pub job_code: String,
    pub customer_name: String,
    pub status: String,
    pub start_date: String,
    pub end_date: String,
    pub duration_days: i64,
    pub device_count: i64,
    pub total_price: f64,
}

#[derive(Serialize)]
pub struct CustomerCount {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub job_count: i64,
}

#[derive(Serialize)]
pub struct JobReportResponse {
    pub start_date: String,
    pub end_date: String,
    pub job_count: usize,
    pub average_duration_days: f64,
    pub average_device_count: f64,
    pub status_counts: Vec<StatusCount>,
    pub top_customers: Vec<CustomerCount>,
    pub jobs: Vec<JobReportRow>,
}

#[derive(Deserialize)]
pub struct DailyQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct DailyScanRow {
    pub id: Uuid,
    pub barcode: String,
    pub device_id: Option<Uuid>,
    pub device_name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub job_id: Option<Uuid>,
    pub status: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub scanned_at: String,
}

#[derive(Serialize)]
pub struct DailyReportResponse {
    pub date: String,
    pub job_count: usize,
    pub scan_count: usize,
    pub jobs: Vec<JobSummary>,
    pub scans: Vec<DailyScanRow>,
}

pub async fn summary(State(state): State<AppState>) -> AppResult<Json<SummaryResponse>> {
    let mut conn = state.db()?;

    let job_rows: Vec<(String, i64)> = jobs::table
        .inner_join(job_statuses::table)
        .group_by(job_statuses::name)
        .select((job_statuses::name, count_star()))
        .load(&mut conn)?;

    let device_rows: Vec<(String, i64)> = devices::table
        .group_by(devices::status)
        .select((devices::status, count_star()))
        .load(&mut conn)?;

    let recent_rows: Vec<(Job, Customer, JobStatus)> = jobs::table
        .inner_join(customers::table)
        .inner_join(job_statuses::table)
        .order(jobs::created_at.desc())
        .limit(RECENT_JOBS)
        .select((
            jobs::all_columns,
            customers::all_columns,
            job_statuses::all_columns,
        ))
        .load(&mut conn)?;

    let job_ids: Vec<Uuid> = recent_rows.iter().map(|(job, _, _)| job.id).collect();
    let totals = load_assignment_totals(&mut conn, &job_ids)?;
    let recent_jobs = recent_rows
        .into_iter()
        .map(|(job, customer, status)| {
            let (device_count, total_price) = totals.get(&job.id).copied().unwrap_or((0, 0.0));
            to_job_summary(job, &customer, &status, device_count, total_price)
        })
        .collect();

    let today = Utc::now().date_naive();
    let window_start = today
        .checked_sub_days(Days::new(TRAILING_SCAN_DAYS - 1))
        .unwrap_or(today);
    let scan_times: Vec<NaiveDateTime> = scans::table
        .filter(scans::scanned_at.ge(window_start.and_time(NaiveTime::MIN)))
        .select(scans::scanned_at)
        .load(&mut conn)?;

    let mut per_day: HashMap<NaiveDate, i64> = HashMap::new();
    for ts in scan_times {
        *per_day.entry(ts.date()).or_insert(0) += 1;
    }
    let scans_per_day = (0..TRAILING_SCAN_DAYS)
        .filter_map(|offset| window_start.checked_add_days(Days::new(offset)))
        .map(|date| DayCount {
            count: per_day.get(&date).copied().unwrap_or(0),
            date: date.to_string(),
        })
        .collect();

    Ok(Json(SummaryResponse {
        job_status_counts: to_status_counts(job_rows),
        device_status_counts: to_status_counts(device_rows),
        recent_jobs,
        scans_per_day,
        generated_at: to_iso(Utc::now().naive_utc()),
    }))
}

pub async fn device_usage(
    State(state): State<AppState>,
    Query(params): Query<RangeQuery>,
) -> AppResult<Json<DeviceUsageResponse>> {
    let mut conn = state.db()?;

    let (range_start, _) = day_bounds(params.start_date);
    let (_, range_end) = day_bounds(params.end_date);

    let rows: Vec<(Option<Uuid>, NaiveDateTime)> = scans::table
        .filter(scans::scanned_at.ge(range_start))
        .filter(scans::scanned_at.lt(range_end))
        .select((scans::device_id, scans::scanned_at))
        .load(&mut conn)?;

    let total_scans = rows.len() as i64;

    let mut usage: HashMap<Uuid, (i64, NaiveDateTime)> = HashMap::new();
    for (device_id, scanned_at) in rows.into_iter().filter_map(|(id, ts)| id.map(|id| (id, ts))) {
        let entry = usage.entry(device_id).or_insert((0, scanned_at));
        entry.0 += 1;
        if scanned_at > entry.1 {
            entry.1 = scanned_at;
        }
    }

    let device_ids: Vec<Uuid> = usage.keys().copied().collect();
    let device_list: Vec<Device> = devices::table
        .filter(devices::id.eq_any(&device_ids))
        .load(&mut conn)?;
    let device_map: HashMap<Uuid, Device> =
        device_list.into_iter().map(|d| (d.id, d)).collect();

    let mut usage_rows: Vec<DeviceUsageRow> = usage
        .into_iter()
        .filter_map(|(device_id, (scan_count, last_scan))| {
            device_map.get(&device_id).map(|device| DeviceUsageRow {
                device_id,
                device_name: device.name.clone(),
                device_type: device.device_type.clone(),
                status: device.status.clone(),
                scan_count,
                last_scan: to_iso(last_scan),
            })
        })
        .collect();
    usage_rows.sort_by(|a, b| {
        b.scan_count
            .cmp(&a.scan_count)
            .then_with(|| a.device_name.cmp(&b.device_name))
    });
    usage_rows.truncate(TOP_DEVICES);

    let device_rows: Vec<(String, i64)> = devices::table
        .group_by(devices::status)
        .select((devices::status, count_star()))
        .load(&mut conn)?;

    Ok(Json(DeviceUsageResponse {
        start_date: params.start_date.to_string(),
        end_date: params.end_date.to_string(),
        total_scans,
        devices: usage_rows,
        device_status_counts: to_status_counts(device_rows),
    }))
}

pub async fn job_report(
    State(state): State<AppState>,
    Query(params): Query<RangeQuery>,
) -> AppResult<Json<JobReportResponse>> {
    let mut conn = state.db()?;

    let rows: Vec<(Job, Customer, JobStatus)> = jobs::table
        .inner_join(customers::table)
        .inner_join(job_statuses::table)
        .filter(jobs::start_date.ge(params.start_date))
        .filter(jobs::start_date.le(params.end_date))
        .order(jobs::start_date.desc())
        .select((
            jobs::all_columns,
            customers::all_columns,
            job_statuses::all_columns,
        ))
        .load(&mut conn)?;

    let job_ids: Vec<Uuid> = rows.iter().map(|(job, _, _)| job.id).collect();
    let totals = load_assignment_totals(&mut conn, &job_ids)?;

    let mut status_histogram: HashMap<String, i64> = HashMap::new();
    let mut customer_histogram: HashMap<Uuid, (String, i64)> = HashMap::new();
    let mut duration_sum = 0i64;
    let mut device_sum = 0i64;

    let job_rows: Vec<JobReportRow> = rows
        .iter()
        .map(|(job, customer, status)| {
            let (device_count, total_price) = totals.get(&job.id).copied().unwrap_or((0, 0.0));
            let duration_days = (job.end_date - job.start_date).num_days();

            *status_histogram.entry(status.name.clone()).or_insert(0) += 1;
            customer_histogram
                .entry(customer.id)
                .or_insert_with(|| (customer_display_name(customer), 0))
                .1 += 1;
            duration_sum += duration_days;
            device_sum += device_count;

            JobReportRow {
                id: job.id,
                job_code: job.job_code.clone(),
                customer_name: customer_display_name(customer),
                status: status.name.clone(),
                start_date: job.start_date.to_string(),
                end_date: job.end_date.to_string(),
                duration_days,
                device_count,
                total_price,
            }
        })
        .collect();

    let job_count = job_rows.len();
    let (average_duration_days, average_device_count) = if job_count == 0 {
        (0.0, 0.0)
    } else {
        (
            duration_sum as f64 / job_count as f64,
            device_sum as f64 / job_count as f64,
        )
    };

    let mut status_counts: Vec<StatusCount> = status_histogram
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();
    status_counts.sort_by(|a, b| a.status.cmp(&b.status));

    let mut top_customers: Vec<CustomerCount> = customer_histogram
        .into_iter()
        .map(|(customer_id, (customer_name, job_count))| CustomerCount {
            customer_id,
            customer_name,
            job_count,
        })
        .collect();
    top_customers.sort_by(|a, b| {
        b.job_count
            .cmp(&a.job_count)
            .then_with(|| a.customer_name.cmp(&b.customer_name))
    });
    top_customers.truncate(TOP_CUSTOMERS);

    Ok(Json(JobReportResponse {
        start_date: params.start_date.to_string(),
        end_date: params.end_date.to_string(),
        job_count,
        average_duration_days,
        average_device_count,
        status_counts,
        top_customers,
        jobs: job_rows,
    }))
}

pub async fn daily_report(
    State(state): State<AppState>,
    Query(params): Query<DailyQuery>,
) -> AppResult<Json<DailyReportResponse>> {
    let mut conn = state.db()?;

    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let (day_start, day_end) = day_bounds(date);

    let job_rows: Vec<(Job, Customer, JobStatus)> = jobs::table
        .inner_join(customers::table)
        .inner_join(job_statuses::table)
        .filter(jobs::created_at.ge(day_start))
        .filter(jobs::created_at.lt(day_end))
        .order(jobs::created_at.desc())
        .select((
            jobs::all_columns,
            customers::all_columns,
            job_statuses::all_columns,
        ))
        .load(&mut conn)?;

    let job_ids: Vec<Uuid> = job_rows.iter().map(|(job, _, _)| job.id).collect();
    let totals = load_assignment_totals(&mut conn, &job_ids)?;
    let job_summaries: Vec<JobSummary> = job_rows
        .into_iter()
        .map(|(job, customer, status)| {
            let (device_count, total_price) = totals.get(&job.id).copied().unwrap_or((0, 0.0));
            to_job_summary(job, &customer, &status, device_count, total_price)
        })
        .collect();

    let scan_rows: Vec<Scan> = scans::table
        .filter(scans::scanned_at.ge(day_start))
        .filter(scans::scanned_at.lt(day_end))
        .order(scans::scanned_at.desc())
        .load(&mut conn)?;

    let mut device_ids: Vec<Uuid> = scan_rows.iter().filter_map(|scan| scan.device_id).collect();
    device_ids.sort();
    device_ids.dedup();
    let device_list: Vec<Device> = devices::table
        .filter(devices::id.eq_any(&device_ids))
        .load(&mut conn)?;
    let device_map: HashMap<Uuid, Device> =
        device_list.into_iter().map(|d| (d.id, d)).collect();

    let scans_out: Vec<DailyScanRow> = scan_rows
        .into_iter()
        .map(|scan| {
            let device = scan.device_id.and_then(|id| device_map.get(&id));
            DailyScanRow {
                id: scan.id,
                barcode: scan.barcode,
                device_id: scan.device_id,
                device_name: device.map(|d| d.name.clone()),
                device_type: device.and_then(|d| d.device_type.clone()),
                job_id: scan.job_id,
                status: scan.status,
                location: scan.location,
                notes: scan.notes,
                scanned_at: to_iso(scan.scanned_at),
            }
        })
        .collect();

    Ok(Json(DailyReportResponse {
        date: date.to_string(),
        job_count: job_summaries.len(),
        scan_count: scans_out.len(),
        jobs: job_summaries,
        scans: scans_out,
    }))
}

fn to_status_counts(rows: Vec<(String, i64)>) -> Vec<StatusCount> {
    let mut counts: Vec<StatusCount> = rows
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();
    counts.sort_by(|a, b| a.status.cmp(&b.status));
    counts
}

fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    let end = date
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX)
        .and_time(NaiveTime::MIN);
    (start, end)
}
