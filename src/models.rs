use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = customers)]
pub struct Customer {
    pub id: Uuid,
    pub company_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = customers)]
pub struct NewCustomer {
    pub id: Uuid,
    pub company_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = products)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub item_cost_per_day: f64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = products)]
pub struct NewProduct {
    pub id: Uuid,
    pub name: String,
    pub item_cost_per_day: f64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = devices)]
#[diesel(belongs_to(Product, foreign_key = product_id))]
pub struct Device {
    pub id: Uuid,
    pub name: String,
    pub barcode: String,
    pub device_type: Option<String>,
    pub status: String,
    pub location: Option<String>,
    pub product_id: Option<Uuid>,
    pub last_scan: Option<NaiveDateTime>,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = devices)]
pub struct NewDevice {
    pub id: Uuid,
    pub name: String,
    pub barcode: String,
    pub device_type: Option<String>,
    pub status: String,
    pub location: Option<String>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = job_statuses)]
pub struct JobStatus {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = jobs)]
#[diesel(belongs_to(Customer, foreign_key = customer_id))]
pub struct Job {
    pub id: Uuid,
    pub job_code: String,
    pub customer_id: Uuid,
    pub status_id: i32,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_code: String,
    pub customer_id: Uuid,
    pub status_id: i32,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = job_devices)]
#[diesel(belongs_to(Job))]
#[diesel(belongs_to(Device))]
#[diesel(primary_key(job_id, device_id))]
pub struct JobDevice {
    pub job_id: Uuid,
    pub device_id: Uuid,
    pub custom_price: Option<f64>,
    pub price_snapshot: Option<f64>,
    pub assigned_at: NaiveDateTime,
    pub assigned_by: Option<Uuid>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_devices)]
pub struct NewJobDevice {
    pub job_id: Uuid,
    pub device_id: Uuid,
    pub custom_price: Option<f64>,
    pub price_snapshot: Option<f64>,
    pub assigned_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = scans)]
pub struct Scan {
    pub id: Uuid,
    pub barcode: String,
    pub device_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub status: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub scanned_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = scans)]
pub struct NewScan {
    pub id: Uuid,
    pub barcode: String,
    pub device_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub status: String,
    pub location: Option<String>,
    pub notes: Option<String>,
}
