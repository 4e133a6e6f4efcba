//! Effective-price resolution for job/device assignments.
//!
//! An assignment carries an optional explicit override (`custom_price`) and
//! the product's daily rate captured when the device was attached
//! (`price_snapshot`). The override always wins; a device with neither
//! bills at zero. Every surface that reports money (job detail, job
//! listing, reports) resolves through this one function.

pub fn effective_price(custom_price: Option<f64>, price_snapshot: Option<f64>) -> f64 {
    custom_price.or(price_snapshot).unwrap_or(0.0)
}
