//! Metrics definitions for the admission crate.

use shared::metrics_defs::{MetricDef, MetricType};

pub const ADMISSION_ALLOWED: MetricDef = MetricDef {
    name: "admission.allowed",
    metric_type: MetricType::Counter,
    description: "Number of requests admitted by the rate limiter",
};

pub const ADMISSION_REJECTED: MetricDef = MetricDef {
    name: "admission.rejected",
    metric_type: MetricType::Counter,
    description: "Number of requests rejected by the rate limiter",
};

pub const ALL_METRICS: &[MetricDef] = &[ADMISSION_ALLOWED, ADMISSION_REJECTED];
