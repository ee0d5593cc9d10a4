//! Metrics definitions for the registry crate.

use shared::metrics_defs::{MetricDef, MetricType};

pub const QUERY_FAILURE: MetricDef = MetricDef {
    name: "registry.query.failure",
    metric_type: MetricType::Counter,
    description: "Number of registry endpoint queries that failed outright",
};

pub const RESOLVE_FOUND: MetricDef = MetricDef {
    name: "registry.resolve.found",
    metric_type: MetricType::Counter,
    description: "Number of resolutions that found a matching instance",
};

pub const RESOLVE_NOT_FOUND: MetricDef = MetricDef {
    name: "registry.resolve.not_found",
    metric_type: MetricType::Counter,
    description: "Number of resolutions confirmed absent by an answering endpoint",
};

pub const RESOLVE_UNAVAILABLE: MetricDef = MetricDef {
    name: "registry.resolve.unavailable",
    metric_type: MetricType::Counter,
    description: "Number of resolutions where no endpoint answered",
};

pub const ALL_METRICS: &[MetricDef] = &[
    QUERY_FAILURE,
    RESOLVE_FOUND,
    RESOLVE_NOT_FOUND,
    RESOLVE_UNAVAILABLE,
];
