//! Engine-side Prometheus metrics. Registered on the default registry so the server's `/metrics`
//! endpoint picks them up with a plain `gather()`.
use std::sync::LazyLock;

use prometheus::{
    register_histogram_vec,
    register_int_counter,
    register_int_counter_vec,
    HistogramVec,
    IntCounter,
    IntCounterVec,
};

pub static ORDERS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("orders_created_total", "Total number of orders created")
        .expect("orders_created_total registration")
});

pub static ORDERS_OUT_OF_STOCK: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("orders_out_of_stock_total", "Total number of orders rejected for insufficient stock")
        .expect("orders_out_of_stock_total registration")
});

pub static JOBS_CREATED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("jobs_created_total", "Total number of jobs created", &["type"])
        .expect("jobs_created_total registration")
});

pub static JOBS_COMPLETED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "jobs_completed_total",
        "Total number of jobs that finished, by outcome",
        &["type", "status"]
    )
    .expect("jobs_completed_total registration")
});

pub static JOB_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "job_duration_seconds",
        "Duration of job processing in seconds",
        &["type"],
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]
    )
    .expect("job_duration_seconds registration")
});
