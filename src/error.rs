use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum FetchError {
    #[display("price request needs at least one asset id")]
    EmptyRequest,
    #[display("request to {source_name} failed")]
    Request { source_name: String },
    #[display("request to {source_name} timed out")]
    Timeout { source_name: String },
    #[display("{source_name} answered with HTTP {status}")]
    Status { source_name: String, status: u16 },
    #[display("failed to parse response from {source_name}")]
    ResponseParse { source_name: String },
}

/// Percentage change is undefined against a zero baseline.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChangeError {
    #[display("old price is zero, percentage change is undefined")]
    DivideByZero,
    #[display("percentage change is not a finite number")]
    NonFinite,
}

#[derive(Debug, Display, Error)]
pub enum MonitorError {
    #[display("initial price fetch failed")]
    InitialFetch,
    #[display("no initial price for: {}", assets.join(", "))]
    MissingBaseline { assets: Vec<String> },
}

#[derive(Debug, Display, Error)]
pub enum NotifierError {
    #[display("failed to deliver alert via {notifier}")]
    Request { notifier: String },
    #[display("{notifier} rejected alert with HTTP {status}")]
    Status { notifier: String, status: u16 },
    #[display("alert queue is full")]
    QueueFull,
    #[display("alert worker has stopped")]
    WorkerGone,
}
