pub mod aggregator;
pub mod dispatcher;
pub mod progress;
pub mod report;
pub mod sink;
pub mod status_share;
pub mod targets;
pub mod transport;
pub mod worker;
