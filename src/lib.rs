pub mod engine;
pub mod models;

pub use engine::aggregator::{AggregateStats, Aggregator};
pub use engine::dispatcher::{run, Dispatcher, RunHandle};
pub use engine::report::{Report, ReportFormat};
pub use engine::status_share::latest_snapshot;
pub use engine::targets::{load_targets, TargetSource, Targets};
pub use engine::transport::{HttpTransport, ReqwestTransport};
pub use models::args::{Args, Settings};
pub use models::errors::{ConfigError, TargetError, TransportError};
pub use models::request_spec::{HttpMethod, RequestOptions, RequestSpec};
pub use models::result::{RequestResult, StatsSnapshot};
pub use models::run_config::{RunConfig, Termination};
