mod metrics;
mod request_id;

pub use metrics::http_metrics_middleware;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
