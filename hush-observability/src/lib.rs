pub mod body_masker;
pub mod header_masker;
pub mod log_record;
pub mod multipart;
pub mod sink;

pub use body_masker::{MASK, mask, mask_body, render_body, render_body_prefix};
pub use header_masker::{mask_headers, mask_query_params, mask_query_string, mask_uri};
pub use log_record::{LogRecord, LogRecordBuilder};
pub use sink::{FailingSink, LogSink, MemorySink, TracingSink};
