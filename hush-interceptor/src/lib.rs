pub mod exchange;
pub mod interceptor;

pub use exchange::{ExchangePhase, FailureCapture, RequestCapture, ResponseCapture};
pub use interceptor::{LoggingInterceptor, new_exchange_id};
