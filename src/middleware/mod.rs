pub mod request_logger;

pub use request_logger::{request_logger_middleware, REQUEST_ID_HEADER};
