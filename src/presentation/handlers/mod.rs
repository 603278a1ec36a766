mod api_error;
mod health;
mod speech_to_text;

pub use api_error::{ApiError, ErrorResponse, panic_response};
pub use health::health_handler;
pub use speech_to_text::{FILE_FIELD, speech_to_text_handler};
