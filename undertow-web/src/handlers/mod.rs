//! HTTP request handlers for streaming delivery.

pub mod range;
pub mod streaming;
pub mod subtitle;

pub use range::{RangeWindow, is_range_mandatory, parse_range_header, resolve_window};
pub use streaming::{prepare_stream, stream_media};
pub use subtitle::stream_subtitle;
