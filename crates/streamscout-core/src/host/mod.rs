//! Browser hosts for live capture
//!
//! A host owns a real document that embed frames are inserted into and
//! reports the requests those frames make to the [`sniffer`](crate::sniffer).
//! Live capture is only available when a host is supplied to the
//! [`StreamExtractorBuilder`](crate::StreamExtractorBuilder).

pub mod chromium;

pub use chromium::{ChromiumConfig, ChromiumHost};
