pub mod alert_matcher;
pub mod feed_state;
pub mod issuer;
pub mod message_processor;
pub mod notifications;
pub mod report_filter;
pub mod session;
pub mod triage;
