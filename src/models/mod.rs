pub mod alert;
pub mod message;
pub mod notification;
pub mod report;
