pub mod action;
pub mod decision;
pub mod event;
pub mod hypothesis;
pub mod learning;
pub mod metrics;
