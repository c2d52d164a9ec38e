//! Domain models for audit records and their event trail.

pub mod audit_event;
pub mod audit_record;
