//! Concrete [`AttendanceStore`](crate::services::store::AttendanceStore)
//! backends.

pub mod firestore;
pub mod snapshot;
