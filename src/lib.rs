//! Attendance, feedback, push-token and bus-location logic for a college
//! bus-tracking app, over a Firestore-style document store.

pub mod analyzers;
pub mod bus_id;
pub mod config;
pub mod document;
pub mod feedback;
pub mod fetch;
pub mod infra;
pub mod location;
pub mod model;
pub mod notify;
pub mod output;
pub mod report;
pub mod roster;
pub mod services;
pub mod submission;
