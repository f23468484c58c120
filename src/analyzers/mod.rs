//! Attendance aggregation and the fetch-aggregate pipeline.
//!
//! This module joins daily attendance documents with the bus roster,
//! computes present/absent counts and percentages per day, rolls days up
//! into per-bus and per-student totals, and drives the store queries that
//! feed those computations.

pub mod aggregate;
pub mod analyzer;
pub mod types;
pub mod utility;
