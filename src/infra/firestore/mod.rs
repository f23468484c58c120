//! Firestore REST implementation of the document store.

mod client;
pub mod value;

pub use client::{DEFAULT_BASE_URL, FirestoreClient};
