//! Core of the itinera travel-planning backend.
//!
//! * [`recovery`] turns raw generative-model text into typed documents.
//! * [`document`] holds those document types and their interpreter.
//! * [`credential`] signs and caches speech-service tokens.
//! * [`upstream`] talks to the generative and speech backends.
//! * [`planner`] ties a backend to the recovery pipeline per caller path.

pub mod credential;
pub mod document;
pub mod planner;
pub mod recovery;
pub mod upstream;
