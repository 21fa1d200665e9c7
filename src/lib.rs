//! Telegram Analytics - Ingestion and Enrichment Pipeline
//!
//! A Rust library for loading scraped Telegram channel data into a
//! relational store, enriching message images with object-detection labels,
//! and answering analytics queries over the derived tables.
//!
//! # Features
//!
//! - Path-based discovery of scraped JSON dumps and images
//! - Idempotent bulk loading of flattened message rows
//! - Object-detection enrichment behind an opaque model boundary
//! - Sequential pipeline orchestration with fail-fast semantics
//! - Read-only channel and keyword analytics

/// Configuration management
pub mod config;
/// Database access and bulk loading primitives
pub mod db;
/// Object detection model boundary
pub mod detect;
/// Detection artifact loading stage
pub mod detection_loader;
/// Source file discovery
pub mod discovery;
/// Detection enrichment stage
pub mod enrich;
/// Error taxonomy
pub mod error;
/// Message flattening
pub mod flatten;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Pipeline orchestration and triggers
pub mod pipeline;
/// Raw message loading stage
pub mod raw_loader;
/// Read-only analytics queries
pub mod repository;
/// Database schema definitions
pub mod schema;
/// Transform stage boundary
pub mod transform;

// Re-export key components for easier access
pub use config::AppConfig;
pub use db::Database;
pub use detect::{DetectedObject, ObjectDetector};
pub use error::{PipelineError, Result};
pub use models::{Detection, RawMessage};
pub use pipeline::{Pipeline, PipelineState};
