//! Analysis module for historical queries
//!
//! This module provides:
//! - Time-bucket downsampling of cached series
//! - Aggregate functions selectable by name

pub mod downsample;

pub use downsample::{downsample, downsample_by_name, Aggregate};
