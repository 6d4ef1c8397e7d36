// src/lib.rs

//! CMS mirror library
//!
//! Mirrors a CMS site into a static site and archives its documents.

pub mod archive;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
