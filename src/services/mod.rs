//! Service layer for the mirror application.
//!
//! This module contains the business logic for:
//! - Output path translation (`paths`)
//! - Archive identifier derivation (`identifier`)
//! - Document extraction (`Extractor`)
//! - Upstream HTTP access (`HttpUpstream`)

pub mod identifier;
pub mod markup;
pub mod paths;

mod extractor;
mod upstream;

pub use extractor::{Extraction, Extractor, SessionFlags};
pub use upstream::{HttpUpstream, Upstream, UpstreamResponse, create_async_client};
