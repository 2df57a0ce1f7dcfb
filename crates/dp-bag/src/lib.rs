//! # dp-bag
//!
//! Preservation envelope handling for the packaging pipeline.
//!
//! This crate provides:
//!
//! - **Date handling** ([`dates`]) -- reduce registry date records to a raw
//!   range and widen partial dates into calendar dates.
//! - **BagIt** ([`bagit`]) -- write a bag in place over a staged directory
//!   with checksummed manifests and provenance metadata, and validate it.
//! - **Archives** ([`archive`]) -- serialize a bag into a gzip-compressed
//!   tarball rooted at the bag's directory name.

pub mod archive;
pub mod bagit;
pub mod dates;

pub use archive::{archive_path_for, compress, extract};
pub use bagit::{make_bag, read_bag_info, validate_bag, BagInfo, BagReport};
pub use dates::{compute_date_range, normalize_date_range, DateRange, DateRecord};
