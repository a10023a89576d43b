//! Lifecycle management for OpenStack cloud images, driven by a declarative
//! manifest: fetch, verify, convert, upload, deprecate.

pub mod checksum;
pub mod config;
pub mod convert;
pub mod errors;
pub mod fetch;
pub mod logging;
pub mod manifest;
pub mod openstack;
pub mod probe;
pub mod run;
