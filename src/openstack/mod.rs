//! Thin OpenStack client: Keystone password auth plus the handful of Image
//! API v2 calls this tool needs. Credentials come from the standard
//! `clouds.yaml`, never from code.

pub mod client;
pub mod clouds;
pub mod images;

pub use client::OsClient;
pub use clouds::CloudProfile;
pub use images::OsImage;
