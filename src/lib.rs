//! Daily curation of tracker music from The Mod Archive
//!
//! Three cooperating pieces: a catalog client that scrapes the archive's
//! listing pages, a curator that commits exactly one selection per calendar
//! date, and a local content cache that downloads module files on demand.

pub mod cache;
pub mod config;
pub mod curator;
pub mod database;
pub mod entities;
pub mod errors;
pub mod models;
pub mod sources;
