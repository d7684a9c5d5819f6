//! Storage layer of a receipt and expense tracker: the SQLite store and its
//! schema history, zero-filled spending series, whole-file backups and
//! row-level export and import.

pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod progress;
pub mod run;
