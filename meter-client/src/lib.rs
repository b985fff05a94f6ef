//! Domain types and store queries for the meter dashboard database.

pub mod db;
pub mod domain;
