//! MyCAD - Vehicle and equipment inventory backend
//!
//! This library provides the REST backend for the MyCAD inventory system,
//! including the bulk CSV import of inventory records.

pub mod api;
pub mod config;
pub mod db;
pub mod import;
pub mod models;
pub mod services;
