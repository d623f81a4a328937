//! model3d-service: turns a memory's figurine image into a printable STL.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
