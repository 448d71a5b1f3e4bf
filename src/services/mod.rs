// src/services/mod.rs
pub mod aggregate;
pub mod cache;
pub mod enam;
pub mod normalize;
pub mod record;
pub mod sources;
pub mod synthetic;
