//! HTTP request handlers

pub mod health;
pub mod textures;
pub mod zones;
