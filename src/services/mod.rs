//! Network-backed services

pub mod weather;
