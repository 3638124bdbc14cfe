//! HTTP routes

pub mod closure;
