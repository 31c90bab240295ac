//! Floodgate - Distributed Rate Limiting Service
//!
//! This crate implements a per-identity request quota shared across any
//! number of stateless service instances. Redis holds the sliding-window
//! log of recent request timestamps and is the single source of truth;
//! the admit/deny decision is made atomically store-side so concurrent
//! instances can never over-admit.

pub mod http;
pub mod limiter;
pub mod config;
pub mod error;
