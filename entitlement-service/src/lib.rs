//! Entitlement service: subscription validation and plan-limit guards.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
