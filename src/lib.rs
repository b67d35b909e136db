//! Love365 - personalized anniversary pages
//!
//! Customers submit a form with photos, pay a one-time PIX checkout, and get a
//! shareable page once the payment webhook approves the order.

pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod models;
pub mod payments;
pub mod rate_limit;
pub mod storage;
pub mod validation;
