//! Election Cart - E-commerce backend for election campaign services
//!
//! This library provides the core functionality for the Election Cart
//! backend: catalog, cart, orders, payment verification and the admin
//! panel.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod payment;
pub mod services;
