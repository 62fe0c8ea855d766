//! # ananya-core
//!
//! Foundation types, errors, IDs, and text utilities for the Ananya chat engine.
//!
//! This crate provides the shared vocabulary that all other Ananya crates depend on:
//!
//! - **IDs**: [`ids::UserId`], [`ids::BroadcastId`], [`ids::PersonalityId`]
//! - **Turns**: [`messages::Turn`] with [`messages::Role`]
//! - **Input**: [`media::RawInput`] and its canonical [`media::NormalizedRequest`]
//! - **Personalities**: [`personality::PersonalityProfile`] and the compiled-in catalog
//! - **Delivery**: [`delivery::DeliveryOutcome`], [`delivery::DeliverySummary`]
//! - **Errors**: [`errors::AnanyaError`] via `thiserror`
//! - **Retry**: [`retry::RetryConfig`] and backoff calculation
//! - **Text**: UTF-8–safe truncation and [`text::chunk_text`]
//! - **Logging**: [`logging::init_subscriber`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other ananya crates.

#![deny(unsafe_code)]

pub mod constants;
pub mod delivery;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod media;
pub mod messages;
pub mod personality;
pub mod retry;
pub mod text;
