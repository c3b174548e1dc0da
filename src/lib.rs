//! CropSense - Agricultural Assistant Backend
//!
//! REST backend for a smallholder-farming assistant. Farmers upload crop
//! photos for automated condition assessment and chat with an advisory
//! assistant that falls back to curated local guidance when no remote
//! model is reachable.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     CropSense API                        │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐   │
//! │  │   analysis   │  │     chat     │  │   profile    │   │
//! │  │ upload/class │  │ sessions +   │  │ default farm │   │
//! │  │ ify/share    │  │ fallback     │  │ location     │   │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘   │
//! │         │                 │                 │           │
//! │  ┌──────▼─────────────────▼─────────────────▼───────┐   │
//! │  │        RecordStore (JSON-file persistence)       │   │
//! │  └──────────────────────────────────────────────────┘   │
//! │         │                 │                             │
//! │  ┌──────▼───────┐  ┌──────▼───────┐                     │
//! │  │  classifier  │  │ chat provider│   (lazy, timed out) │
//! │  └──────────────┘  └──────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`analysis`]: Crop image upload lifecycle, classification, sharing, analytics
//! - [`chat`]: Advisory chat sessions with remote provider and local fallback
//! - [`classifier`]: Classifier capability trait, stub model, lazy handle
//! - [`profile`]: Per-user default farm location
//! - [`store`]: Generic JSON-file record store
//! - [`storage`]: Uploaded binary storage
//! - [`access`]: Ownership and visibility checks
//! - [`api`]: Router assembly, identity extraction, error envelope
//! - [`config`]: Configuration management

pub mod access;
pub mod analysis;
pub mod api;
pub mod chat;
pub mod classifier;
pub mod config;
pub mod error;
pub mod profile;
pub mod storage;
pub mod store;

pub use config::CropSenseConfig;
pub use error::{Error, Result};
