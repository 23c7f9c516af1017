//! USDT price and spread ("brecha") alert service.
//!
//! Two independent loops run against the same SQLite store:
//!
//! ```text
//! PollingScheduler ──► MarketDataClient ──► Store (snapshots)
//!        │                                    │
//!        └──► SubscriptionRegistry ──► AlertDispatcher ──► MessageSender
//!        ┌──────────────────────────────────────┘
//! NotificationEvaluator (one-shot buy/sell targets, own timer)
//! ```
//!
//! The conversational layer writes subscriptions through the registry and
//! captures target prices via the dialog tracker; it lives outside this crate.

pub mod api;
pub mod config;
pub mod db;
pub mod dialog;
pub mod error;
pub mod evaluator;
pub mod market;
pub mod notify;
pub mod scheduler;
pub mod subscriptions;
pub mod types;
