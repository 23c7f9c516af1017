use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Price snapshots
// ---------------------------------------------------------------------------

/// What a persisted price value represents. `Buy`/`Sell` are spot quotes;
/// `MediaBuy`/`MediaSell` are the provider's rolling averages per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceKind {
    Buy,
    Sell,
    MediaBuy,
    MediaSell,
}

impl PriceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceKind::Buy => "buy",
            PriceKind::Sell => "sell",
            PriceKind::MediaBuy => "media_buy",
            PriceKind::MediaSell => "media_sell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(PriceKind::Buy),
            "sell" => Some(PriceKind::Sell),
            "media_buy" => Some(PriceKind::MediaBuy),
            "media_sell" => Some(PriceKind::MediaSell),
            _ => None,
        }
    }
}

impl std::fmt::Display for PriceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Notification kinds
// ---------------------------------------------------------------------------

/// The four subscription flags a user can hold. Each variant maps to a fixed
/// column pair in the subscriptions table — column names are never built from
/// strings at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// One-shot: fires when spot buy rises to the user's target.
    Buy,
    /// One-shot: fires when spot sell falls to the user's target.
    Sell,
    /// Recurring: spot spread percentage above threshold.
    Spread,
    /// Recurring: media spread percentage above threshold.
    MediaSpread,
}

impl NotificationKind {
    /// Buy and Sell carry an optional target price; the spread kinds do not.
    pub fn takes_target(&self) -> bool {
        matches!(self, NotificationKind::Buy | NotificationKind::Sell)
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::Buy => "buy",
            NotificationKind::Sell => "sell",
            NotificationKind::Spread => "spread",
            NotificationKind::MediaSpread => "media_spread",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Market values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotPrice {
    pub buy: f64,
    pub sell: f64,
}

/// Rolling-average prices for both sides, fetched as a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaPair {
    pub buy: f64,
    pub sell: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    /// |sell - buy|
    pub diff: f64,
    /// diff / buy * 100
    pub pct: f64,
}

/// Compute the spread between a buy and a sell quote.
/// A zero, negative or non-finite buy cannot anchor a percentage, so the
/// caller's tick must short-circuit instead of persisting Infinity/NaN.
pub fn calc_spread(buy: f64, sell: f64) -> Result<Spread> {
    if !buy.is_finite() || !sell.is_finite() {
        return Err(AppError::InvalidData(format!(
            "non-finite spread inputs: buy={buy} sell={sell}"
        )));
    }
    if buy <= 0.0 {
        return Err(AppError::InvalidData(format!(
            "buy price must be positive to compute spread, got {buy}"
        )));
    }
    let diff = (sell - buy).abs();
    Ok(Spread {
        diff,
        pct: diff / buy * 100.0,
    })
}

/// Parse a user-supplied target price. Rejections are surfaced back to the
/// user as plain language, not logged as errors.
pub fn parse_target(input: &str) -> Result<f64> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("'{}' is not a number", input.trim())))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::Validation(format!(
            "target price must be a positive number, got {value}"
        )));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A user's notification preferences. Value copy of the stored row — holders
/// never observe another tick's partial writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub user_id: i64,
    pub notify_buy: bool,
    pub buy_target: Option<f64>,
    pub notify_sell: bool,
    pub sell_target: Option<f64>,
    pub notify_spread: bool,
    pub notify_media_spread: bool,
}
