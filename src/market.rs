use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::{Config, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::types::{MediaPair, SpotPrice};

/// Which side of a media (rolling average) fetch to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSide {
    Buy,
    Sell,
}

impl MediaSide {
    fn path_segment(&self) -> &'static str {
        match self {
            MediaSide::Buy => "buy",
            MediaSide::Sell => "sell",
        }
    }
}

/// Spot payload from the price provider, shape `{success, buy, sell}`.
#[derive(Debug, Deserialize)]
struct SpotResponse {
    success: bool,
    buy: Option<f64>,
    sell: Option<f64>,
}

/// Media payload, shape `{tipo, media}` per side.
#[derive(Debug, Deserialize)]
struct MediaResponse {
    #[allow(dead_code)]
    tipo: Option<String>,
    media: Option<f64>,
}

/// HTTP client for the external price provider. All failures come back as
/// tagged errors so scheduled ticks can degrade to a logged no-op.
#[derive(Clone)]
pub struct MarketDataClient {
    http: reqwest::Client,
    spot_url: String,
    media_base_url: String,
}

impl MarketDataClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            spot_url: cfg.spot_url.clone(),
            media_base_url: cfg.media_base_url.clone(),
        })
    }

    /// Current spot buy/sell quote.
    pub async fn fetch_spot(&self) -> Result<SpotPrice> {
        let resp: SpotResponse = self
            .http
            .get(&self.spot_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !resp.success {
            return Err(AppError::Provider("spot endpoint returned success=false".to_string()));
        }
        let buy = require_finite(resp.buy, "buy")?;
        let sell = require_finite(resp.sell, "sell")?;
        debug!(buy, sell, "spot fetched");
        Ok(SpotPrice { buy, sell })
    }

    /// Rolling-average price for one side.
    pub async fn fetch_media(&self, side: MediaSide) -> Result<f64> {
        let url = format!("{}{}", self.media_base_url, side.path_segment());
        let resp: MediaResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        require_finite(resp.media, side.path_segment())
    }

    /// Both media sides, fetched concurrently. Fails as a unit — spread
    /// computation needs both, so no partial result is ever returned.
    pub async fn fetch_media_both(&self) -> Result<MediaPair> {
        let (buy, sell) =
            tokio::try_join!(self.fetch_media(MediaSide::Buy), self.fetch_media(MediaSide::Sell))?;
        Ok(MediaPair { buy, sell })
    }
}

fn require_finite(value: Option<f64>, field: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(AppError::InvalidData(format!("{field} is not finite: {v}"))),
        None => Err(AppError::InvalidData(format!("{field} missing from provider response"))),
    }
}
