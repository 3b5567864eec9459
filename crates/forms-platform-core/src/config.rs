use std::time::Duration;

use crate::error::PlatformError;
use crate::named_size::{RuntimePlatform, TargetIdiom};

/// Frame cadence used by tickers unless configured otherwise (~60Hz).
pub const DEFAULT_TICKER_INTERVAL: Duration = Duration::from_millis(16);

/// Host-level settings for [`crate::PlatformServices`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformConfig {
    pub platform: RuntimePlatform,
    pub idiom: TargetIdiom,
    pub ticker_interval: Duration,
    /// Multiplier applied to point sizes when resolving named font sizes.
    pub font_scale: f64,
}

impl PlatformConfig {
    pub fn gtk() -> Self {
        Self {
            platform: RuntimePlatform::Gtk,
            idiom: TargetIdiom::Desktop,
            ticker_interval: DEFAULT_TICKER_INTERVAL,
            font_scale: 1.0,
        }
    }

    pub fn tizen(idiom: TargetIdiom) -> Self {
        Self {
            platform: RuntimePlatform::Tizen,
            idiom,
            ..Self::gtk()
        }
    }

    pub fn with_idiom(mut self, idiom: TargetIdiom) -> Self {
        self.idiom = idiom;
        self
    }

    pub fn with_ticker_interval(mut self, interval: Duration) -> Self {
        self.ticker_interval = interval;
        self
    }

    pub fn with_font_scale(mut self, scale: f64) -> Self {
        self.font_scale = scale;
        self
    }

    pub fn validate(&self) -> Result<(), PlatformError> {
        if self.ticker_interval.is_zero() {
            return Err(PlatformError::InvalidConfig {
                field: "ticker_interval",
                reason: "cadence must be positive".to_owned(),
            });
        }
        if !self.font_scale.is_finite() || self.font_scale <= 0.0 {
            return Err(PlatformError::InvalidConfig {
                field: "font_scale",
                reason: format!("expected a positive finite factor, got {}", self.font_scale),
            });
        }
        Ok(())
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::gtk()
    }
}
