//! Normalized listing record shared by every adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Currency used by the bundled Swedish marketplaces.
pub const DEFAULT_CURRENCY: &str = "SEK";

/// A numeric asking price with its currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

impl Price {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// Price in Swedish kronor.
    pub fn sek(amount: f64) -> Self {
        Self::new(amount, DEFAULT_CURRENCY)
    }
}

/// One product or offer from any source.
///
/// `source` and `title` are always populated. Every other field is optional
/// and `None` means "unknown"; there are no sentinel values such as a zero price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Identifier of the originating adapter (e.g., "hifitorget")
    pub source: String,

    /// Display text
    pub title: String,

    /// Canonical link. Used as an identity hint, not globally unique.
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,

    /// When the listing was posted. Date-only values are midnight UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,

    /// The date text exactly as the source displayed it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_raw: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Listing {
    /// Create a listing with the required fields.
    pub fn new(source: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            url: url.into(),
            price: None,
            posted_at: None,
            posted_raw: None,
            description: None,
            location: None,
            image_url: None,
        }
    }

    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_price_amount(mut self, amount: Option<f64>) -> Self {
        self.price = amount.map(Price::sek);
        self
    }

    pub fn with_posted_at(mut self, posted_at: DateTime<Utc>) -> Self {
        self.posted_at = Some(posted_at);
        self
    }

    /// Keep the raw date text and parse it relative to `now`.
    ///
    /// Text that cannot be parsed leaves `posted_at` unknown.
    pub fn with_posted_text(mut self, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        let text = text.into();
        self.posted_at = crate::dates::parse_posted(&text, now);
        self.posted_raw = Some(text);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn price_amount(&self) -> Option<f64> {
        self.price.as_ref().map(|p| p.amount)
    }
}
