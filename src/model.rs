use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Prices observed for one tick, keyed by asset id.
///
/// May omit ids the source had no valid price for. Every stored price is
/// finite and strictly positive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quote {
    prices: HashMap<String, f64>,
}

impl Quote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `price` for `id`. Returns `false` and stores nothing when the
    /// price is not a finite positive number.
    pub fn insert(&mut self, id: impl Into<String>, price: f64) -> bool {
        if !is_valid_price(price) {
            return false;
        }
        self.prices.insert(id.into(), price);
        true
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.prices.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Quote {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut quote = Quote::new();
        for (id, price) in iter {
            quote.insert(id, price);
        }
        quote
    }
}

pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Outcome of comparing a fresh price against the asset's baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeResult {
    pub asset_id: String,
    pub old_price: f64,
    pub new_price: f64,
    pub percent_change: f64,
    pub exceeded: bool,
}

/// Immutable alert payload handed to the notifier worker.
#[derive(Debug, Clone)]
pub struct Alert {
    pub id: Uuid,
    pub asset_id: String,
    pub currency: String,
    pub percent_change: f64,
    pub old_price: f64,
    pub new_price: f64,
    pub threshold: f64,
    pub interval: Duration,
    pub observed_at: DateTime<Utc>,
}

impl Alert {
    pub fn from_change(
        change: &ChangeResult,
        threshold: f64,
        currency: &str,
        interval: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            asset_id: change.asset_id.clone(),
            currency: currency.to_owned(),
            percent_change: change.percent_change,
            old_price: change.old_price,
            new_price: change.new_price,
            threshold,
            interval,
            observed_at: Utc::now(),
        }
    }

    /// Human-readable Markdown body used as the webhook `content`.
    pub fn message(&self) -> String {
        let currency = self.currency.to_uppercase();
        let mut text = String::new();
        let _ = writeln!(
            text,
            "🚨 **{} Price Alert!** 🚨",
            capitalize(&self.asset_id)
        );
        let _ = writeln!(
            text,
            "> Price changed by **`{:+.2}%`** in the last {}!",
            self.percent_change,
            humanize_interval(self.interval)
        );
        let _ = writeln!(
            text,
            "> **Old Price:** `{} {currency}`",
            format_price(self.old_price)
        );
        let _ = writeln!(
            text,
            "> **New Price:** `{} {currency}`",
            format_price(self.new_price)
        );
        let _ = write!(text, "> **Threshold:** `{:.2}%`", self.threshold);
        text
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Two decimals with `,` thousands separators, e.g. `50,300.00`.
pub fn format_price(price: f64) -> String {
    let fixed = format!("{:.2}", price.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

fn humanize_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    match secs {
        60 => "minute".to_owned(),
        3600 => "hour".to_owned(),
        s if s % 3600 == 0 => format!("{} hours", s / 3600),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "second".to_owned(),
        s => format!("{s} seconds"),
    }
}
