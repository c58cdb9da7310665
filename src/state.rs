use error_stack::Report;

use crate::config::AssetConfig;
use crate::error::MonitorError;
use crate::model::{Quote, is_valid_price};

/// Last observed price and alert threshold for one tracked asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetState {
    id: String,
    last_price: f64,
    threshold: f64,
}

impl AssetState {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn last_price(&self) -> f64 {
        self.last_price
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Move the baseline to `price`. Invalid prices are ignored and reported
    /// with `false`.
    pub fn advance(&mut self, price: f64) -> bool {
        if !is_valid_price(price) {
            return false;
        }
        self.last_price = price;
        true
    }

    /// Overwrite the baseline without validation.
    #[cfg(test)]
    pub fn set_last_price_unchecked(&mut self, price: f64) {
        self.last_price = price;
    }
}

/// Baselines for every configured asset, in config order.
#[derive(Debug, Clone)]
pub struct AssetBook {
    states: Vec<AssetState>,
}

impl AssetBook {
    /// Seed one `AssetState` per configured asset from the initial quote.
    ///
    /// Fails naming every asset the quote has no price for.
    pub fn seed(assets: &[AssetConfig], quote: &Quote) -> Result<Self, Report<MonitorError>> {
        let missing: Vec<String> = assets
            .iter()
            .filter(|a| quote.get(&a.id).is_none())
            .map(|a| a.id.clone())
            .collect();

        if !missing.is_empty() {
            return Err(Report::new(MonitorError::MissingBaseline { assets: missing }).attach(
                "check that each assets[].id is a valid price-source id for the configured vs_currency",
            ));
        }

        let states = assets
            .iter()
            .filter_map(|a| {
                quote.get(&a.id).map(|price| AssetState {
                    id: a.id.clone(),
                    last_price: price,
                    threshold: a.alert_threshold_percent,
                })
            })
            .collect();

        Ok(Self { states })
    }

    pub fn ids(&self) -> Vec<String> {
        self.states.iter().map(|s| s.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&AssetState> {
        self.states.iter().find(|s| s.id == id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AssetState> {
        self.states.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }
}
