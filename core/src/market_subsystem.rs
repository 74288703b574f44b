use crate::{
    config::MarketConfig,
    error::{SimError, SimResult},
    rng::SubsystemRng,
    types::Month,
};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Month-level conditions shared by every account in that month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub month:         Month,
    pub market_return: f64,
    /// Additive logit shift for the calendar month.
    pub seasonality:   f64,
}

pub struct MarketSubsystem {
    returns:  Normal<f64>,
    template: Vec<f64>,
    scale:    f64,
}

impl MarketSubsystem {
    pub fn new(config: &MarketConfig) -> SimResult<Self> {
        let returns = Normal::new(config.return_mean, config.return_sd)
            .map_err(|e| SimError::invalid("market.return_sd", e.to_string()))?;
        Ok(Self {
            returns,
            template: config.seasonality_template.clone(),
            scale: config.seasonality_scale,
        })
    }

    /// Seasonality for month m, cycling the 12-entry template from month 1.
    pub fn seasonality(&self, month: Month) -> f64 {
        let idx = (month as usize - 1) % self.template.len();
        self.template[idx] * self.scale
    }

    /// Draw this month's market return. Exactly one draw per month.
    pub fn update(&self, month: Month, rng: &mut SubsystemRng) -> MarketState {
        let state = MarketState {
            month,
            market_return: rng.sample(&self.returns),
            seasonality: self.seasonality(month),
        };

        log::debug!(
            "month={month} market: return={:.4} seasonality={:.3}",
            state.market_return,
            state.seasonality
        );

        state
    }
}
