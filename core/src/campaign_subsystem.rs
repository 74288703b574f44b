//! Campaign scheduler: one nudge wave per (region, channel).
//!
//! Deterministic, consumes no randomness. Waves are numbered
//! region-major, channel-minor starting at 1. The per-channel lookup
//! maps give the panel engine direct access to each region's window.

use crate::{
    config::SimConfig,
    error::{SimError, SimResult},
    types::{Channel, Month, Region, WaveId},
};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignWave {
    pub nudge_wave_id:    WaveId,
    pub channel:          Channel,
    pub region:           Region,
    pub start_month:      Month,
    /// Inclusive. Capped at the horizon, so it can precede start_month
    /// for waves that would open after the simulation ends.
    pub end_month:        Month,
    pub eligibility_rule: String,
    pub intensity:        u32,
}

impl CampaignWave {
    pub fn is_active(&self, month: Month) -> bool {
        month >= self.start_month && month <= self.end_month
    }
}

/// The wave table plus region lookups keyed by channel.
#[derive(Debug, Clone)]
pub struct CampaignSchedule {
    pub waves:           Vec<CampaignWave>,
    start_by_channel:    HashMap<Channel, HashMap<Region, Month>>,
    end_by_channel:      HashMap<Channel, HashMap<Region, Month>>,
    wave_by_channel:     HashMap<Channel, HashMap<Region, WaveId>>,
}

impl CampaignSchedule {
    pub fn build(config: &SimConfig) -> Self {
        let horizon = config.n_months;
        let mut waves = Vec::with_capacity(Region::ALL.len() * Channel::ALL.len());
        let mut start_by_channel: HashMap<Channel, HashMap<Region, Month>> = HashMap::new();
        let mut end_by_channel: HashMap<Channel, HashMap<Region, Month>> = HashMap::new();
        let mut wave_by_channel: HashMap<Channel, HashMap<Region, WaveId>> = HashMap::new();

        let mut wave_id: WaveId = 1;
        for region in Region::ALL {
            for channel in Channel::ALL {
                let start_month = region.base_start_month() + channel.start_offset();
                let end_month = start_month.saturating_add(config.campaign.wave_duration).min(horizon);

                waves.push(CampaignWave {
                    nudge_wave_id: wave_id,
                    channel,
                    region,
                    start_month,
                    end_month,
                    eligibility_rule: config.campaign.eligibility_rule.clone(),
                    intensity: channel.intensity(),
                });

                start_by_channel.entry(channel).or_default().insert(region, start_month);
                end_by_channel.entry(channel).or_default().insert(region, end_month);
                wave_by_channel.entry(channel).or_default().insert(region, wave_id);
                wave_id += 1;
            }
        }

        log::info!("campaign: scheduled {} waves over {horizon} months", waves.len());

        Self {
            waves,
            start_by_channel,
            end_by_channel,
            wave_by_channel,
        }
    }

    pub fn start_month(&self, channel: Channel, region: Region) -> Option<Month> {
        self.start_by_channel.get(&channel)?.get(&region).copied()
    }

    pub fn end_month(&self, channel: Channel, region: Region) -> Option<Month> {
        self.end_by_channel.get(&channel)?.get(&region).copied()
    }

    pub fn wave_id(&self, channel: Channel, region: Region) -> SimResult<WaveId> {
        self.wave_by_channel
            .get(&channel)
            .and_then(|by_region| by_region.get(&region))
            .copied()
            .ok_or(SimError::MissingWave { channel, region })
    }

    /// Whether the channel's wave for this region covers `month`.
    pub fn is_active(&self, channel: Channel, region: Region, month: Month) -> bool {
        match (self.start_month(channel, region), self.end_month(channel, region)) {
            (Some(start), Some(end)) => month >= start && month <= end,
            _ => false,
        }
    }
}
