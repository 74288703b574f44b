use super::SimStore;
use crate::{
    account_subsystem::AccountRecord,
    campaign_subsystem::CampaignWave,
    error::SimResult,
    panel_subsystem::AccountMonthRecord,
};
use rusqlite::params;

// Bulk inserts. These do not open their own transaction; `save_output`
// wraps the whole run in one.
impl SimStore {
    // ── Accounts ──────────────────────────────────────────────────

    pub fn insert_accounts(&self, run_id: &str, accounts: &[AccountRecord]) -> SimResult<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO account (
                run_id, account_id, rollover_month, baseline_balance, age_band,
                tenure_band, risk_tolerance, digital_engagement_score, advisor_flag,
                region, contactable_email, contactable_sms, preferred_channel, latent_effect
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )?;
        for a in accounts {
            stmt.execute(params![
                run_id,
                a.account_id,
                a.rollover_month,
                a.baseline_balance,
                a.age_band.as_str(),
                a.tenure_band.as_str(),
                a.risk_tolerance.as_str(),
                a.digital_engagement_score,
                a.advisor_flag,
                a.region.as_str(),
                a.contactable_email,
                a.contactable_sms,
                a.preferred_channel.as_str(),
                a.latent_effect,
            ])?;
        }
        Ok(())
    }

    pub fn account_count(&self, run_id: &str) -> SimResult<i64> {
        self.count("SELECT COUNT(*) FROM account WHERE run_id = ?1", run_id)
    }

    // ── Campaigns ─────────────────────────────────────────────────

    pub fn insert_campaigns(&self, run_id: &str, waves: &[CampaignWave]) -> SimResult<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO nudge_campaign (
                run_id, nudge_wave_id, channel, region, start_month, end_month,
                eligibility_rule, intensity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for w in waves {
            stmt.execute(params![
                run_id,
                w.nudge_wave_id,
                w.channel.as_str(),
                w.region.as_str(),
                w.start_month,
                w.end_month,
                &w.eligibility_rule,
                w.intensity,
            ])?;
        }
        Ok(())
    }

    pub fn campaign_count(&self, run_id: &str) -> SimResult<i64> {
        self.count("SELECT COUNT(*) FROM nudge_campaign WHERE run_id = ?1", run_id)
    }

    // ── Panel ─────────────────────────────────────────────────────

    pub fn insert_panel(&self, run_id: &str, records: &[AccountMonthRecord]) -> SimResult<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO account_month (
                run_id, account_id, calendar_month, months_since_rollover, active_flag,
                eligible_flag, market_return, seasonality_index, nudge_email, nudge_sms,
                nudge_inapp, exposure_email, exposure_sms, exposure_inapp, email_wave_id,
                sms_wave_id, inapp_wave_id, treatment_any, treatment_intensity,
                first_exposure_month, event_time, treated, post, invested_true,
                invested_flag, invested_status, invest_amount, account_closed,
                missing_engagement, engagement_obs, missing_market_return, market_return_obs
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
                ?31, ?32
            )",
        )?;
        for r in records {
            stmt.execute(params![
                run_id,
                r.account_id,
                r.calendar_month,
                r.months_since_rollover,
                r.active_flag,
                r.eligible_flag,
                r.market_return,
                r.seasonality_index,
                r.nudge_email,
                r.nudge_sms,
                r.nudge_inapp,
                r.exposure_email,
                r.exposure_sms,
                r.exposure_inapp,
                r.email_wave_id,
                r.sms_wave_id,
                r.inapp_wave_id,
                r.treatment_any,
                r.treatment_intensity,
                r.first_exposure_month,
                r.event_time,
                r.treated,
                r.post,
                r.invested_true,
                r.invested_flag,
                r.invested_status,
                r.invest_amount,
                r.account_closed,
                r.missing_engagement,
                r.engagement_obs,
                r.missing_market_return,
                r.market_return_obs,
            ])?;
        }
        Ok(())
    }

    pub fn panel_row_count(&self, run_id: &str) -> SimResult<i64> {
        self.count("SELECT COUNT(*) FROM account_month WHERE run_id = ?1", run_id)
    }

    /// Accounts whose carried invested status is set in any month.
    pub fn invested_account_count(&self, run_id: &str) -> SimResult<i64> {
        self.count(
            "SELECT COUNT(DISTINCT account_id) FROM account_month
             WHERE run_id = ?1 AND invested_status = 1",
            run_id,
        )
    }

    /// Total invested amount, summed in SQL.
    pub fn total_invest_amount(&self, run_id: &str) -> SimResult<f64> {
        let total: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(invest_amount), 0.0) FROM account_month WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
