//! The ledger engine: owns the store and wires the pipelines together.
//!
//! FETCH ORDER (fixed, documented):
//!   1. Consumption sync
//!   2. Tempo sync
//!   3. Rate feed refresh
//!   4. Historical rate seeding
//!
//! RULES:
//!   - The pipelines share no state; the order only matters for a complete
//!     first run.
//!   - A provider failure ends that pipeline early and is reported, the
//!     remaining steps still run.
//!   - Only store errors abort the whole refresh.

use crate::{
    clock::SyncClock,
    config::AppConfig,
    error::{LedgerError, LedgerResult},
    meter::{cached_meter_contract, load_meter_contract, ContractInfo},
    pricing::PricingEngine,
    providers::{ConsumptionProvider, MeterContractProvider, Providers, TempoProvider},
    rates::{IngestReport, RateIngestor},
    store::LedgerStore,
    sync::{SyncEngine, SyncReport},
};
use chrono::NaiveDate;

pub struct LedgerEngine {
    pub store:  LedgerStore,
    pub config: AppConfig,
    pub clock:  SyncClock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub consumption:     SyncReport,
    pub tempo:           SyncReport,
    pub rates:           IngestReport,
    pub historical_rows: usize,
}

impl LedgerEngine {
    pub fn new(store: LedgerStore, config: AppConfig, clock: SyncClock) -> Self {
        Self { store, config, clock }
    }

    /// In-memory engine with default configuration and a clock frozen on
    /// `today`.
    pub fn build_test(today: NaiveDate) -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, AppConfig::default_test(), SyncClock::fixed_on(today)))
    }

    /// Fetch the contract from the provider unless it is already cached.
    pub fn load_contract(&self, provider: &dyn MeterContractProvider) -> LedgerResult<ContractInfo> {
        load_meter_contract(&self.store, provider)
    }

    pub fn contract(&self) -> LedgerResult<ContractInfo> {
        cached_meter_contract(&self.store)?.ok_or(LedgerError::MeterContractMissing)
    }

    fn sync_engine(&self, contract: &ContractInfo) -> SyncEngine<'_> {
        SyncEngine::new(&self.store, self.clock, contract).with_config(&self.config)
    }

    pub fn sync_consumption(&self, provider: &dyn ConsumptionProvider) -> LedgerResult<SyncReport> {
        let contract = self.contract()?;
        self.sync_engine(&contract)
            .sync_consumption(provider, self.config.consumption_hard_limit_days)
    }

    pub fn sync_tempo(&self, provider: &dyn TempoProvider) -> LedgerResult<SyncReport> {
        let contract = self.contract()?;
        self.sync_engine(&contract)
            .sync_tempo(provider, self.config.tempo_hard_limit_days)
    }

    /// Full refresh: both sync pipelines, the rate feeds, then the
    /// historical tables.
    pub fn fetch_apis(&self, providers: Providers<'_>) -> LedgerResult<FetchSummary> {
        log::info!("engine: fetch started");
        let consumption = self.sync_consumption(providers.consumption)?;
        let tempo = self.sync_tempo(providers.tempo)?;

        let ingestor = RateIngestor::new(&self.store, self.clock);
        let rates = ingestor.refresh_feeds(
            providers.rate_feed,
            &self.config.rate_feeds,
            self.config.rate_refresh_hours,
        )?;
        let historical_rows = ingestor.seed_historical()?;

        log::info!(
            "engine: fetch done (consumption +{}, tempo +{}, rates +{})",
            consumption.rows_written,
            tempo.rows_written,
            rates.rows_written + historical_rows
        );
        Ok(FetchSummary { consumption, tempo, rates, historical_rows })
    }

    /// Pricing over this engine's store at the contracted power.
    pub fn pricing(&self) -> LedgerResult<PricingEngine<'_>> {
        let contract = self.contract()?;
        Ok(PricingEngine::new(&self.store, contract.power_kva))
    }
}
