//! Meter contract: contracted power tier and activation date.
//!
//! Fetched once from the provider, then served from the settings store for
//! the lifetime of the database.

use crate::{
    error::{LedgerError, LedgerResult},
    providers::{MeterContract, MeterContractProvider},
    store::LedgerStore,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const METER_INFO_KEY: &str = "meter_info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub power_kva:       u32,
    pub activation_date: NaiveDate,
}

impl ContractInfo {
    pub fn from_contract(contract: &MeterContract) -> LedgerResult<Self> {
        let magnitude = contract
            .subscribed_power
            .split_whitespace()
            .next()
            .unwrap_or_default();
        let power_kva = magnitude.parse::<u32>().map_err(|_| LedgerError::InvalidMeterContract {
            reason: format!("subscribed power '{}'", contract.subscribed_power),
        })?;

        let date_prefix = contract.last_activation_date.get(..10).ok_or_else(|| {
            LedgerError::InvalidMeterContract {
                reason: format!("activation date '{}'", contract.last_activation_date),
            }
        })?;
        let activation_date = NaiveDate::parse_from_str(date_prefix, "%Y-%m-%d").map_err(|e| {
            LedgerError::InvalidMeterContract {
                reason: format!("activation date '{}': {e}", contract.last_activation_date),
            }
        })?;

        Ok(Self { power_kva, activation_date })
    }
}

/// Cached contract, if one was stored by an earlier run.
pub fn cached_meter_contract(store: &LedgerStore) -> LedgerResult<Option<ContractInfo>> {
    match store.setting(METER_INFO_KEY)? {
        Some(json) => {
            let contract: MeterContract = serde_json::from_str(&json)?;
            ContractInfo::from_contract(&contract).map(Some)
        }
        None => Ok(None),
    }
}

/// Cached contract when it differs from `contract`. The cache wins in
/// `load_meter_contract`, so a caller holding its own values can report it.
pub fn cached_contract_conflict(
    store: &LedgerStore,
    contract: &MeterContract,
) -> LedgerResult<Option<ContractInfo>> {
    let Some(cached) = cached_meter_contract(store)? else {
        return Ok(None);
    };
    let given = ContractInfo::from_contract(contract)?;
    Ok((given != cached).then_some(cached))
}

/// Return the cached contract or fetch and cache it. Only a contract that
/// parses is cached.
pub fn load_meter_contract(
    store: &LedgerStore,
    provider: &dyn MeterContractProvider,
) -> LedgerResult<ContractInfo> {
    if let Some(info) = cached_meter_contract(store)? {
        return Ok(info);
    }

    let contract = provider.contract()?;
    let info = ContractInfo::from_contract(&contract)?;
    store.put_setting(METER_INFO_KEY, &serde_json::to_string(&contract)?)?;
    log::info!(
        "meter: cached contract ({} kVA, active since {})",
        info.power_kva,
        info.activation_date
    );
    Ok(info)
}
