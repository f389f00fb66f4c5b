//! wattwise-runner: headless cost report over a wattwise database.
//!
//! Usage:
//!   wattwise-runner --db ledger.db --granularity month --reference base
//!   wattwise-runner --db ledger.db --plans base,tempo,zenflex --granularity day
//!   wattwise-runner --db ledger.db --power "9 kVA" --activation 2023-04-12
//!   wattwise-runner --db ledger.db --json

use anyhow::Result;
use std::env;
use wattwise_core::{
    clock::SyncClock,
    config::AppConfig,
    engine::LedgerEngine,
    error::LedgerError,
    meter::cached_contract_conflict,
    plan::TariffPlan,
    pricing::{CostQuery, CostTable, Granularity, PricingEngine},
    providers::{MeterContract, MeterContractProvider, ProviderError},
    rates::RateIngestor,
    store::LedgerStore,
};

/// Contract given on the command line, for databases that never talked to
/// the meter API.
struct CommandLineContract {
    contract: MeterContract,
}

impl MeterContractProvider for CommandLineContract {
    fn contract(&self) -> Result<MeterContract, ProviderError> {
        Ok(self.contract.clone())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let granularity = match string_arg(&args, "--granularity").unwrap_or("month") {
        "day" => Granularity::Day,
        "month" => Granularity::Month,
        other => anyhow::bail!("unsupported granularity '{other}' (day|month)"),
    };
    let plans: Vec<TariffPlan> = match string_arg(&args, "--plans") {
        Some(list) => list
            .split(',')
            .map(|id| id.trim().parse::<TariffPlan>())
            .collect::<Result<_, _>>()?,
        None => TariffPlan::ALL.to_vec(),
    };
    let reference: TariffPlan = string_arg(&args, "--reference").unwrap_or("base").parse()?;
    let config = match string_arg(&args, "--config") {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default_test(),
    };

    println!("wattwise-runner");
    println!("  db:        {db}");
    println!("  meter:     {}", config.meter_id);
    println!("  plans:     {}", plans.iter().map(|p| p.id()).collect::<Vec<_>>().join(","));
    println!("  reference: {reference}");
    println!();

    // For :memory: use SQLite shared-memory URI so the pricing connection
    // sees the same database as the engine.
    let db_effective: String = if db == ":memory:" {
        format!("file:wattwise_{}?mode=memory&cache=shared", unix_seconds())
    } else {
        db.to_string()
    };
    let store = LedgerStore::open(&db_effective)?;
    store.migrate()?;

    let engine = LedgerEngine::new(store, config, SyncClock::System);
    RateIngestor::new(&engine.store, engine.clock).seed_historical()?;

    let contract = match (string_arg(&args, "--power"), string_arg(&args, "--activation")) {
        (Some(power), Some(activation)) => {
            let contract = MeterContract {
                subscribed_power:     power.to_string(),
                last_activation_date: activation.to_string(),
            };
            if let Some(cached) = cached_contract_conflict(&engine.store, &contract)? {
                log::warn!(
                    "runner: ignoring --power {power} --activation {activation}, \
                     stored contract is {} kVA active since {}",
                    cached.power_kva,
                    cached.activation_date
                );
            }
            engine.load_contract(&CommandLineContract { contract })?
        }
        _ => match engine.contract() {
            Ok(contract) => contract,
            Err(LedgerError::MeterContractMissing) => {
                println!("No meter contract stored; pass --power and --activation.");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        },
    };

    let reader = engine.store.reopen()?;
    let pricing = PricingEngine::new(&reader, contract.power_kva);
    let table = pricing.compute(&CostQuery::new(&plans, granularity).with_total())?;
    log::info!("runner: {} cost rows for {} plans", table.rows.len(), table.plans.len());

    if args.iter().any(|a| a == "--json") {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        print_table(&table, reference, contract.power_kva);
    }
    Ok(())
}

fn print_table(table: &CostTable, reference: TariffPlan, power_kva: u32) {
    println!("=== COSTS ({power_kva} kVA) ===");
    if table.rows.is_empty() {
        println!("  (No consumption stored yet)");
        return;
    }

    let mut header = format!("  {:<10} {:>10}", "period", "kWh");
    for plan in &table.plans {
        header.push_str(&format!(" {:>18}", plan.id()));
    }
    println!("{header}");

    for row in table.rows.iter().chain(table.total.iter()) {
        let relative = row.relative_to(reference);
        let mut line = format!("  {:<10} {:>10.1}", row.key, row.energy_wh as f64 / 1000.0);
        for plan in &table.plans {
            let cost = row.cost(*plan);
            let cell = match relative.get(plan).copied().flatten() {
                Some(diff) if *plan != reference => format!("{cost} ({:+.0}%)", diff * 100.0),
                _ => cost.to_string(),
            };
            line.push_str(&format!(" {cell:>18}"));
        }
        println!("{line}");
    }
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn unix_seconds() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
