//! Forecast Edge command-line driver
//!
//! Reads a JSON array of market snapshots and prints decisions as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use forecast_edge::alerts::{Alert, AlertLog};
use forecast_edge::arbitrage::{ArbitrageOpportunity, ArbitrageScanner};
use forecast_edge::backtesting::Backtester;
use forecast_edge::config::AppConfig;
use forecast_edge::ensemble::{EnsembleResult, ProbabilityEnsemble};
use forecast_edge::logging;
use forecast_edge::portfolio::{expected_bet_return, PortfolioOptimizer};
use forecast_edge::sizing::{calculate_optimal_bet, detect_mispricing, Mispricing};
use forecast_edge::types::{AllocationPlan, BetRecommendation, MarketSnapshot, Signal};

/// Forecast Edge - probability fusion and bet sizing for prediction markets.
#[derive(Parser, Debug)]
#[command(name = "forecast-edge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Extra configuration file layered over config/default and config/local
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fuse probabilities and size a bet for every open market
    Analyze {
        /// JSON file with an array of market snapshots
        markets: PathBuf,
    },
    /// Scan markets for arbitrage and allocate capital to each hit
    Scan {
        markets: PathBuf,
        /// Capital per opportunity (defaults to the configured bankroll)
        #[arg(long)]
        capital: Option<f64>,
    },
    /// Split capital across open markets with the portfolio optimizer
    Suggest {
        markets: PathBuf,
        #[arg(long)]
        capital: Option<f64>,
    },
    /// Replay resolved markets through the sizer
    Backtest {
        markets: PathBuf,
        /// Compare every configured strategy instead of a single run
        #[arg(long)]
        compare: bool,
    },
}

#[derive(Serialize)]
struct MarketAnalysis {
    market_id: String,
    question: String,
    market_probability: f64,
    ensemble: EnsembleResult,
    bet: Signal<BetRecommendation>,
    mispricing: Signal<Mispricing>,
}

/// Command output together with the alerts it raised
#[derive(Serialize)]
struct Report<'a, T> {
    results: T,
    alerts: Vec<&'a Alert>,
}

#[derive(Serialize)]
struct ScanHit {
    opportunity: ArbitrageOpportunity,
    allocation: Option<AllocationPlan>,
}

fn load_markets(path: &Path) -> Result<Vec<MarketSnapshot>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let markets: Vec<MarketSnapshot> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse market snapshots from {}", path.display()))?;
    info!("Loaded {} markets from {}", markets.len(), path.display());
    Ok(markets)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn analyze(config: &AppConfig, markets: &[MarketSnapshot]) -> Result<()> {
    let ensemble = ProbabilityEnsemble::new(config.ensemble.weights);
    let policy = config.sizing.policy();
    let mut alerts = AlertLog::new(config.alerts.history_limit);

    let analyses: Vec<MarketAnalysis> = markets
        .iter()
        .filter(|m| !m.is_resolved)
        .map(|market| {
            let fused = ensemble.predict(market);
            let bet = calculate_optimal_bet(
                config.sizing.bankroll,
                fused.probability,
                market.probability,
                market.liquidity_or(config.sizing.default_liquidity),
                &policy,
            );
            let mispricing = detect_mispricing(
                fused.probability,
                market.probability,
                config.sizing.min_confidence,
                config.sizing.min_edge,
            );
            if let (Signal::Found(b), true) = (&bet, mispricing.is_found()) {
                alerts.trading_opportunity(&market.question, b);
            }
            MarketAnalysis {
                market_id: market.id.clone(),
                question: market.question.clone(),
                market_probability: market.probability,
                ensemble: fused,
                bet,
                mispricing,
            }
        })
        .collect();

    info!(
        markets = analyses.len(),
        bets = analyses.iter().filter(|a| a.bet.is_found()).count(),
        alerts = alerts.len(),
        "analysis complete"
    );
    print_json(&Report {
        results: analyses,
        alerts: alerts.history(alerts.len()),
    })
}

fn scan(config: &AppConfig, markets: &[MarketSnapshot], capital: f64) -> Result<()> {
    let scanner = ArbitrageScanner::new(config.arbitrage);
    let mut alerts = AlertLog::new(config.alerts.history_limit);

    let hits: Vec<ScanHit> = scanner
        .scan(markets)
        .into_iter()
        .map(|opportunity| {
            alerts.arbitrage_opportunity(&opportunity);
            ScanHit {
                allocation: scanner.allocate(&opportunity, capital),
                opportunity,
            }
        })
        .collect();

    print_json(&Report {
        results: hits,
        alerts: alerts.history(alerts.len()),
    })
}

fn suggest(config: &AppConfig, markets: &[MarketSnapshot], capital: f64) -> Result<()> {
    let ensemble = ProbabilityEnsemble::new(config.ensemble.weights);
    let optimizer = PortfolioOptimizer::new(config.portfolio);

    let mut candidates = Vec::new();
    let mut returns = Vec::new();
    for market in markets.iter().filter(|m| !m.is_resolved) {
        let estimate = ensemble.predict(market).probability;
        match expected_bet_return(estimate, market.probability) {
            Some(r) => {
                candidates.push(market.clone());
                returns.push(r);
            }
            None => warn!(market = %market.id, "skipping market with invalid probability"),
        }
    }

    let suggestions = optimizer.suggest_position_sizes(&candidates, capital, &returns);
    print_json(&suggestions)
}

fn backtest(config: &AppConfig, markets: &[MarketSnapshot], compare: bool) -> Result<()> {
    let ensemble = ProbabilityEnsemble::new(config.ensemble.weights);
    let mut backtester = Backtester::new(config.backtest.initial_capital)
        .with_policy(config.sizing.policy())
        .with_default_liquidity(config.sizing.default_liquidity)
        .with_estimator(Box::new(ensemble));

    if compare {
        let table = backtester.compare(markets, &config.backtest.strategies);
        print_json(&table)
    } else {
        let metrics = backtester.run(
            markets,
            config.sizing.kelly_fraction,
            config.sizing.min_edge,
        );
        print_json(&metrics)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs);

    let config = AppConfig::load_with(cli.config.as_deref())?;
    info!("Config: {}", config);

    match cli.command {
        Commands::Analyze { markets } => analyze(&config, &load_markets(&markets)?),
        Commands::Scan { markets, capital } => scan(
            &config,
            &load_markets(&markets)?,
            capital.unwrap_or(config.sizing.bankroll),
        ),
        Commands::Suggest { markets, capital } => suggest(
            &config,
            &load_markets(&markets)?,
            capital.unwrap_or(config.sizing.bankroll),
        ),
        Commands::Backtest { markets, compare } => {
            backtest(&config, &load_markets(&markets)?, compare)
        }
    }
}
