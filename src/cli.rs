//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{
    self as backtest_engine, BacktestConfig, BacktestResult, first_tradable_index,
};
use crate::domain::candle::Candle;
use crate::domain::config_validation::{
    build_backtest_config, date_range, parse_favorable_months, validate_data_config,
};
use crate::domain::error::BlocktraderError;
use crate::domain::indicator::IndicatorConfig;
use crate::domain::indicator::seasonal::EventCalendar;
use crate::domain::strategy::{Group, LogicOperator, Strategy, StrategyNode};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "blocktrader", about = "Block-based strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest; several strategies run as one parallel batch
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy JSON; overrides [strategy] path. Repeatable.
        #[arg(short, long)]
        strategy: Vec<PathBuf>,
        /// Write the JSON result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a strategy definition
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Compute the indicators a strategy needs and show where each becomes available
    Indicators {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<PathBuf>,
    },
}

/// Install the stderr subscriber. `RUST_LOG` wins over `level`. Returns false
/// when a subscriber is already installed.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

fn log_level(config: &dyn ConfigPort) -> String {
    config
        .get_string("logging", "level")
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, &strategy)
            } else {
                run_backtest(&config, &strategy, output.as_ref())
            }
        }
        Command::Validate { strategy } => {
            init_logging(DEFAULT_LOG_LEVEL);
            run_validate(&strategy)
        }
        Command::Indicators { config, strategy } => run_indicators(&config, strategy.as_ref()),
    }
}

fn fail(err: &BlocktraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

pub fn load_strategy(path: &Path) -> Result<Strategy, BlocktraderError> {
    let content = fs::read_to_string(path)?;
    Strategy::from_json(&content)
}

/// `--strategy` paths if given, otherwise `[strategy] path`.
pub fn resolve_strategy_paths(
    overrides: &[PathBuf],
    config: &dyn ConfigPort,
) -> Result<Vec<PathBuf>, BlocktraderError> {
    if !overrides.is_empty() {
        return Ok(overrides.to_vec());
    }
    config
        .get_path("strategy", "path")
        .map(|p| vec![p])
        .ok_or_else(|| BlocktraderError::ConfigMissing {
            section: "strategy".into(),
            key: "path".into(),
        })
}

pub fn load_strategies(paths: &[PathBuf]) -> Result<Vec<Strategy>, BlocktraderError> {
    paths
        .iter()
        .map(|path| {
            eprintln!("Loading strategy from {}", path.display());
            let strategy = load_strategy(path)?;
            strategy.validate()?;
            Ok(strategy)
        })
        .collect()
}

pub fn build_data_adapter(config: &dyn ConfigPort) -> Result<CsvAdapter, BlocktraderError> {
    validate_data_config(config)?;
    let candles = config
        .get_path("data", "candles")
        .ok_or_else(|| BlocktraderError::ConfigMissing {
            section: "data".into(),
            key: "candles".into(),
        })?;
    Ok(CsvAdapter::new(candles)
        .with_aux(config.get_path("data", "aux"))
        .with_events(config.get_path("data", "events")))
}

pub fn favorable_months(config: &dyn ConfigPort) -> Result<Vec<u32>, BlocktraderError> {
    match config.get_string("data", "favorable_months") {
        Some(value) => parse_favorable_months(&value),
        None => Ok(Vec::new()),
    }
}

/// Candles with the auxiliary series attached, plus the event calendar.
pub fn load_market_data(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
) -> Result<(Vec<Candle>, EventCalendar), BlocktraderError> {
    let (start, end) = date_range(config)?;
    let mut candles = data_port.fetch_candles(start, end)?;
    let aux = data_port.fetch_aux()?;
    if !aux.is_empty() {
        crate::domain::candle::attach_aux(&mut candles, &aux);
    }
    let mut calendar = data_port.fetch_events()?;
    calendar.set_favorable_months(favorable_months(config)?);
    Ok((candles, calendar))
}

fn run_backtest(
    config_path: &PathBuf,
    strategy_overrides: &[PathBuf],
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load config
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    init_logging(&log_level(&adapter));
    eprintln!("Loaded config from {}", config_path.display());

    // Stage 2: Backtest settings
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    // Stage 3: Strategies
    let strategies = match resolve_strategy_paths(strategy_overrides, &adapter)
        .and_then(|paths| load_strategies(&paths))
    {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    // Stage 4: Data source
    let data_adapter = match build_data_adapter(&adapter) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };

    run_backtest_pipeline(&data_adapter, &adapter, &strategies, &bt_config, output_path)
}

/// Stages 5-8: load data, simulate, summarize, report.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    strategies: &[Strategy],
    bt_config: &BacktestConfig,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 5: Market data
    let (candles, calendar) = match load_market_data(data_port, config) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => eprintln!(
            "Running backtest: {} strategies, {} bars, {} to {}",
            strategies.len(),
            candles.len(),
            first.date,
            last.date
        ),
        _ => eprintln!("Running backtest: no candles in range"),
    }

    // Stage 6: Simulate
    let results = match simulate_all(strategies, &candles, &calendar, bt_config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 7: Console summary
    for result in &results {
        print_summary(result);
    }

    // Stage 8: Report
    let report = JsonReportAdapter::new(true);
    match output_path {
        Some(path) => match report.write(&results, &path.display().to_string()) {
            Ok(()) => {
                eprintln!("\nResult written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
        None => match report.render(&results) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
    }
}

/// One strategy runs directly; several share one indicator set in a parallel
/// batch. The first failing run aborts.
pub fn simulate_all(
    strategies: &[Strategy],
    candles: &[Candle],
    calendar: &EventCalendar,
    bt_config: &BacktestConfig,
) -> Result<Vec<BacktestResult>, BlocktraderError> {
    if let [strategy] = strategies {
        return Ok(vec![backtest_engine::run_backtest(
            strategy, candles, None, calendar, bt_config,
        )?]);
    }
    let indicators = backtest_engine::prepare_indicators(strategies, candles, calendar)?;
    backtest_engine::run_batch(strategies, candles, &indicators, bt_config)
        .into_iter()
        .collect()
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== {} ({}) ===", result.strategy_name, result.strategy_id);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("Closed Trades:    {}", m.trades_count);
    eprintln!("Open Trades:      {}", m.open_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    match m.profit_factor {
        Some(pf) => eprintln!("Profit Factor:    {pf:.2}"),
        None => eprintln!("Profit Factor:    unbounded (no losing trades)"),
    }
    eprintln!("Final Equity:     {:.2}", result.final_equity);
}

fn print_indicators(configs: &[IndicatorConfig]) {
    let mut rows: Vec<(String, usize)> = configs.iter().map(|c| (c.to_string(), c.warmup())).collect();
    rows.sort();
    for (name, warmup) in rows {
        eprintln!("  {name:<32} warmup {warmup}");
    }
}

pub fn run_dry_run(config_path: &PathBuf, strategy_overrides: &[PathBuf]) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    init_logging(&log_level(&adapter));
    eprintln!("Loaded config from {}", config_path.display());

    if let Err(e) = build_backtest_config(&adapter)
        .and_then(|_| validate_data_config(&adapter))
        .and_then(|_| favorable_months(&adapter))
    {
        return fail(&e);
    }
    eprintln!("Config validated successfully");

    let strategies = match resolve_strategy_paths(strategy_overrides, &adapter)
        .and_then(|paths| load_strategies(&paths))
    {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    for strategy in &strategies {
        let required = strategy.required_indicators();
        eprintln!("\nStrategy {} ({}):", strategy.name, strategy.id);
        eprintln!("  entry conditions: {}", strategy.entry_logic.conditions().len());
        eprintln!("  exit conditions:  {}", strategy.exit_logic.conditions().len());
        eprintln!("Indicators to compute:");
        print_indicators(&required);
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn describe(group: &Group, depth: usize) {
    let pad = "  ".repeat(depth);
    let operator = match group.operator {
        LogicOperator::And => "AND",
        LogicOperator::Or => "OR",
    };
    eprintln!("{pad}{operator} [{}]", group.id);
    for child in &group.children {
        match child {
            StrategyNode::Group(g) => describe(g, depth + 1),
            StrategyNode::Condition(c) => {
                let right = match (&c.right_indicator, c.right_value) {
                    (Some(config), _) => config.to_string(),
                    (None, Some(v)) => v.to_string(),
                    (None, None) => "?".to_string(),
                };
                eprintln!("{pad}  {} {} {} [{}]", c.left, c.comparator, right, c.id);
            }
        }
    }
}

fn run_validate(strategy_path: &PathBuf) -> ExitCode {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    eprintln!("\nEntry logic:");
    describe(&strategy.entry_logic, 1);
    eprintln!("\nExit logic:");
    describe(&strategy.exit_logic, 1);

    if let Err(e) = strategy.validate() {
        return fail(&e);
    }

    let required = strategy.required_indicators();
    eprintln!("\nIndicators:");
    print_indicators(&required);
    let warmup = required.iter().map(IndicatorConfig::warmup).max().unwrap_or(0);
    eprintln!("\nNeeds at least {} bars", warmup + 1);
    eprintln!("Strategy is valid");
    ExitCode::SUCCESS
}

fn run_indicators(config_path: &PathBuf, strategy_override: Option<&PathBuf>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    init_logging(&log_level(&adapter));

    let overrides: Vec<PathBuf> = strategy_override.cloned().into_iter().collect();
    let strategies = match resolve_strategy_paths(&overrides, &adapter)
        .and_then(|paths| load_strategies(&paths))
    {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let data_adapter = match build_data_adapter(&adapter) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    let (candles, calendar) = match load_market_data(&data_adapter, &adapter) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };

    let indicators = match backtest_engine::prepare_indicators(&strategies, &candles, &calendar) {
        Ok(set) => set,
        Err(e) => return fail(&e),
    };

    let required: Vec<IndicatorConfig> = strategies
        .iter()
        .flat_map(Strategy::required_indicators)
        .collect();
    if let Err(e) = first_tradable_index(&required, candles.len()) {
        eprintln!("warning: {e}");
    }

    let mut rows: Vec<(String, Option<usize>)> = indicators
        .iter()
        .map(|s| (s.config.to_string(), s.first_valid()))
        .collect();
    rows.sort();

    println!("{} bars", candles.len());
    for (name, first) in rows {
        match first.and_then(|i| candles.get(i).map(|c| (i, c.date))) {
            Some((i, date)) => println!("{name:<32} first available at bar {i} ({date})"),
            None => println!("{name:<32} never available"),
        }
    }
    ExitCode::SUCCESS
}
