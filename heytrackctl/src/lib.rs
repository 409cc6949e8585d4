use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use heytrack_core::budget::BudgetTracker;
use heytrack_core::catalog::CatalogSummary;
use heytrack_core::hpp::HppService;
use heytrack_core::reorder::AutoReorder;
use heytrack_core::{
    load_heytrack_config, Automation, BudgetError, CatalogError, DatabaseError, HeyTrackConfig,
    ReorderError, SqliteBudgetStore, SqliteCatalogStore, SqliteDatabase, SqliteReorderStore,
    TickReport,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

pub mod commands;

use commands::budget::BudgetCommands;
use commands::catalog::{IngredientCommands, RecipeCommands};
use commands::hpp::HppCommands;
use commands::reorder::ReorderCommands;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] heytrack_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Budget(#[from] BudgetError),
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("required resource missing: {0}")]
    MissingResource(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "HeyTrack back-office command-line interface", long_about = None)]
pub struct Cli {
    /// Path to heytrack.toml
    #[arg(long, default_value = "configs/heytrack.toml")]
    pub config: PathBuf,
    /// Alternative SQLite database (overrides paths.data_dir/paths.database)
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Business snapshot: stock, budgets, open orders
    Status,
    /// Creates the database and applies the schema
    Init,
    /// Ingredient catalog and stock movements
    #[command(subcommand)]
    Ingredient(IngredientCommands),
    /// Recipes and production
    #[command(subcommand)]
    Recipe(RecipeCommands),
    /// Cost of goods (HPP) and price suggestions
    #[command(subcommand)]
    Hpp(HppCommands),
    /// Spending budgets and alerts
    #[command(subcommand)]
    Budget(BudgetCommands),
    /// Restock suggestions, suppliers and purchase orders
    #[command(subcommand)]
    Reorder(ReorderCommands),
    /// Runs the scheduled jobs until interrupted
    Run(RunArgs),
    /// Copies the live database to a file
    Backup(BackupArgs),
    /// Prints shell completions
    Completions(CompletionsArgs),
    /// Runs integrity checks
    #[command(name = "health")]
    #[command(subcommand)]
    Health(HealthCommands),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Runs a single tick and exits
    #[arg(long)]
    pub once: bool,
    /// Business date for `--once` (defaults to today)
    #[arg(long, value_name = "YYYY-MM-DD", requires = "once")]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Destination file (defaults to <data_dir>/backups/heytrack-<timestamp>.sqlite)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

#[derive(Subcommand, Debug)]
pub enum HealthCommands {
    /// Checks configuration, data directory and database integrity
    Check,
}

pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(args.shell, &mut command, "heytrackctl", &mut io::stdout());
        return Ok(());
    }

    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Status => {
            context.prepare()?;
            let status = context.gather_status(today())?;
            render(&status, cli.format)?;
        }
        Commands::Init => {
            let report = context.init()?;
            render(&report, cli.format)?;
        }
        Commands::Ingredient(command) => {
            context.prepare()?;
            commands::catalog::run_ingredient(&context, command, cli.format)?;
        }
        Commands::Recipe(command) => {
            context.prepare()?;
            commands::catalog::run_recipe(&context, command, cli.format)?;
        }
        Commands::Hpp(command) => {
            context.prepare()?;
            commands::hpp::run(&context, command, cli.format)?;
        }
        Commands::Budget(command) => {
            context.prepare()?;
            commands::budget::run(&context, command, cli.format)?;
        }
        Commands::Reorder(command) => {
            context.prepare()?;
            commands::reorder::run(&context, command, cli.format)?;
        }
        Commands::Run(args) => {
            context.prepare()?;
            context.run_automation(args, cli.format)?;
        }
        Commands::Backup(args) => {
            let report = context.backup(args)?;
            render(&report, cli.format)?;
        }
        Commands::Health(HealthCommands::Check) => {
            let report = context.health_check();
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more checks failed".to_string(),
                ));
            }
        }
        Commands::Completions(_) => {}
    }

    Ok(())
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

pub(crate) trait DisplayFallback {
    fn display(&self) -> String;
}

/// Formats an amount as rupiah with dot thousand separators, e.g. `Rp 115.000`.
pub(crate) fn rupiah(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-Rp {grouped}")
    } else {
        format!("Rp {grouped}")
    }
}

/// Configuration plus the shared database, handing out the services per command.
#[derive(Debug)]
pub struct AppContext {
    config: HeyTrackConfig,
    config_path: PathBuf,
    database: SqliteDatabase,
}

impl AppContext {
    pub fn new(cli: &Cli) -> Result<Self> {
        Self::from_paths(&cli.config, cli.database.as_deref())
    }

    pub fn from_paths(config_path: &Path, database: Option<&Path>) -> Result<Self> {
        let config = load_heytrack_config(config_path)?;
        let database_path = database
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.database_path());
        let database = SqliteDatabase::new(&database_path)?;
        Ok(Self {
            config,
            config_path: config_path.to_path_buf(),
            database,
        })
    }

    pub fn config(&self) -> &HeyTrackConfig {
        &self.config
    }

    pub fn database(&self) -> &SqliteDatabase {
        &self.database
    }

    /// Applies the schema; it is idempotent so every store-backed command calls it.
    pub fn prepare(&self) -> Result<()> {
        self.database.initialize()?;
        Ok(())
    }

    pub fn catalog(&self) -> SqliteCatalogStore {
        SqliteCatalogStore::new(self.database.clone())
    }

    pub fn hpp(&self) -> HppService {
        HppService::new(self.catalog(), self.config.hpp.clone())
    }

    pub fn budgets(&self) -> BudgetTracker {
        BudgetTracker::new(
            SqliteBudgetStore::new(self.database.clone()),
            self.config.budget.clone(),
        )
    }

    pub fn reorder(&self) -> AutoReorder {
        AutoReorder::new(
            self.catalog(),
            SqliteReorderStore::new(self.database.clone()),
            self.config.reorder.clone(),
        )
    }

    pub fn automation(&self) -> Automation {
        Automation::new(
            self.config.automation.clone(),
            self.reorder(),
            self.budgets(),
            self.hpp(),
        )
    }

    pub fn init(&self) -> Result<InitReport> {
        self.prepare()?;
        info!(database = %self.database.path().display(), "database initialized");
        Ok(InitReport {
            business_name: self.config.system.business_name.clone(),
            database: self.database.path().to_path_buf(),
        })
    }

    pub fn gather_status(&self, today: NaiveDate) -> Result<StatusReport> {
        let catalog = self.catalog().summary()?;
        let statuses = self.budgets().statuses(today)?;
        let reorder = self.reorder();
        let open_orders = reorder
            .orders(None)?
            .iter()
            .filter(|order| !order.status.is_terminal())
            .count();
        let reorder_alerts = reorder.alerts(today)?.len();

        Ok(StatusReport {
            business_name: self.config.system.business_name.clone(),
            environment: self.config.system.environment.clone(),
            today,
            catalog,
            active_budgets: statuses.len(),
            budgets_over_threshold: statuses
                .iter()
                .filter(|status| status.is_over_threshold)
                .count(),
            open_orders,
            reorder_alerts,
        })
    }

    pub fn backup(&self, args: &BackupArgs) -> Result<BackupReport> {
        if !self.database.path().exists() {
            return Err(AppError::MissingResource(format!(
                "database not found: {}",
                self.database.path().display()
            )));
        }
        let destination = match &args.output {
            Some(path) => path.clone(),
            None => self
                .config
                .resolve_path(&self.config.paths.data_dir)
                .join("backups")
                .join(format!(
                    "heytrack-{}.sqlite",
                    Local::now().format("%Y%m%d-%H%M%S")
                )),
        };
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.database.backup_to(&destination)?;
        let bytes = fs::metadata(&destination)?.len();
        info!(destination = %destination.display(), bytes, "database backup written");
        Ok(BackupReport {
            source: self.database.path().to_path_buf(),
            destination,
            bytes,
        })
    }

    pub fn health_check(&self) -> Vec<HealthEntry> {
        let data_dir = self.config.resolve_path(&self.config.paths.data_dir);
        vec![
            check_path("heytrack.toml", &self.config_path),
            check_directory("data_dir", &data_dir),
            self.check_database(),
        ]
    }

    fn check_database(&self) -> HealthEntry {
        let name = "database";
        let path = self.database.path();
        if !path.exists() {
            return HealthEntry::error(
                name,
                format!("{path} not found, run `heytrackctl init`", path = path.display()),
            );
        }
        match self.database.integrity_check() {
            Ok(result) if result.eq_ignore_ascii_case("ok") => {
                HealthEntry::ok(name, "integrity ok".to_string())
            }
            Ok(result) => HealthEntry::warn(name, format!("integrity_check: {result}")),
            Err(err) => HealthEntry::error(name, format!("failed to open: {err}")),
        }
    }

    fn run_automation(&self, args: &RunArgs, format: OutputFormat) -> Result<()> {
        let automation = self.automation();
        if args.once {
            let report = automation.run_tick(args.date.unwrap_or_else(today));
            return render(&report, format);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(async move {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("shutdown requested");
                        let _ = shutdown_tx.send(true);
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to listen for ctrl-c");
                        std::future::pending::<()>().await;
                    }
                }
            });
            let ticks = automation.run(shutdown_rx).await;
            render(&RunSummary { ticks }, format)
        })
    }
}

fn check_path(name: &str, path: &Path) -> HealthEntry {
    if path.exists() {
        HealthEntry::ok(name, format!("{}", path.display()))
    } else {
        HealthEntry::error(name, format!("{path} missing", path = path.display()))
    }
}

fn check_directory(name: &str, path: &Path) -> HealthEntry {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => HealthEntry::ok(name, format!("{}", path.display())),
        Ok(_) => HealthEntry::warn(
            name,
            format!("{path} is not a directory", path = path.display()),
        ),
        Err(_) => HealthEntry::warn(name, format!("{path} not found", path = path.display())),
    }
}

#[derive(Debug, Serialize)]
pub struct InitReport {
    pub business_name: String,
    pub database: PathBuf,
}

impl DisplayFallback for InitReport {
    fn display(&self) -> String {
        format!(
            "Database ready for {}: {}",
            self.business_name,
            self.database.display()
        )
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub business_name: String,
    pub environment: String,
    pub today: NaiveDate,
    pub catalog: CatalogSummary,
    pub active_budgets: usize,
    pub budgets_over_threshold: usize,
    pub open_orders: usize,
    pub reorder_alerts: usize,
}

impl DisplayFallback for StatusReport {
    fn display(&self) -> String {
        [
            format!("{} ({}) - {}", self.business_name, self.environment, self.today),
            "Catalog:".to_string(),
            format!("  - Active ingredients: {}", self.catalog.ingredients),
            format!("  - Active recipes: {}", self.catalog.active_recipes),
            format!("  - Low stock: {}", self.catalog.low_stock),
            format!("  - Stock value: {}", rupiah(self.catalog.stock_value)),
            "Budgets:".to_string(),
            format!("  - Active: {}", self.active_budgets),
            format!("  - Over threshold: {}", self.budgets_over_threshold),
            "Purchasing:".to_string(),
            format!("  - Open orders: {}", self.open_orders),
            format!("  - Reorder alerts today: {}", self.reorder_alerts),
        ]
        .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct BackupReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bytes: u64,
}

impl DisplayFallback for BackupReport {
    fn display(&self) -> String {
        format!(
            "Backup written to {} ({} bytes)",
            self.destination.display(),
            self.bytes
        )
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub ticks: usize,
}

impl DisplayFallback for RunSummary {
    fn display(&self) -> String {
        format!("Automation stopped after {} tick(s)", self.ticks)
    }
}

impl DisplayFallback for TickReport {
    fn display(&self) -> String {
        let field = |value: Option<usize>| {
            value
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        let mut lines = vec![
            format!(
                "Tick {}",
                self.today
                    .map(|date| date.to_string())
                    .unwrap_or_else(|| "-".to_string())
            ),
            format!(
                "  - Reorder alerts: {} (auto orders: {})",
                field(self.reorder_alerts),
                field(self.auto_orders)
            ),
            format!("  - Budgets renewed: {}", field(self.budgets_renewed)),
            format!(
                "  - HPP recalculated: {} (alerts: {})",
                field(self.hpp_calculated),
                field(self.hpp_alerts)
            ),
        ];
        for error in &self.errors {
            lines.push(format!("  ! {error}"));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(|entry| format!("[{}] {}: {}", entry.status, entry.name, entry.detail))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use heytrack_core::{NewIngredient, NewRecipe};
    use tempfile::TempDir;

    pub(crate) fn prepare_test_context() -> (TempDir, AppContext) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let configs_dir = root.join("configs");
        fs::create_dir_all(&configs_dir).unwrap();
        let config = fs::read_to_string("../configs/heytrack.toml")
            .unwrap()
            .replace("base_dir = \".\"", &format!("base_dir = {:?}", root.display().to_string()));
        fs::write(configs_dir.join("heytrack.toml"), config).unwrap();

        let cli = Cli {
            config: configs_dir.join("heytrack.toml"),
            database: None,
            format: OutputFormat::Json,
            command: Commands::Status,
        };
        let context = AppContext::new(&cli).unwrap();
        context.init().unwrap();
        (temp, context)
    }

    #[test]
    fn database_path_follows_config_base_dir() {
        let (temp, context) = prepare_test_context();
        assert_eq!(
            context.database().path(),
            temp.path().join("data").join("heytrack.sqlite")
        );
        assert!(context.database().path().exists());
    }

    #[test]
    fn database_flag_overrides_config() {
        let (temp, context) = prepare_test_context();
        let custom = temp.path().join("custom.sqlite");
        let other = AppContext::from_paths(&context.config_path, Some(&custom)).unwrap();
        other.init().unwrap();
        assert_eq!(other.database().path(), custom);
        assert!(custom.exists());
    }

    #[test]
    fn status_report_summarizes_catalog() {
        let (_temp, context) = prepare_test_context();
        let catalog = context.catalog();
        let mut flour = NewIngredient::new("Tepung Terigu", "kg", 12_000.0);
        flour.current_stock = 1.0;
        flour.min_stock = 5.0;
        let flour = catalog.add_ingredient(&flour).unwrap();
        catalog
            .add_recipe(&NewRecipe::new("Roti Tawar", 10).with_line(&flour.id, 0.5, "kg"))
            .unwrap();

        let status = context
            .gather_status(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
            .unwrap();
        assert_eq!(status.business_name, "Toko Roti Sejahtera");
        assert_eq!(status.catalog.ingredients, 1);
        assert_eq!(status.catalog.active_recipes, 1);
        assert_eq!(status.catalog.low_stock, 1);
        assert_eq!(status.open_orders, 0);
        assert!(status.display().contains("Low stock: 1"));
    }

    #[test]
    fn health_check_flags_missing_database() {
        let (temp, context) = prepare_test_context();
        let missing = AppContext::from_paths(
            &context.config_path,
            Some(&temp.path().join("absent.sqlite")),
        )
        .unwrap();
        let report = missing.health_check();
        assert!(matches!(report[0].status, CheckStatus::Ok));
        assert!(report
            .iter()
            .any(|entry| entry.name == "database" && matches!(entry.status, CheckStatus::Error)));

        let healthy = context.health_check();
        assert!(healthy
            .iter()
            .all(|entry| matches!(entry.status, CheckStatus::Ok)));
    }

    #[test]
    fn backup_copies_database() {
        let (temp, context) = prepare_test_context();
        context
            .catalog()
            .add_ingredient(&NewIngredient::new("Gula Pasir", "kg", 15_000.0))
            .unwrap();
        let destination = temp.path().join("backup").join("copy.sqlite");
        let report = context
            .backup(&BackupArgs {
                output: Some(destination.clone()),
            })
            .unwrap();
        assert_eq!(report.destination, destination);
        assert!(report.bytes > 0);

        let copy = AppContext::from_paths(&context.config_path, Some(&destination)).unwrap();
        let ingredients = copy.catalog().list_ingredients(true).unwrap();
        assert_eq!(ingredients.len(), 1);
        assert_eq!(ingredients[0].name, "Gula Pasir");
    }

    #[test]
    fn single_tick_reports_every_job() {
        let (_temp, context) = prepare_test_context();
        let report = context
            .automation()
            .run_tick(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert!(report.is_clean());
        assert_eq!(report.reorder_alerts, Some(0));
        assert_eq!(report.budgets_renewed, Some(0));
        assert_eq!(report.hpp_calculated, Some(0));
    }

    #[test]
    fn rupiah_groups_thousands() {
        assert_eq!(rupiah(0.0), "Rp 0");
        assert_eq!(rupiah(950.0), "Rp 950");
        assert_eq!(rupiah(115_000.0), "Rp 115.000");
        assert_eq!(rupiah(1_234_567.4), "Rp 1.234.567");
        assert_eq!(rupiah(-4_025.0), "-Rp 4.025");
    }

    #[test]
    fn cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "heytrackctl",
            "--format",
            "json",
            "budget",
            "expense",
            "--amount",
            "250000",
            "--category",
            "bahan_baku",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Budget(_)));
        Cli::command().debug_assert();
    }
}
