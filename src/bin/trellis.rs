//! Trellis CLI: validate a requirement graph and run policy-driven fixes.
//!
//! Usage:
//!   trellis import <records.json> [--db path]
//!   trellis validate [--json] [--rules path] [--ontology path]
//!   trellis plan [--policy path]
//!   trellis fix [--dry-run] [--policy path]
//!   trellis apply <changeset-id>... [--approver name]
//!   trellis rollback <changeset-id> [--actor name]
//!   trellis history

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trellis::fix::DEFAULT_APPLIER;
use trellis::graph::requirement_set;
use trellis::{
    ChangeEngine, ChangeSet, FixExecutor, FixPolicy, FixResult, OpenStore,
    Requirement, RequirementSet, RequirementStore, SqliteStore, ValidateOptions, ValidationConfig,
    ValidationEngine,
};

#[derive(Parser)]
#[command(
    name = "trellis",
    version,
    about = "Requirement graph validation and fix engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Validation rule file (YAML)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    /// Ontology file (YAML)
    #[arg(long, global = true)]
    ontology: Option<PathBuf>,
    /// Fix policy file (YAML)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,
    /// Read records from a JSON array instead of the database.
    /// Runs against a file never write records back.
    #[arg(long, global = true)]
    input: Option<PathBuf>,
    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load records from a JSON array into the database
    Import {
        /// JSON file holding an array of requirements
        path: PathBuf,
    },
    /// Validate every record and print a markdown report
    Validate {
        /// Print results as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Print the fix plan for the current violations
    Plan,
    /// Run the plan -> apply -> revalidate loop
    Fix {
        /// Report what would happen without saving anything
        #[arg(long)]
        dry_run: bool,
        /// Identity recorded on applied change sets
        #[arg(long, default_value = DEFAULT_APPLIER)]
        applier: String,
    },
    /// Approve and apply proposed change sets
    Apply {
        /// Change set ids, applied in the order given
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long, default_value = "cli")]
        approver: String,
    },
    /// Roll back an applied change set
    Rollback {
        /// Change set id
        id: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// List logged change sets
    History,
}

/// Get the default database path (~/.local/share/trellis/trellis.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let trellis_dir = data_dir.join("trellis");
    std::fs::create_dir_all(&trellis_dir).ok();
    trellis_dir.join("trellis.db")
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "trellis=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(db: Option<&Path>) -> Result<SqliteStore, String> {
    let db_path = db.map(Path::to_path_buf).unwrap_or_else(default_db_path);
    SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))
}

fn read_records_file(path: &Path) -> Result<RequirementSet, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let records: Vec<Requirement> = serde_json::from_str(&text)
        .map_err(|e| format!("invalid records in '{}': {}", path.display(), e))?;
    Ok(requirement_set(records))
}

impl Cli {
    /// Whether records loaded for this run may be written back to the store
    fn writes_records(&self) -> bool {
        self.input.is_none()
    }
}

fn load_records(cli: &Cli, store: &SqliteStore) -> Result<RequirementSet, String> {
    match &cli.input {
        Some(path) => read_records_file(path),
        None => store
            .get_all()
            .map_err(|e| format!("Failed to load records: {}", e)),
    }
}

fn build_engine(cli: &Cli) -> ValidationEngine {
    let config = cli
        .rules
        .as_ref()
        .map(ValidationConfig::load_or_default)
        .unwrap_or_default();
    let mut engine = ValidationEngine::new(config);
    if let Some(ontology) = cli.ontology.as_ref().and_then(trellis::Ontology::load_or_none) {
        engine = engine.with_ontology(ontology);
    }
    engine
}

fn load_policy(cli: &Cli) -> Result<FixPolicy, String> {
    match &cli.policy {
        Some(path) => FixPolicy::load(path)
            .map_err(|e| format!("invalid fix policy '{}': {}", path.display(), e)),
        None => Ok(FixPolicy::default()),
    }
}

fn cmd_import(store: &SqliteStore, path: &Path) -> i32 {
    let records = match read_records_file(path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    for req in records.values() {
        if let Err(e) = store.upsert(req) {
            eprintln!("Error: {}", e);
            return 1;
        }
    }
    println!("Imported {} requirement(s)", records.len());
    0
}

async fn cmd_validate(engine: &ValidationEngine, records: &RequirementSet, json: bool) -> i32 {
    let options = ValidateOptions::default().with_refreshed_metrics();
    let results = engine.validate_all(records, options).await;
    if json {
        match serde_json::to_string_pretty(&results) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    } else {
        print!("{}", engine.generate_report(&results, records));
    }
    0
}

fn cmd_plan(engine: &ValidationEngine, policy: FixPolicy, records: &RequirementSet) -> i32 {
    let executor = FixExecutor::new(policy);
    let violations = engine.violations(records);
    print!("{}", executor.preview_fixes(&violations, records));
    0
}

fn print_fix_result(result: &FixResult) {
    println!(
        "Stopped: {} after {} iteration(s)",
        result.stop_reason, result.iterations
    );
    if let Some(error) = &result.error {
        println!("Error: {}", error);
    }
    println!("Applied change sets: {}", result.applied.len());
    for cs in &result.applied {
        print_change_set_line(cs);
    }
    println!("Proposed change sets (need approval): {}", result.proposed.len());
    for cs in &result.proposed {
        print_change_set_line(cs);
    }
    println!("Remaining violations: {}", result.remaining.len());
}

fn print_change_set_line(cs: &ChangeSet) {
    let ops: Vec<&str> = cs.operations().map(|op| op.as_str()).collect();
    println!(
        "  {}  [{}]  {}  {}",
        cs.id,
        cs.violations.join(","),
        ops.join(","),
        cs.status
    );
}

fn cmd_fix(
    store: &SqliteStore,
    engine: &ValidationEngine,
    policy: FixPolicy,
    records: &RequirementSet,
    save: bool,
    applier: &str,
) -> i32 {
    let executor = FixExecutor::new(policy).with_applier(applier);
    let result = executor.run_fix_loop(records, |r| Ok::<_, Infallible>(engine.violations(r)));
    print_fix_result(&result);

    if !save {
        println!("Dry run: nothing saved");
        return if result.success { 0 } else { 1 };
    }
    if let Err(e) = store.replace_all(&result.records) {
        eprintln!("Error: {}", e);
        return 1;
    }
    for cs in result.applied.iter().chain(&result.proposed) {
        if let Err(e) = store.save_change_set(cs) {
            eprintln!("Error: {}", e);
            return 1;
        }
    }
    info!(applied = result.applied.len(), proposed = result.proposed.len(), "fix run saved");
    if result.success {
        0
    } else {
        1
    }
}

fn cmd_apply(
    store: &SqliteStore,
    policy: FixPolicy,
    records: &RequirementSet,
    ids: &[String],
    approver: &str,
) -> i32 {
    let mut candidates = Vec::new();
    for id in ids {
        match store.load_change_set(id) {
            Ok(Some(cs)) => candidates.push(cs),
            Ok(None) => eprintln!("Warning: change set '{}' not found", id),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }

    let executor = FixExecutor::new(policy);
    let result = executor.apply_selected(ids, &mut candidates, records, approver);
    if let Err(e) = store.replace_all(&result.records) {
        eprintln!("Error: {}", e);
        return 1;
    }
    for cs in &candidates {
        if let Err(e) = store.save_change_set(cs) {
            eprintln!("Error: {}", e);
            return 1;
        }
    }
    for cs in &result.applied {
        print_change_set_line(cs);
    }
    if result.applied.len() == ids.len() {
        println!("Applied {} change set(s)", result.applied.len());
        0
    } else {
        eprintln!(
            "Applied {} of {} change set(s)",
            result.applied.len(),
            ids.len()
        );
        1
    }
}

fn cmd_rollback(store: &SqliteStore, records: &RequirementSet, id: &str, actor: &str) -> i32 {
    let mut cs = match store.require_change_set(id) {
        Ok(cs) => cs,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let outcome = ChangeEngine::new().rollback(&mut cs, records, actor);
    if !outcome.success {
        for e in &outcome.errors {
            eprintln!("Error: {}", e);
        }
        return 1;
    }
    if let Err(e) = store
        .replace_all(&outcome.records)
        .and_then(|_| store.save_change_set(&cs))
    {
        eprintln!("Error: {}", e);
        return 1;
    }
    println!("Rolled back change set '{}'", id);
    0
}

fn cmd_history(store: &SqliteStore) -> i32 {
    let change_sets = match store.list_change_sets() {
        Ok(list) => list,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if change_sets.is_empty() {
        println!("No change sets logged.");
        return 0;
    }
    println!("{:<40}  {:<12}  {:<10}  {}", "ID", "STATUS", "REVERSIBLE", "ADDRESSES");
    println!("{}", "-".repeat(80));
    for cs in change_sets {
        println!(
            "{:<40}  {:<12}  {:<10}  {}",
            cs.id,
            cs.status.as_str(),
            if cs.reversible { "yes" } else { "no" },
            cs.violations.join(",")
        );
    }
    0
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = match open_store(cli.db.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Commands::Import { path } = &cli.command {
        std::process::exit(cmd_import(&store, path));
    }
    if let Commands::History = &cli.command {
        std::process::exit(cmd_history(&store));
    }

    let records = match load_records(&cli, &store) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if records.is_empty() {
        warn!("no requirements loaded");
    }

    let engine = build_engine(&cli);
    let mutates_store = matches!(
        cli.command,
        Commands::Apply { .. } | Commands::Rollback { .. }
    );
    if mutates_store && !cli.writes_records() {
        eprintln!("Error: apply and rollback work on stored records; drop --input");
        std::process::exit(1);
    }
    let code = match &cli.command {
        Commands::Validate { json } => cmd_validate(&engine, &records, *json).await,
        Commands::Plan => match load_policy(&cli) {
            Ok(policy) => cmd_plan(&engine, policy, &records),
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Fix { dry_run, applier } => match load_policy(&cli) {
            Ok(policy) => {
                if !cli.writes_records() && !*dry_run {
                    warn!("records came from --input, fix results are not saved");
                }
                let save = cli.writes_records() && !*dry_run;
                cmd_fix(&store, &engine, policy, &records, save, applier)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Apply { ids, approver } => match load_policy(&cli) {
            Ok(policy) => cmd_apply(&store, policy, &records, ids, approver),
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Rollback { id, actor } => cmd_rollback(&store, &records, id, actor),
        Commands::Import { .. } | Commands::History => 0,
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis::{RequirementType, ReqId};

    fn stored() -> RequirementSet {
        requirement_set(vec![
            Requirement::new(
                "STK-1",
                RequirementType::Stakeholder,
                "Alerts",
                "Operators need timely alerts about failed payment runs.",
            ),
            Requirement::new(
                "SYS-1",
                RequirementType::System,
                "Export",
                "Export payment reports as needed.",
            )
            .refining("STK-1"),
            Requirement::new(
                "SYS-2",
                RequirementType::System,
                "Retry",
                "The system shall retry failed payment runs once per hour.",
            )
            .refining("STK-1"),
        ])
    }

    #[test]
    fn input_file_runs_do_not_write_records() {
        let cli = Cli::parse_from(["trellis", "--input", "subset.json", "fix"]);
        assert!(!cli.writes_records());
        let cli = Cli::parse_from(["trellis", "fix"]);
        assert!(cli.writes_records());
    }

    #[test]
    fn unsaved_fix_leaves_other_stored_records_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.replace_all(&stored()).unwrap();

        let mut subset = stored();
        subset.remove(&ReqId::from("SYS-2"));
        let engine = ValidationEngine::default();
        let code = cmd_fix(&store, &engine, FixPolicy::default(), &subset, false, "tester");

        assert_eq!(code, 0);
        assert_eq!(store.get_all().unwrap(), stored());
        assert!(store.list_change_sets().unwrap().is_empty());
    }

    #[test]
    fn rollback_of_unknown_change_set_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(cmd_rollback(&store, &stored(), "CS-missing", "tester"), 1);
    }
}
