//! Command-line definitions and handlers.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use entcache_core::store::lines::SEED_PEOPLE;
use entcache_core::{
    AppConfig, Cache, CacheEvent, CacheOperation, EntityId, Error, InitMode, Person, PersonTranslator, StoreBackend,
};
use serde::Serialize;

use crate::backend;

/// entcache - a write-through cache of people over a pluggable store.
#[derive(Parser, Debug)]
#[command(name = "entcache", author, version)]
#[command(long_about = r#"entcache keeps an in-memory index of people in step with a durable store.

Every command prints one JSON object per line on stdout.

Configuration is read from ENTCACHE_CONFIG_FILE (TOML) and ENTCACHE_* environment
variables; the flags below override both.

Examples:
    entcache --backend lines seed
    entcache get 3
    entcache --lazy update 3 ddd 31
    entcache --watch remove 9
"#)]
pub struct Cli {
    /// Persistence backend (sqlite/lines/memory).
    #[arg(long, global = true, value_enum, value_name = "BACKEND")]
    pub backend: Option<BackendArg>,

    /// SQLite database path.
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Line-per-record file path.
    #[arg(long, global = true, value_name = "PATH")]
    pub lines_path: Option<PathBuf>,

    /// Populate the cache on demand instead of loading everything up front.
    #[arg(long, global = true)]
    pub lazy: bool,

    /// Print change notifications to stderr.
    #[arg(long, global = true)]
    pub watch: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print one person, or null if absent.
    Get { id: EntityId },

    /// Print every cached person.
    List,

    /// Add a new person.
    Add { id: EntityId, name: String, age: u32 },

    /// Replace an existing person.
    Update { id: EntityId, name: String, age: u32 },

    /// Remove a person.
    Remove { id: EntityId },

    /// Add the ten sample people, skipping ids that already exist.
    Seed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Sqlite,
    Lines,
    Memory,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Sqlite => StoreBackend::Sqlite,
            BackendArg::Lines => StoreBackend::Lines,
            BackendArg::Memory => StoreBackend::Memory,
        }
    }
}

#[derive(Debug, Serialize)]
struct SeedOutput {
    added: usize,
    skipped: usize,
}

impl Cli {
    /// Load layered configuration and apply command-line overrides.
    pub fn resolve_config(&self) -> Result<AppConfig> {
        let config = AppConfig::load()?;
        self.apply(config)
    }

    fn apply(&self, mut config: AppConfig) -> Result<AppConfig> {
        if let Some(backend) = self.backend {
            config.backend = backend.into();
        }
        if let Some(path) = &self.db_path {
            config.db_path = path.clone();
        }
        if let Some(path) = &self.lines_path {
            config.lines_path = path.clone();
        }
        if self.lazy {
            config.init_mode = InitMode::Lazy;
        }
        if self.log_json {
            config.log_json = true;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run the parsed command, writing results to `out`.
pub fn run(cli: &Cli, config: &AppConfig, out: &mut impl Write) -> Result<()> {
    let provider = backend::open(config)?;
    let cache: Cache<Person, _, _> = Cache::with_mode(provider, PersonTranslator, config.init_mode);

    if cli.watch {
        cache.subscribe(|event| match serde_json::to_string(event) {
            Ok(line) => eprintln!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize notification"),
        });
    }

    cache.init()?;

    match &cli.command {
        Command::Get { id } => emit(out, &cache.get(*id)?)?,
        Command::List => {
            for person in cache.entities()? {
                emit(out, &person)?;
            }
        }
        Command::Add { id, name, age } => {
            cache.add(Person::new(*id, name.as_str(), *age))?;
            emit(out, &CacheEvent { operation: CacheOperation::Add, id: *id })?;
        }
        Command::Update { id, name, age } => {
            cache.update(Person::new(*id, name.as_str(), *age))?;
            emit(out, &CacheEvent { operation: CacheOperation::Update, id: *id })?;
        }
        Command::Remove { id } => {
            cache.remove(*id)?;
            emit(out, &CacheEvent { operation: CacheOperation::Remove, id: *id })?;
        }
        Command::Seed => {
            let mut output = SeedOutput { added: 0, skipped: 0 };
            for (id, (name, age)) in SEED_PEOPLE.iter().enumerate() {
                match cache.add(Person::new(id as EntityId, *name, *age)) {
                    Ok(()) => output.added += 1,
                    Err(Error::AlreadyExists(_)) => output.skipped += 1,
                    Err(e) => return Err(e.into()),
                }
            }
            tracing::info!(added = output.added, skipped = output.skipped, "Seeded sample people");
            emit(out, &output)?;
        }
    }

    Ok(())
}

fn emit<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
