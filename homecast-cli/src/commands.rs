//! CLI command implementations

use clap::Subcommand;
use homecast_core::{
    ContentSource, DispatchError, HomecastConfig, PlaybackOutcome, ResolutionStage,
};

use crate::titles;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Play a title by name, falling back to search and the local library
    Play {
        /// Title as spoken or typed
        #[arg(required = true)]
        title: Vec<String>,
    },
    /// Play a catalog title by id
    PlayId {
        /// Catalog id such as "critical-role"
        id: String,
    },
    /// List catalog titles
    Titles,
    /// Search every streaming service without playing
    Search {
        /// Title to search for
        #[arg(required = true)]
        title: Vec<String>,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the configuration or dispatch error of the command that fails
pub async fn handle_command(command: Commands, config: &HomecastConfig) -> anyhow::Result<()> {
    match command {
        Commands::Play { title } => play(&title.join(" "), config).await,
        Commands::PlayId { id } => play_id(&id, config).await,
        Commands::Titles => list_titles(),
        Commands::Search { title } => search(&title.join(" "), config).await,
    }
}

/// Play by free text
///
/// # Errors
/// - `DispatchError` - Nothing was found or playback failed
pub async fn play(title: &str, config: &HomecastConfig) -> anyhow::Result<()> {
    let dispatcher = titles::build_dispatcher(config)?;
    report(dispatcher.play_by_free_text(title).await)
}

/// Play by catalog id
///
/// # Errors
/// - `DispatchError::UnknownId` - The id is not in the catalog
pub async fn play_id(id: &str, config: &HomecastConfig) -> anyhow::Result<()> {
    let dispatcher = titles::build_dispatcher(config)?;
    report(dispatcher.play_by_id(id).await)
}

/// Print every catalog name with its target
///
/// # Errors
/// - `CatalogError` - The built-in catalog is invalid
pub fn list_titles() -> anyhow::Result<()> {
    let catalog = titles::default_catalog()?;

    println!("{} titles:", catalog.len());
    for entry in catalog.entries() {
        let directive = &entry.directive;
        let target = match directive.source() {
            ContentSource::Static(id) => id.clone(),
            ContentSource::Lookup(_) => "(resolved on request)".to_string(),
        };
        let mut flags = Vec::new();
        if !directive.options().resume {
            flags.push("no-resume".to_string());
        }
        if let Some(skip) = &directive.options().skip_marker {
            flags.push(format!("skip {skip}"));
        }

        print!("  {:<26} {:<8} {target}", entry.id, directive.backend());
        if !flags.is_empty() {
            print!("  [{}]", flags.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Run the remote search only and print what came back
///
/// # Errors
/// - `ConfigError` - The dispatcher could not be assembled
pub async fn search(title: &str, config: &HomecastConfig) -> anyhow::Result<()> {
    let dispatcher = titles::build_dispatcher(config)?;
    let outcome = dispatcher.search_remote(title).await;

    match &outcome.best {
        Some(candidate) => {
            println!("Best match: {} ({})", candidate.title, candidate.adapter_name);
            if let Some(relevance) = candidate.relevance {
                println!("  relevance: {relevance:.2}");
            }
            println!("  handle: {}", serde_json::to_string(&candidate.handle)?);
        }
        None => println!("No matches for '{title}'"),
    }

    for record in &outcome.errors {
        println!("  {} failed: {}", record.adapter_name, record.error);
    }

    Ok(())
}

fn report(result: Result<PlaybackOutcome, DispatchError>) -> anyhow::Result<()> {
    match result {
        Ok(outcome) => {
            let via = match &outcome.stage {
                ResolutionStage::Catalog { name, score } => {
                    format!("catalog match '{name}', score {score:.2}")
                }
                ResolutionStage::RemoteSearch => "search".to_string(),
                ResolutionStage::LocalLibrary => "local library".to_string(),
            };
            println!("Playing {} on {} ({via})", outcome.title, outcome.backend);
            if let Some(launch) = &outcome.launch
                && let Some(pid) = launch.pid
            {
                println!("  player pid {pid}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            for record in e.diagnostics() {
                eprintln!("  {}: {}", record.adapter_name, record.error);
            }
            Err(e.into())
        }
    }
}
