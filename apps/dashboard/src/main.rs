mod config;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    search::total_results, AppContext, DashboardClient, DropEvent, DropOutcome, LanePosition,
    QueryState, QueryStatus, QueryUnit, RecommendationBoard, SearchIndex, SearchSelection,
    SectionOrchestrator,
};
use shared::{
    domain::{BrandId, PromptId, RecommendationId, RecommendationStatus, SectionKind},
    protocol::{PromptDetailResponse, SectionPayload},
};
use storage::{DocumentStore, Storage};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Brand visibility dashboard client")]
struct Args {
    /// Overrides `api_base_url` from settings.
    #[arg(long)]
    api_base_url: Option<String>,
    /// Overrides `cache_database_url` from settings.
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    brand: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Health,
    Brands,
    Prompts,
    /// Shows one prompt with its runs; without an id nothing is fetched.
    Prompt {
        id: Option<String>,
    },
    Sources,
    Metrics,
    Visibility,
    /// Searches prompts, brands and sources.
    Search {
        query: String,
    },
    /// Shows report sections, generating any that are not cached yet.
    Sections {
        #[arg(long, conflicts_with = "retry")]
        regenerate: bool,
        #[arg(long)]
        retry: Option<SectionKind>,
    },
    Board {
        #[arg(long)]
        generate: bool,
        #[arg(long, requires = "generate")]
        force_refresh: bool,
    },
    /// Moves a recommendation card to another lane.
    Move {
        id: String,
        status: RecommendationStatus,
    },
    ToggleSidebar,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(v) = args.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = args.database_url {
        settings.cache_database_url = v;
    }
    if let Some(v) = args.brand {
        settings.brand_id = v;
    }

    let api_base_url = config::validate_api_base_url(&settings.api_base_url)?;
    let database_url = config::prepare_database_url(&settings.cache_database_url)?;
    let store: Arc<dyn DocumentStore> = Arc::new(
        Storage::new(&database_url)
            .await
            .with_context(|| format!("failed to open cache database '{database_url}'"))?,
    );
    let client = Arc::new(DashboardClient::new(api_base_url));
    let brand_id = BrandId::new(settings.brand_id.clone());
    let app = AppContext::init(Arc::clone(&store)).await;
    info!(api = client.base_url(), %database_url, brand = %brand_id, "dashboard client ready");

    match args.command {
        Command::Health => {
            client.health().await?;
            println!("ok");
        }
        Command::Brands => print_json(&client.brands().await?)?,
        Command::Prompts => print_json(&client.prompts().await?)?,
        Command::Prompt { id } => {
            let detail = prompt_detail_query(Arc::clone(&client));
            match id {
                Some(id) => {
                    detail.set_dependency(PromptId::new(id), true).await;
                }
                None => detail.disable().await,
            }
            let state = detail.state();
            match (state.status, state.data) {
                (QueryStatus::Success, Some(prompt)) => print_json(&prompt)?,
                (QueryStatus::Error, _) => {
                    return Err(anyhow!(state.error.unwrap_or_default()));
                }
                _ => println!("no prompt selected"),
            }
        }
        Command::Sources => print_json(&client.sources().await?)?,
        Command::Metrics => print_json(&client.metrics().await?)?,
        Command::Visibility => print_json(&client.visibility().await?)?,
        Command::Search { query } => search(&client, &query, settings.search_debounce()).await?,
        Command::Sections { regenerate, retry } => {
            let orchestrator =
                SectionOrchestrator::restore(brand_id, &SectionKind::ALL, client, store).await;
            if regenerate {
                orchestrator.regenerate_all().await;
            } else if let Some(kind) = retry {
                if orchestrator.retry(kind).await.is_none() {
                    return Err(anyhow!("section {kind} is not part of this report"));
                }
            } else {
                orchestrator.generate_missing().await;
            }
            for (kind, state) in orchestrator.states() {
                print_section(kind, &state, orchestrator.generated_at(kind).await);
            }
        }
        Command::Board {
            generate,
            force_refresh,
        } => {
            let board = RecommendationBoard::new(client);
            if generate {
                board.generate(&brand_id, force_refresh).await?;
            } else {
                board.load(&brand_id).await?;
            }
            print_board(&board);
        }
        Command::Move { id, status } => {
            let board = RecommendationBoard::new(client);
            board.load(&brand_id).await?;
            let outcome = board.handle_drop(drop_into(&board, id, status)?).await;
            match outcome {
                DropOutcome::NoOp => println!("card already in {status}"),
                DropOutcome::Committed(status) => println!("moved to {status}"),
                DropOutcome::RolledBack(err) => println!("move rejected, board restored: {err}"),
            }
            print_board(&board);
        }
        Command::ToggleSidebar => {
            let open = app.toggle_sidebar().await;
            println!("sidebar {}", if open { "open" } else { "closed" });
        }
    }

    app.teardown().await
}

/// Detail query that only runs once a prompt id is known.
fn prompt_detail_query(client: Arc<DashboardClient>) -> QueryUnit<PromptId, PromptDetailResponse> {
    QueryUnit::new(move |prompt_id: PromptId| {
        let client = Arc::clone(&client);
        async move { client.prompt_detail(&prompt_id).await }
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn search(
    client: &DashboardClient,
    query: &str,
    debounce: std::time::Duration,
) -> Result<()> {
    let (prompts, brands, sources) =
        tokio::try_join!(client.prompts(), client.brands(), client.sources())?;
    let index = Arc::new(SearchIndex::new(&prompts, &brands, &sources));
    let search = client_core::spawn_debounced_search(index, debounce);
    let mut results = search.results();
    search.set_query(query);
    results.changed().await?;

    let groups = results.borrow_and_update().clone();
    if groups.is_empty() {
        println!("no results for '{query}'");
        return Ok(());
    }
    println!("{} results", total_results(&groups));
    for group in &groups {
        println!("{}", group.label);
        for result in &group.results {
            match &result.subtitle {
                Some(subtitle) => println!("  {} ({subtitle})  {}", result.title, result.href),
                None => println!("  {}  {}", result.title, result.href),
            }
        }
    }
    let mut selection = SearchSelection::new(&groups);
    selection.select_next();
    if let Some(first) = selection.current() {
        println!("-> {}", first.href);
    }
    Ok(())
}

fn print_section(
    kind: SectionKind,
    state: &QueryState<SectionPayload>,
    generated_at: Option<chrono::DateTime<chrono::Utc>>,
) {
    let status = match state.status {
        QueryStatus::Idle => "idle".to_string(),
        QueryStatus::Loading => "loading".to_string(),
        QueryStatus::Success => match generated_at {
            Some(at) => format!("ready, generated {}", at.to_rfc3339()),
            None => "ready".to_string(),
        },
        QueryStatus::Error => format!(
            "failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        ),
    };
    let items = state.data.as_ref().map(SectionPayload::item_count);
    match items {
        Some(count) => println!("{kind}: {status} ({count} items)"),
        None => println!("{kind}: {status}"),
    }
}

fn print_board(board: &RecommendationBoard) {
    let snapshot = board.snapshot();
    for status in RecommendationStatus::ALL {
        println!("{status} ({})", snapshot.counts.get(status));
        for card in snapshot.lane(status) {
            println!("  [{}] #{} {}", card.id, card.rank, card.title);
        }
    }
    println!("{}% complete", snapshot.completion_percent());
}

fn drop_into(
    board: &RecommendationBoard,
    id: String,
    status: RecommendationStatus,
) -> Result<DropEvent> {
    let snapshot = board.snapshot();
    let item_id = RecommendationId::new(id);
    let card = snapshot
        .items
        .iter()
        .find(|card| card.id == item_id)
        .ok_or_else(|| anyhow!("no recommendation with id {item_id}"))?;
    let source_index = snapshot
        .lane(card.status)
        .iter()
        .position(|other| other.id == item_id)
        .unwrap_or_default();
    let destination = if card.status == status {
        LanePosition::new(status, source_index)
    } else {
        LanePosition::new(status, snapshot.lane(status).len())
    };
    Ok(DropEvent {
        item_id,
        source: LanePosition::new(card.status, source_index),
        destination: Some(destination),
    })
}


#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
