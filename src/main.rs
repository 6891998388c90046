mod codec;
mod config;
mod epoch;
mod link;
mod predict;
mod router;
mod rpc;
mod scheduler;
mod shutdown;
mod store;
mod web;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::config::{Config, LinkEndpoint};
use crate::link::LinkAgent;
use crate::predict::{GroundStation, PredictError, SgpPredictor, TleLoader};
use crate::rpc::{PredictorClient, RouterClient, RpcError, StoreClient};
use crate::scheduler::Scheduler;
use crate::shutdown::Shutdown;
use crate::store::PassageStore;
use crate::web::api::predict::PredictState;

#[derive(Parser)]
#[command(name = "sat-ingest")]
#[command(about = "Satellite ground station telemetry ingestion")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the passage store
    Store,
    /// Run the router
    Router,
    /// Run the prediction service
    Predictor,
    /// Run the pass scheduler
    Scheduler,
    /// Run the ground-station link agents
    Link {
        /// Connect to this host only, instead of every configured link
        #[arg(long, requires = "port")]
        host: Option<String>,
        #[arg(long, requires = "host")]
        port: Option<u16>,
    },
    /// Run every role in one process
    All,
    /// Validate the configuration file
    Validate,
    /// Show what a running store holds
    Status,
}

#[derive(Debug, Error)]
enum RunError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error("invalid station coordinates {0:?}")]
    Station(String),
    #[error("no links configured")]
    NoLinks,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading {}: {}", cli.config, e);
            return ExitCode::FAILURE;
        }
    };

    if let Commands::Validate = cli.command {
        return validate(&config);
    }

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(trigger.on_ctrl_c());

    let result = match cli.command {
        Commands::Store => run_store(&config, shutdown).await,
        Commands::Router => run_router(&config, shutdown).await,
        Commands::Predictor => run_predictor(&config, shutdown).await,
        Commands::Scheduler => run_scheduler(&config, shutdown).await,
        Commands::Link { host, port } => {
            let links = match (host, port) {
                (Some(host), Some(port)) => vec![LinkEndpoint { host, port }],
                _ => config.links.clone(),
            };
            run_links(&config, links, shutdown).await
        }
        Commands::All => run_all(&config, shutdown).await,
        Commands::Status => status(&config).await,
        Commands::Validate => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn validate(config: &Config) -> ExitCode {
    let Some(station) = station(config) else {
        eprintln!(
            "Invalid station coordinates: {:?}",
            config.predictor.coordinates
        );
        return ExitCode::FAILURE;
    };

    println!("Configuration is valid");
    println!(
        "  store:     {} -> {}",
        config.store.bind,
        config.store.data_folder.display()
    );
    println!("  router:    {}", config.router.bind);
    println!(
        "  predictor: {} (NORAD {}, station {})",
        config.predictor.bind, config.predictor.norad_id, station
    );
    println!(
        "  scheduler: {} candidates, horizon {}",
        config.scheduler.candidates,
        humantime::format_duration(config.scheduler.horizon)
    );
    println!("  links:     {}", config.links.len());
    for link in &config.links {
        println!("    {}", link.id());
    }
    ExitCode::SUCCESS
}

fn station(config: &Config) -> Option<GroundStation> {
    GroundStation::from_coordinates(&config.predictor.coordinates, config.predictor.altitude_m)
}

async fn status(config: &Config) -> Result<(), RunError> {
    let store = StoreClient::new(&config.endpoints.store, config.endpoints.timeout)?;
    let resident = store.resident().await?;

    println!("{} resident passages", resident.len());
    for passage in &resident {
        println!(
            "  #{} {} -> {}: {} frames from {} links",
            passage.passage_number,
            passage.aos_utc,
            passage.los_utc,
            passage.frame_count,
            passage.link_count
        );
    }
    match store.last_tle().await? {
        Some(record) => println!("Last TLE update at {}", record.received_at),
        None => println!("No TLE update received"),
    }
    Ok(())
}

async fn run_store(config: &Config, shutdown: Shutdown) -> Result<(), RunError> {
    let store = Arc::new(PassageStore::new(
        config.store.data_folder.clone(),
        config.store.max_resident,
    ));
    info!("Passages are saved in {}", store.data_folder().display());

    let listener = TcpListener::bind(&config.store.bind).await?;
    web::serve(listener, web::store_app(store), shutdown).await?;
    Ok(())
}

async fn run_router(config: &Config, shutdown: Shutdown) -> Result<(), RunError> {
    let endpoints = &config.endpoints;
    let router = router::Router::new(
        PredictorClient::new(&endpoints.predictor, endpoints.timeout)?,
        StoreClient::new(&endpoints.store, endpoints.timeout)?,
        config.router.first_passage_number,
    );

    let listener = TcpListener::bind(&config.router.bind).await?;
    web::serve(listener, web::router_app(Arc::new(router)), shutdown).await?;
    Ok(())
}

async fn run_predictor(config: &Config, shutdown: Shutdown) -> Result<(), RunError> {
    let station =
        station(config).ok_or_else(|| RunError::Station(config.predictor.coordinates.clone()))?;
    let loader = config.predictor.tle_folder.clone().map(TleLoader::new);
    let predictor = SgpPredictor::new(station, loader, config.predictor.settings())?;

    let endpoints = &config.endpoints;
    let router = if endpoints.router_tle_push {
        Some(RouterClient::new(&endpoints.router, endpoints.timeout)?)
    } else {
        None
    };
    let state = PredictState {
        predictor: Arc::new(predictor),
        router,
    };

    let listener = TcpListener::bind(&config.predictor.bind).await?;
    web::serve(listener, web::predictor_app(state), shutdown).await?;
    Ok(())
}

async fn run_scheduler(config: &Config, shutdown: Shutdown) -> Result<(), RunError> {
    let endpoints = &config.endpoints;
    let scheduler = Scheduler::new(
        PredictorClient::new(&endpoints.predictor, endpoints.timeout)?,
        RouterClient::new(&endpoints.router, endpoints.timeout)?,
        config.scheduler.settings(),
    );
    scheduler.run(shutdown).await;
    Ok(())
}

async fn run_links(
    config: &Config,
    links: Vec<LinkEndpoint>,
    shutdown: Shutdown,
) -> Result<(), RunError> {
    if links.is_empty() {
        return Err(RunError::NoLinks);
    }
    let router = Arc::new(RouterClient::new(
        &config.endpoints.router,
        config.endpoints.timeout,
    )?);

    let mut agents = JoinSet::new();
    for link in links {
        let agent = LinkAgent::new(link.id(), router.clone(), config.link.settings());
        info!("Starting link {}", agent.link());
        agents.spawn(agent.run(shutdown.clone()));
    }
    while let Some(result) = agents.join_next().await {
        if let Err(e) = result {
            error!("Link task failed: {}", e);
        }
    }
    Ok(())
}

async fn run_all(config: &Config, shutdown: Shutdown) -> Result<(), RunError> {
    let links = async {
        if config.links.is_empty() {
            warn!("No links configured, only passes will be recorded");
            Ok(())
        } else {
            run_links(config, config.links.clone(), shutdown.clone()).await
        }
    };

    tokio::try_join!(
        run_store(config, shutdown.clone()),
        run_router(config, shutdown.clone()),
        run_predictor(config, shutdown.clone()),
        run_scheduler(config, shutdown.clone()),
        links,
    )?;
    Ok(())
}
