//! Dreamgate - reference-image generation gateway for the `DreamO` Space.

mod adapters;
mod cassette;
mod cli;
mod config;
mod context;
mod error;
mod form;
mod gateway;
mod model;
mod output;
mod params;
mod ports;

use std::process;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::adapters::live::gateway::HttpGatewayClient;
use crate::cli::{Cli, Command, GenerateArgs, ServeArgs};
use crate::config::Config;
use crate::context::{ModelMode, ServiceContext};
use crate::error::GenerateError;
use crate::form::{FormController, FormStatus, Slot};
use crate::gateway::AppState;

#[tokio::main]
async fn main() {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Generate(args) => generate(args).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "dreamgate=debug,tower_http=debug" } else { "dreamgate=info,tower_http=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn serve(args: ServeArgs) -> Result<(), GenerateError> {
    let config_path = config::discover_config_path(args.config.as_deref());
    let mut config = Config::load(&config_path).map_err(GenerateError::Config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let credential = match config.hf_token() {
        Ok(token) => Some(token),
        Err(issue) => {
            tracing::warn!(
                ?issue,
                "No usable Hugging Face token. Add HF_TOKEN=hf_your_token to .env.local; generation requests will fail"
            );
            None
        }
    };

    let mode = ModelMode::from_env();
    let ctx = ServiceContext::for_mode(&mode, &config.model)?;
    let state = AppState::new(credential, ctx.model, &config.model.space, config.server.max_in_flight);
    let app = gateway::router(state, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, ?mode, "Gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn generate(args: GenerateArgs) -> Result<(), GenerateError> {
    let prompt = args.resolve_prompt()?;

    let mut form = FormController::new();
    if let Some(path) = &args.ref_image1 {
        form.select_image(Slot::First, path).await?;
    }
    form.set_task(Slot::First, args.ref_task1);
    if let Some(path) = &args.ref_image2 {
        form.select_image(Slot::Second, path).await?;
        form.set_task(Slot::Second, args.ref_task2);
    }
    form.set_prompt(prompt);
    form.set_neg_prompt(args.neg_prompt.as_str());
    form.set_seed(args.seed.as_str());

    for (slider, requested) in args.slider_overrides() {
        let stored = form.set_slider(slider, requested);
        if (stored - requested).abs() > f64::EPSILON {
            tracing::warn!(field = slider.field(), requested, stored, "Slider value adjusted to its range");
        }
    }
    for slot in [Slot::First, Slot::Second] {
        if let Some(image) = form.image(slot) {
            tracing::debug!(?slot, file = %image.file_name, mime = %image.mime_type, preview_len = image.preview.len(), "Reference image");
        }
    }
    tracing::debug!(sliders = ?form.sliders(), ready = form.can_submit(), "Submitting");

    let client = HttpGatewayClient::new(&args.server);
    match form.submit(&client).await {
        FormStatus::Generated { image_url, used_seed } => {
            println!("{image_url}");
            if let Some(seed) = used_seed {
                eprintln!("Seed: {seed}");
            }
        }
        FormStatus::Failed(message) => return Err(GenerateError::Rejected(message.clone())),
        FormStatus::Idle | FormStatus::Loading => {
            return Err(GenerateError::Rejected("Generation did not complete".into()));
        }
    }

    if args.download {
        let path = form.download(&client, args.output.as_deref()).await?;
        eprintln!("Saved: {}", path.display());
    }
    Ok(())
}
