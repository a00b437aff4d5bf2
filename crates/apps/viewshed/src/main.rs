mod config;
mod console;
mod controller;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use geoprocessing::{HttpJobApi, JobOrchestrator};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Args, ViewshedConfig};
use crate::console::Command;
use crate::controller::{AnalysisSession, ClickOutcome, InteractionController};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    let controller = Arc::new(build_controller(&config));
    controller.display().subscribe(console::print_event);

    info!(
        service = %config.service_url,
        wkid = config.spatial_reference.wkid,
        dem = %config.dem_resolution,
        "viewshed client ready"
    );
    println!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("failed to read stdin: {e}");
                return ExitCode::FAILURE;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => dispatch(&controller, &config, command).await,
            Err(msg) => println!("{msg}"),
        }
    }

    if let Err(e) = controller.disarm().await {
        warn!("failed to clear layers on exit: {e}");
    }
    ExitCode::SUCCESS
}

fn build_controller(config: &ViewshedConfig) -> InteractionController {
    let api = HttpJobApi::new(config.service_url.clone()).with_token(config.token.clone());
    let orchestrator =
        JobOrchestrator::new(Arc::new(api)).with_poll_interval(config.poll_interval);
    InteractionController::new(
        AnalysisSession::in_memory(),
        orchestrator,
        config.inputs,
        config.dem_resolution,
    )
}

async fn dispatch(controller: &Arc<InteractionController>, config: &ViewshedConfig, command: Command) {
    if let Some(point) = command.click_point(config.spatial_reference) {
        // Runs in the background so commands typed mid-job still arrive.
        let controller = Arc::clone(controller);
        tokio::spawn(async move {
            if controller.handle_click(point).await == ClickOutcome::Ignored {
                println!("click ignored: tool is disarmed or busy");
            }
        });
        return;
    }

    let result = match command {
        Command::Arm => controller.arm().await.map_err(|e| e.to_string()),
        Command::Disarm => controller.disarm().await.map_err(|e| e.to_string()),
        Command::Toggle => controller
            .toggle()
            .await
            .map(|armed| println!("tool {}", if armed { "armed" } else { "disarmed" }))
            .map_err(|e| e.to_string()),
        Command::Distance(meters) => controller.set_max_distance(meters),
        Command::Offset(meters) => controller.set_observer_offset(meters),
        Command::Status => {
            let inputs = controller.inputs();
            println!(
                "armed: {}  gate: {:?}  job: {}  distance: {} m  offset: {} m",
                controller.is_armed(),
                controller.gate_state(),
                controller.job_status(),
                inputs.max_distance,
                inputs.observer_offset
            );
            Ok(())
        }
        Command::Help => {
            println!("{}", console::HELP);
            Ok(())
        }
        Command::Click { .. } | Command::Quit => Ok(()),
    };
    if let Err(msg) = result {
        println!("{msg}");
    }
}
