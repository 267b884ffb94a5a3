use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coachcam::api::{AnalysisRequest, Availability};
use coachcam::capture::device::display_label;
use coachcam::capture::{CameraBackend, WebcamBackend};
use coachcam::live::SessionEvent;
use coachcam::playback::{run_analysis, AnalysisStatus};
use coachcam::{AppContext, ClientConfig, Role};
use std::path::PathBuf;
use std::sync::Arc;

/// coachcam - live pose feedback against a coach's reference video
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML)
    #[arg(long, env = "COACHCAM_CONFIG", default_value = "coachcam.toml", global = true)]
    config: PathBuf,

    /// User role
    #[arg(long, default_value = "player", global = true)]
    role: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List cameras
    Devices,

    /// Upload a reference video and stream the camera until Ctrl-C
    Live {
        /// Coach reference video
        #[arg(short, long)]
        reference: PathBuf,

        /// Camera id (defaults to the first camera)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Upload two videos and print the analysis report
    Analyze {
        #[arg(long)]
        coach: PathBuf,

        #[arg(long)]
        player: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    coachcam::init_tracing();

    let config = ClientConfig::load_or_default(&cli.config).with_env_overrides();
    let role: Role = cli.role.parse().unwrap_or_default();
    let context = AppContext::initialize(config, role).context("Invalid configuration")?;

    let outcome = match cli.command {
        Commands::Devices => list_devices().await,
        Commands::Live { reference, device } => run_live(&context, reference, device).await,
        Commands::Analyze { coach, player } => run_comparison(&context, coach, player).await,
    };

    context.shutdown();
    outcome
}

async fn list_devices() -> Result<()> {
    let devices = WebcamBackend::new()
        .enumerate()
        .await
        .context("Failed to list cameras")?;
    if devices.is_empty() {
        println!("No camera found on this device.");
    }
    for device in &devices {
        println!("{}\t{}", device.id, display_label(device));
    }
    Ok(())
}

async fn run_live(context: &AppContext, reference: PathBuf, device: Option<String>) -> Result<()> {
    let uploaded = context
        .api()
        .upload_live_reference_file(&reference)
        .await
        .context("Reference upload failed")?;

    let mut session = context.capture_session(Arc::new(WebcamBackend::new()));
    session.set_context(Some(uploaded.id.clone()));
    if let Some(device) = device {
        session.select_device(device)?;
    }

    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::FeedbackUpdated(feedback) => {
                    tracing::info!("{} {:?}", feedback.accuracy_label(), feedback.tips);
                }
                SessionEvent::NoticeRaised(notice) => {
                    tracing::warn!("[{}] {}", notice.code, notice.message);
                }
                _ => {}
            }
        }
    });

    session.start().await?;

    let mut scheduler = context.frame_scheduler();
    tokio::select! {
        stats = session.run(&mut scheduler) => {
            tracing::info!("Relay ended: {:?}", stats);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    session.stop();
    println!("{:?}", session.stats());
    Ok(())
}

async fn run_comparison(context: &AppContext, coach: PathBuf, player: PathBuf) -> Result<()> {
    let api = context.api();
    let coach = api.upload_video_file(&coach, true).await?;
    let player = api.upload_video_file(&player, false).await?;

    let mut tracker = context.analysis_tracker();
    let request = AnalysisRequest {
        coach_video_id: coach.id,
        player_video_id: player.id,
    };
    run_analysis(&mut tracker, api, &request).await;

    match tracker.status() {
        AnalysisStatus::Completed(result) => {
            println!("Performance: {:.1}%", result.performance);
            println!("Technique:   {:.1}%", result.technique);
            println!("Accuracy:    {:.1}%", result.accuracy);
            for (i, suggestion) in result.suggestions.iter().enumerate() {
                println!("{}. {}", i + 1, suggestion);
            }
            if let Availability::Available(url) = &result.dynamic_video {
                println!("Comparison video: {}", url);
            } else {
                println!("Comparison video: not available");
            }
            Ok(())
        }
        AnalysisStatus::Failed(notice) => anyhow::bail!("{}", notice.message),
        other => anyhow::bail!("Unexpected analysis status: {:?}", other),
    }
}
