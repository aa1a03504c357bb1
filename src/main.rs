use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use dreamworld::actions::{DownloadOutcome, LocalPlatform};
use dreamworld::cli::{CliOptions, Command, GenerateArgs};
use dreamworld::client::DreamClient;
use dreamworld::config::{ClientConfig, setup_logging};
use dreamworld::controller::{DreamController, SubmitOutcome};
use dreamworld::presenter::TerminalPresenter;
use dreamworld::render::ImageCrateDecoder;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliOptions::parse();

    // the logger reports its own init failure
    let _ = setup_logging(cli.debug);

    let config = ClientConfig::new(cli.endpoint.clone())
        .with_timeout(Duration::from_secs(cli.timeout_secs))
        .with_demo_fallback(!cli.no_demo_fallback);
    let client = DreamClient::new(config)?;
    info!("Dream webhook: {}", cli.endpoint);

    match cli.command {
        Command::Check => {
            let image = client.check_connection().await?;
            println!("Webhook connection OK: {}", image.image_ref);
            Ok(())
        }
        Command::Generate(args) => generate(client, args).await,
    }
}

async fn generate(client: DreamClient, args: GenerateArgs) -> Result<()> {
    let endpoint = client.config().endpoint.clone();
    let decoder = ImageCrateDecoder::new(client.http().clone());
    let mut controller = DreamController::new(client, decoder, TerminalPresenter::default());

    let cancel = controller.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the dream request");
            cancel.cancel();
        }
    });

    match controller.submit(&args.fields()).await {
        SubmitOutcome::Displayed { image, .. } => {
            if image.demo {
                warn!("The webhook was unreachable; this is a demo image");
            }
            if let Some(prompt) = image.prompt_used {
                info!("Prompt used: {}", prompt);
            }
        }
        SubmitOutcome::Invalid(result) => return Err(anyhow!(result.summary())),
        SubmitOutcome::Failed(err) => {
            if let Some(hint) = err.hint() {
                warn!("{} (webhook: {})", hint, endpoint);
            }
            return Err(err.into());
        }
        SubmitOutcome::Stale => return Err(anyhow!("Dream request cancelled")),
    }

    let mut platform = LocalPlatform::new(&args.out_dir);
    if args.download {
        match controller.download(&mut platform).await {
            Ok(DownloadOutcome::Saved(path)) => eprintln!("Saved: {}", path.display()),
            Ok(DownloadOutcome::OpenedExternally(err)) => warn!("Download failed: {}", err),
            Err(err) => error!("Download failed: {}", err),
        }
    }
    if args.share
        && let Err(err) = controller.share(&mut platform)
    {
        error!("Share failed: {}", err);
    }
    Ok(())
}

