//! Command line: run the proxy, or act as the card panel against one.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use crate::card::{CardClient, CardSession, LogNotifier, SubmitOutcome};
use crate::render::NativeCapabilities;
use crate::server::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "hanyu-card")]
#[command(about = "汉语新解: turn a Chinese word into a satirical SVG card")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the `POST /api/chat` proxy
    Serve {
        /// Address to listen on
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// Generate a card through a running proxy and export it
    Card {
        /// The word to re-explain
        word: String,

        /// Proxy origin
        #[arg(long, env = "CARD_ENDPOINT", default_value = "http://127.0.0.1:3000")]
        endpoint: String,

        /// Directory that receives generated.png
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Save the card as generated.png (the default when no export is chosen)
        #[arg(long)]
        download: bool,

        /// Copy the card to the clipboard as a PNG image.
        /// On Linux this waits until something else is copied.
        #[arg(long, conflicts_with = "copy_svg")]
        copy_png: bool,

        /// Copy the raw SVG markup to the clipboard.
        /// On Linux this waits until something else is copied.
        #[arg(long)]
        copy_svg: bool,

        /// Print the SVG markup to stdout
        #[arg(long)]
        print: bool,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { bind } => {
            let state = AppState::from_env().context("Failed to initialize the proxy")?;
            server::serve(bind, state).await?;
            Ok(())
        }
        Command::Card {
            word,
            endpoint,
            out_dir,
            download,
            copy_png,
            copy_svg,
            print,
        } => {
            let client = CardClient::new(&endpoint)?;
            let session = CardSession::new(
                client,
                Box::new(NativeCapabilities::desktop(out_dir)),
                Box::new(LogNotifier),
            );

            match session.submit(&word).await {
                SubmitOutcome::Generated => {}
                SubmitOutcome::Rejected => bail!("Nothing to generate: the word is empty"),
                SubmitOutcome::NoSvg => bail!("The model reply contained no SVG"),
                SubmitOutcome::Failed => bail!("Could not reach the proxy at {}", endpoint),
            }

            if print {
                if let Some(svg) = session.view().await.svg {
                    println!("{}", svg);
                }
            }

            // Exports report through the notifier; one failing does not stop the rest.
            // Clipboard writes go last since they may hold the process open.
            let mut failures = 0;
            if download || !(copy_png || copy_svg || print) {
                failures += session.download_png().await.is_err() as usize;
            }
            if copy_png || copy_svg {
                info!("Copying to the clipboard; it stays available until replaced");
            }
            if copy_png {
                failures += session.copy_png().await.is_err() as usize;
            }
            if copy_svg {
                failures += session.copy_svg().await.is_err() as usize;
            }

            if failures > 0 {
                bail!("{} export(s) failed", failures);
            }
            Ok(())
        }
    }
}
