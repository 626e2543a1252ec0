use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sfu_client::ortc::{self, RtpCapabilities};
use sfu_client::sdp;

#[derive(Parser)]
#[command(
    name = "sfu-sdp",
    about = "Inspect SDP documents and SFU capability negotiation"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an SDP file and print it as JSON
    Parse { file: PathBuf },
    /// Parse and re-serialize an SDP file
    Roundtrip { file: PathBuf },
    /// Print the RTP capabilities advertised by a local offer
    Caps { file: PathBuf },
    /// Intersect a local offer with router capabilities (JSON)
    Negotiate {
        /// Local SDP offer
        #[arg(long)]
        offer: PathBuf,
        /// Router RTP capabilities
        #[arg(long)]
        router: PathBuf,
    },
}

type CliResult = Result<String, String>;

fn read(path: &PathBuf) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))
}

fn parse_sdp(path: &PathBuf) -> Result<sdp::SessionDescription, String> {
    sdp::parse(&read(path)?).map_err(|e| format!("{}: {e}", path.display()))
}

fn to_json<T: serde::Serialize>(value: &T) -> CliResult {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

fn run(command: Command) -> CliResult {
    match command {
        Command::Parse { file } => to_json(&parse_sdp(&file)?),
        Command::Roundtrip { file } => {
            let doc = parse_sdp(&file)?;
            let text = sdp::write(&doc).map_err(|e| e.to_string())?;
            let reparsed = sdp::parse(&text).map_err(|e| e.to_string())?;
            if reparsed != doc {
                tracing::warn!(file = %file.display(), "re-parsed document differs");
            }
            Ok(text)
        }
        Command::Caps { file } => to_json(&sdp::extract_rtp_capabilities(&parse_sdp(&file)?)),
        Command::Negotiate { offer, router } => {
            let native = sdp::extract_rtp_capabilities(&parse_sdp(&offer)?);
            let mut router_caps: RtpCapabilities =
                serde_json::from_str(&read(&router)?).map_err(|e| format!("{}: {e}", router.display()))?;
            ortc::validate_rtp_capabilities(&mut router_caps).map_err(|e| e.to_string())?;

            let extended = ortc::get_extended_rtp_capabilities(&native, &router_caps);
            let recv = ortc::get_recv_rtp_capabilities(&extended);
            tracing::info!(codecs = extended.codecs.len(), "negotiated");
            to_json(&serde_json::json!({
                "extendedRtpCapabilities": extended,
                "recvRtpCapabilities": recv,
                "canSendAudio": ortc::can_send(ortc::MediaKind::Audio, &extended),
                "canSendVideo": ortc::can_send(ortc::MediaKind::Video, &extended),
            }))
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();

    match run(args.command) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
