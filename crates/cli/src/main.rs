//! `doscrawler` worker entry point: loads settings, wires the pipeline onto the in-process
//! broker, and feeds it attack vectors read as newline-delimited JSON from stdin, the seam
//! a real upstream Avro/Kafka consumer would plug into instead (§4.1, out of scope here).

mod wiring;

use std::io::IsTerminal;

use clap::Parser;
use color_eyre::eyre::eyre;
use doscrawler_model::{Settings, WireAttackVector};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "doscrawler", about = "DoS attack telescope crawling pipeline")]
struct CliArgs {
    /// Use the production settings profile instead of the development defaults.
    #[arg(long)]
    production: bool,
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let args = CliArgs::parse();
    let settings = if args.production {
        Settings::production()
    } else {
        Settings::default()
    };
    let settings = settings.apply_env_overrides().map_err(|err| eyre!(err))?;

    let vector_topic = wiring::spawn_pipeline(settings).await?;

    if std::io::stdin().is_terminal() {
        log::info!("no piped input detected; running with whatever the pipeline's timers produce");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let wire: WireAttackVector = match serde_json::from_str(&line) {
            Ok(wire) => wire,
            Err(err) => {
                log::error!("skipping a malformed attack vector line: {err}");
                continue;
            }
        };
        let key = wire.target_ip.to_string();
        if let Err(err) = vector_topic.send(key, wire).await {
            log::error!("failed to enqueue an attack vector: {err}");
        }
    }

    log::info!("stdin closed; draining in-flight work");
    tokio::signal::ctrl_c().await?;
    Ok(())
}
