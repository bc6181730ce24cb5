mod cli;
mod commands;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Ctrl+C でレジストリ照会を打ち切る
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(&args, &cancel).await,
        Commands::Check(args) => commands::check::run(&args),
    }
}

/// 標準出力は解決結果専用とし、ログ（スキップ警告を含む）は標準エラーに出力する。
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
