mod cli;

use photo_ai_mcp::analysis::AnalysisService;
use photo_ai_mcp::config::Config;
use photo_ai_mcp::server;

#[tokio::main(flavor = "current_thread")] // requests are handled one at a time
async fn main() -> anyhow::Result<()> {
    let cmd = cli::build_cli();
    let matches = cmd.get_matches();
    let log_level = matches.get_one::<String>("log-level").cloned();
    let version_flag = matches.get_flag("version");

    cli::init_logging(log_level.as_deref());

    if version_flag {
        println!("photo-ai-mcp {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let cfg = Config::from_env().map_err(anyhow::Error::msg)?;
    let service = AnalysisService::from_config(&cfg)?;
    server::run_stdio_server(service).await?;
    Ok(())
}
