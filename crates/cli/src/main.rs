use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use loomerp_infra::{InventoryConfig, build_services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    loomerp_observability::init();

    let config = InventoryConfig::from_env().context("invalid inventory configuration")?;
    let services = build_services(&config)
        .await
        .context("failed to initialize inventory services")?;

    tracing::info!("reading commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = loomerp_cli::handle_line(&services, &line).await;
        let mut out = serde_json::to_vec(&reply).context("failed to encode reply")?;
        out.push(b'\n');
        stdout.write_all(&out).await.context("failed to write stdout")?;
        stdout.flush().await.context("failed to write stdout")?;
    }

    Ok(())
}
