use crate::error::{CliError, CliResult};
use hookrelay::{ChannelSink, Settings};
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{error, info};

/// Run the receiver endpoint, printing each emitted record as a JSON line
pub async fn run(config_path: Option<&Path>, bind: Option<SocketAddr>) -> CliResult<()> {
    let settings = Settings::load(config_path)?;
    let mut config = settings.receiver.ok_or(CliError::MissingSection("receiver"))?;
    if let Some(bind) = bind {
        config.bind = bind;
    }

    info!(
        subscriptions = config.subscriptions.len(),
        "starting webhook receiver"
    );

    let (sink, mut records) = ChannelSink::channel(256);
    let printer = tokio::spawn(async move {
        let stdout = std::io::stdout();
        while let Some(record) = records.recv().await {
            let line = match serde_json::to_string(&record) {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "failed to encode record");
                    continue;
                }
            };
            let mut out = stdout.lock();
            if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
                error!(error = %e, "failed to write record");
                break;
            }
        }
    });

    let served = hookrelay::serve(config, sink).await;
    // the sink was dropped with the server, so the printer drains and exits
    let _ = printer.await;
    served?;
    Ok(())
}
