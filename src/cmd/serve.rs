//! Stream-logs proxy command: `mission-control serve`.

use anyhow::Result;
use mission_control::config::MissionConfig;
use mission_control::proxy;

pub async fn cmd_serve(
    config: &MissionConfig,
    port: Option<u16>,
    host: Option<String>,
    dev: bool,
) -> Result<()> {
    let mut server = config.server.to_server_config(dev);
    if let Some(port) = port {
        server.port = port;
    }
    if let Some(host) = host {
        server.host = host;
    }

    proxy::start_server(server).await
}
