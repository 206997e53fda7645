use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relay_server::cli::LogRpcArgs;
use relay_server::network::shutdown_signal;
use relay_server::rpc::RpcServer;
use relay_server::sink::HttpLogSink;
use relay_server::transport::HttpPeer;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = LogRpcArgs::parse();
    args.log.init()?;

    let sink = HttpLogSink::new(HttpPeer::new(
        "logger",
        &args.logger_url,
        Duration::from_millis(args.http_timeout_ms),
    )?);

    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!(addr = %listener.local_addr()?, "log rpc server listening");

    RpcServer::log_service(Arc::new(sink))
        .serve(listener, shutdown_signal())
        .await
}
