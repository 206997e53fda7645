use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relay_core::broker::LOGS_EXCHANGE;
use relay_server::broker::{
    close_session, AmqpConnector, ConnectionManager, LogEventHandler, TopicConsumer,
};
use relay_server::cli::ListenerArgs;
use relay_server::network::shutdown_signal;
use relay_server::sink::HttpLogSink;
use relay_server::transport::HttpPeer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ListenerArgs::parse();
    args.log.init()?;

    let manager = ConnectionManager::new(AmqpConnector::new(&args.amqp_uri), args.backoff.policy());
    let connection = Arc::new(manager.connect().await?);

    let consumer = TopicConsumer::new(Arc::clone(&connection), LOGS_EXCHANGE, args.bindings.clone()).await?;
    let sink = HttpLogSink::new(HttpPeer::new(
        "logger",
        &args.logger_url,
        Duration::from_millis(args.http_timeout_ms),
    )?);
    let handler = Arc::new(LogEventHandler::new(Arc::new(sink)));

    info!(exchange = LOGS_EXCHANGE, bindings = ?consumer.bindings(), "listening for log events");
    let listened = consumer.listen_until(handler, shutdown_signal()).await;
    info!(state = %consumer.state(), "listener stopped");

    close_session(connection.as_ref()).await;
    Ok(listened?)
}
