use std::sync::Arc;

use clap::Parser;
use relay_core::action::ActionKind;
use lapin::Connection;
use relay_server::broker::{close_session, AmqpConnector, ConnectionManager, Publisher};
use relay_server::cli::GatewayArgs;
use relay_server::dispatch::{DispatchConfig, LogTransport};
use relay_server::network::shutdown_signal;
use relay_server::transport::{
    AuthTransport, BrokerTransport, HttpPeer, LogHttpTransport, MailTransport, RpcTransport,
    Transport,
};
use relay_server::{DispatchRouter, Dispatcher, NetworkModule};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = GatewayArgs::parse();
    args.log.init()?;
    if let Some(addr) = args.metrics_addr {
        relay_server::telemetry::install_metrics(addr)?;
    }

    let config = args.dispatch_config();
    let log_route = log_route(&args, &config).await?;
    let router = DispatchRouter::builder()
        .route(
            ActionKind::Auth,
            Arc::new(AuthTransport::new(HttpPeer::new(
                "authentication",
                &args.auth_url,
                config.http_timeout,
            )?)),
        )
        .route(
            ActionKind::Mail,
            Arc::new(MailTransport::new(HttpPeer::new(
                "mail",
                &args.mail_url,
                config.http_timeout,
            )?)),
        )
        .route(ActionKind::Log, Arc::clone(&log_route.transport))
        .build();

    info!(log_transport = ?config.log_transport, "dispatch routes ready");

    let mut module = NetworkModule::new(
        args.network_config(),
        Dispatcher::new(router, Arc::new(config)),
    );
    let port = module.start().await?;
    info!(port, "gateway started");

    let served = module.serve(shutdown_signal()).await;

    if let Some(connection) = log_route.broker {
        close_session(connection.as_ref()).await;
    }
    served
}

/// The `log` route, plus the broker connection when it needs one.
struct LogRoute {
    transport: Arc<dyn Transport>,
    broker: Option<Arc<Connection>>,
}

/// The broker connection is only dialed when `log` goes over the broker.
async fn log_route(args: &GatewayArgs, config: &DispatchConfig) -> anyhow::Result<LogRoute> {
    let route = match config.log_transport {
        LogTransport::Rpc => LogRoute {
            transport: Arc::new(RpcTransport::new(&args.logger_rpc_addr)),
            broker: None,
        },
        LogTransport::Http => LogRoute {
            transport: Arc::new(LogHttpTransport::new(HttpPeer::new(
                "logger",
                &args.logger_url,
                config.http_timeout,
            )?)),
            broker: None,
        },
        LogTransport::Broker => {
            let manager =
                ConnectionManager::new(AmqpConnector::new(&args.amqp_uri), args.backoff.policy());
            let connection = Arc::new(manager.connect().await?);
            LogRoute {
                transport: Arc::new(BrokerTransport::new(Publisher::new(Arc::clone(
                    &connection,
                )))),
                broker: Some(connection),
            }
        }
    };
    Ok(route)
}
