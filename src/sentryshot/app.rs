// SPDX-License-Identifier: GPL-2.0-or-later

use axum::{routing::get, Router};
use common::{ILogger, LogEntry, LogLevel};
use env::{Config, ConfigError};
use handler::{get_handler, GetHandlerState};
use log::Logger;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::{
    net::TcpListener,
    signal,
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("read config: {0}")]
    Config(#[from] ConfigError),

    #[error("listen on sigterm: {0}")]
    SigTermListener(std::io::Error),
}

pub async fn run(config_path: &PathBuf) -> Result<(), RunError> {
    let app = App::new(config_path)?;
    let mut shutdown_complete_rx = app.run()?;
    shutdown_complete_rx.recv().await;
    Ok(())
}

pub struct App {
    token: CancellationToken,
    config: Arc<Config>,
    logger: Arc<Logger>,
    shutdown_complete_tx: mpsc::Sender<()>,
    shutdown_complete_rx: mpsc::Receiver<()>,
    router: Router,
}

impl App {
    pub fn new(config_path: &PathBuf) -> Result<App, RunError> {
        let config = Arc::new(Config::from_file(config_path)?);
        let logger = Arc::new(Logger::new(Vec::new()));
        let token = CancellationToken::new();
        let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel::<()>(1);

        let router = Router::new().route(
            "/get",
            get(get_handler).with_state(GetHandlerState {
                logger: logger.clone(),
                config: config.clone(),
            }),
        );

        Ok(App {
            token,
            config,
            logger,
            shutdown_complete_tx,
            shutdown_complete_rx,
            router,
        })
    }

    // `App` must be dropped when this returns.
    pub fn run(self) -> Result<mpsc::Receiver<()>, RunError> {
        self.logger.log(LogEntry::new(
            LogLevel::Info,
            "app",
            format!("serving app on {}", self.config.address),
        ));

        let (server_exited_tx, server_exited_rx) = oneshot::channel();
        tokio::spawn(start_server(
            self.token.child_token(),
            server_exited_tx,
            self.config.address,
            self.router,
        ));

        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RunError::SigTermListener)?;
        let token = self.token.clone();
        let shutdown_complete_tx = self.shutdown_complete_tx;
        tokio::spawn(async move {
            tokio::select! {
                result = signal::ctrl_c() => {
                    match result {
                        Ok(()) => eprintln!("\nreceived interrupt, stopping..\n"),
                        Err(e) => eprintln!("\ninterrupt error: {e}"),
                    }
                }
                _ = sigterm.recv() => eprintln!("\nreceived terminate, stopping..\n"),
                res = server_exited_rx => {
                    if let Err(e) = res {
                        eprintln!("server error: {e}");
                    }
                },
            }
            token.cancel();
            drop(shutdown_complete_tx);
        });

        Ok(self.shutdown_complete_rx)
    }
}

#[derive(Debug, Error)]
enum ServerError {
    #[error("bind: {0}")]
    Bind(std::io::Error),

    #[error("{0}")]
    Server(std::io::Error),
}

async fn start_server(
    token: CancellationToken,
    on_exit: oneshot::Sender<Result<(), ServerError>>,
    addr: std::net::SocketAddr,
    router: Router,
) {
    let listener = match TcpListener::bind(addr).await {
        Ok(v) => v,
        Err(e) => {
            let _ = on_exit.send(Err(ServerError::Bind(e)));
            return;
        }
    };
    let graceful = axum::serve(listener, router)
        .with_graceful_shutdown(async move { token.cancelled().await });
    let _ = on_exit.send(graceful.await.map_err(ServerError::Server));
}
