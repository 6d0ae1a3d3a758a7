//! Repeated, back-off governed connection attempts against a list of
//! targets.

mod config;
mod error;
mod target;

use std::any::Any;

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use tokio::task::JoinHandle;

pub use config::ConnectionLoopConfig;
pub use error::{AttemptError, ConnectionLoopError};
pub use target::{Target, DEFAULT_PORT};

/// Opens one kind of connection
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    async fn connect(&self, target: &Target) -> Result<Self::Connection, AttemptError>;
}

/// Tries every target in order, pass after pass, until one connects or the
/// iteration limit runs out
pub struct ConnectionLoop<C: Connector> {
    config: ConnectionLoopConfig,
    connector: C,
}

impl<C: Connector> ConnectionLoop<C> {
    pub fn new(config: ConnectionLoopConfig, connector: C) -> Result<Self, ConnectionLoopError> {
        config.validate()?;
        Ok(Self { config, connector })
    }

    /// Run to completion. `Ok(None)` means every pass failed.
    pub async fn run(self) -> Result<Option<C::Connection>, ConnectionLoopError> {
        let config = &self.config;
        let mut passes = 0u32;
        loop {
            passes += 1;
            debug!("connection pass {} over {} targets", passes, config.targets.len());
            for target in &config.targets {
                match self.attempt(target).await {
                    Ok(connection) => {
                        info!("connected to {} on pass {}", target, passes);
                        return Ok(Some(connection));
                    }
                    Err(AttemptError::Transient(reason)) => {
                        debug!("attempt on {} failed: {}", target, reason);
                    }
                    Err(AttemptError::Fatal(reason)) => {
                        warn!("giving up on {}: {}", target, reason);
                        return Err(ConnectionLoopError::Fatal {
                            target: target.to_string(),
                            reason,
                        });
                    }
                }
            }

            if config.iteration_limit != 0 && passes >= config.iteration_limit {
                debug!("no connection after {} passes", passes);
                return Ok(None);
            }
            let cooldown = config.cooldown_after(passes);
            trace!("cooling down for {:?}", cooldown);
            tokio::time::sleep(cooldown).await;
        }
    }

    /// Run on the tokio runtime, returning a handle that can abort it
    pub fn spawn(self) -> ConnectionLoopHandle<C::Connection> {
        ConnectionLoopHandle {
            task: tokio::spawn(self.run()),
        }
    }

    async fn attempt(&self, target: &Target) -> Result<C::Connection, AttemptError> {
        trace!("connecting to {}", target);
        match tokio::time::timeout(self.config.timeout, self.connector.connect(target)).await {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Transient(format!(
                "timed out after {:?}",
                self.config.timeout
            ))),
        }
    }
}

/// A running [`ConnectionLoop`]
pub struct ConnectionLoopHandle<T> {
    task: JoinHandle<Result<Option<T>, ConnectionLoopError>>,
}

impl<T> ConnectionLoopHandle<T> {
    /// Stop the loop. Awaiting [`result`](Self::result) afterwards yields
    /// [`ConnectionLoopError::Cancelled`].
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn result(self) -> Result<Option<T>, ConnectionLoopError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(ConnectionLoopError::Cancelled),
            Err(err) => {
                let reason = match err.try_into_panic() {
                    Ok(panic) => panic_reason(panic.as_ref()),
                    Err(err) => err.to_string(),
                };
                warn!("connection loop died: {}", reason);
                Err(ConnectionLoopError::Failed { reason })
            }
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
