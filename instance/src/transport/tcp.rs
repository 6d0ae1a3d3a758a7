use std::io;

use async_trait::async_trait;
use log::trace;
use tokio::net::TcpStream;

use crate::connection_loop::{AttemptError, Connector, Target};

/// Opens plain TCP streams for a [`ConnectionLoop`](crate::ConnectionLoop)
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector {
    /// Disable Nagle's algorithm on connected streams
    pub nodelay: bool,
}

#[async_trait]
impl Connector for TcpConnector {
    type Connection = TcpStream;

    async fn connect(&self, target: &Target) -> Result<TcpStream, AttemptError> {
        let stream = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(classify)?;
        if self.nodelay {
            stream.set_nodelay(true).map_err(classify)?;
        }
        trace!("tcp stream to {} is up", target);
        Ok(stream)
    }
}

fn classify(err: io::Error) -> AttemptError {
    match err.kind() {
        io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported => {
            AttemptError::Fatal(err.to_string())
        }
        _ => AttemptError::Transient(err.to_string()),
    }
}
