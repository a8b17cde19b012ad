use zbus::Connection;

use crate::config::{BusKind, DbusConfig};
use crate::error::{Error, Result};

/// Connect to D-Bus using the provided configuration.
///
/// The whole handshake is bounded by `call_timeout_ms`.
pub async fn connect(config: &DbusConfig) -> Result<Connection> {
    tracing::debug!(
        bus = %config.bus,
        address = ?config.address,
        timeout_ms = config.call_timeout_ms,
        "Connecting to D-Bus"
    );

    let open = async {
        match &config.address {
            Some(address) => {
                zbus::connection::Builder::address(address.as_str())?
                    .build()
                    .await
            }
            None => match config.bus {
                BusKind::System => Connection::system().await,
                BusKind::Session => Connection::session().await,
            },
        }
    };

    let connection = tokio::time::timeout(config.call_timeout(), open)
        .await
        .map_err(|_| Error::Timeout(config.call_timeout_ms))??;

    tracing::debug!(
        unique_name = ?connection.unique_name().map(|n| n.to_string()),
        "Connected to D-Bus"
    );

    Ok(connection)
}
