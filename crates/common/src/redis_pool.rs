use redis::aio::ConnectionManager;
use redis::{Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::config::AppConfig;

/// Build Redis connection parameters from the application config.
pub fn connection_info(config: &AppConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.redis_host.clone(), config.redis_port),
        redis: RedisConnectionInfo {
            db: config.redis_db,
            password: config.redis_password.clone(),
            ..Default::default()
        },
    }
}

/// Create a Redis client. Does not open a connection.
pub fn create_redis_client(config: &AppConfig) -> redis::RedisResult<Client> {
    Client::open(connection_info(config))
}

/// Create a Redis connection manager for async operations.
///
/// The manager reconnects on its own after the connection drops.
pub async fn create_redis_pool(client: Client) -> redis::RedisResult<ConnectionManager> {
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
