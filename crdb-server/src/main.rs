/*
    crdb-server - CRDT database service binary

    Loads configuration from the environment, registers the full plugin
    roster (storage backends, crypto methods, set datatypes) and serves
    the framed protocol over TCP, one task per connection.
*/

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crdb_core::config::Config;
use crdb_core::crdt::{GSetFactory, TwoPhaseSetFactory};
use crdb_core::crypto::{
    AesCbcMethod, RsaOaepMethod, AES_128_KEY_SIZE, AES_192_KEY_SIZE, AES_256_KEY_SIZE,
};
use crdb_core::database::Database;
use crdb_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use crdb_core::service::{
    decode_message, encode_message, read_frame, write_frame, CrdtService, ListEndMessage,
    Request, Response, Status,
};
use crdb_core::storage::{FileStore, MemoryCluster, MemoryObjectStore, SwarmStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    let log_level = LogLevel::parse(&config.logging.level).unwrap_or_default();
    init_logging_with_config(
        LogConfig::new(log_level).json_format(config.logging.json_format),
    )
    .context("failed to initialize logging")?;

    let database = build_database(&config)
        .await
        .context("plugin registration failed")?;
    let service = Arc::new(CrdtService::new(Arc::new(database)));

    let listener = TcpListener::bind(config.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;
    info!(address = %config.server.bind_address, "crdb listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service.clone();
        let max_frame_size = config.server.max_frame_size;

        tokio::spawn(async move {
            if let Err(e) = handle_connection(service, stream, max_frame_size).await {
                warn!(peer = %peer, error = %e, "connection closed with error");
            }
        });
    }
}

/// Register every shipped plugin, in the same order the original
/// service brings them up: storage, crypto methods, datatypes.
async fn build_database(config: &Config) -> Result<Database> {
    let database = Database::new();

    database.register_storage(Arc::new(FileStore::new(&config.storage.data_dir)?))?;

    if config.swarm.enabled {
        let cluster = MemoryCluster::new();
        let peer_id = uuid::Uuid::new_v4().to_string();
        let object_store = Arc::new(MemoryObjectStore::new(cluster, peer_id));
        let swarm = SwarmStore::open(object_store, config.swarm.gather_timeout).await?;
        database.register_storage(Arc::new(swarm))?;
    }

    for size in [AES_128_KEY_SIZE, AES_192_KEY_SIZE, AES_256_KEY_SIZE] {
        database.register_crypto_method(Arc::new(AesCbcMethod::new(size)?))?;
    }
    for bits in [1024, 2048, 4096] {
        database.register_crypto_method(Arc::new(RsaOaepMethod::new(bits)?))?;
    }

    database.register_type(Arc::new(GSetFactory))?;
    database.register_type(Arc::new(TwoPhaseSetFactory))?;

    Ok(database)
}

async fn handle_connection(
    service: Arc<CrdtService>,
    stream: TcpStream,
    max_frame_size: usize,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    while let Some(frame) = read_frame(&mut reader, max_frame_size).await? {
        let request: Request = match decode_message(&frame) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "unparseable request frame");
                break;
            }
        };

        match request {
            Request::SetList(request) => {
                let (tx, mut rx) = mpsc::channel(16);
                let streaming = service.clone();
                let producer =
                    tokio::spawn(async move { streaming.set_list(request, tx).await });

                while let Some(element) = rx.recv().await {
                    let frame = encode_message(&Response::ListItem(element))?;
                    write_frame(&mut writer, &frame).await?;
                }
                producer.await?;

                let end = Response::ListEnd(ListEndMessage {
                    status: Status::ok(),
                });
                write_frame(&mut writer, &encode_message(&end)?).await?;
            }
            other => {
                let response = dispatch(&service, other).await;
                write_frame(&mut writer, &encode_message(&response)?).await?;
            }
        }
    }

    Ok(())
}

/// Map one non-streaming request to its response.
async fn dispatch(service: &CrdtService, request: Request) -> Response {
    match request {
        Request::Create(r) => Response::Create(service.create(r).await),
        Request::Attach(r) => Response::Attach(service.attach(r).await),
        Request::Detach(r) => Response::Detach(service.detach(r).await),
        Request::Commit(r) => Response::Commit(service.commit(r).await),
        Request::Merge(r) => Response::Merge(service.merge(r).await),
        Request::Clone(r) => Response::Clone(service.clone_resource(r).await),
        Request::Equals(r) => Response::Equals(service.equals(r).await),
        Request::SupportedTypes => Response::Types(service.supported_types()),
        Request::SupportedStorageTypes => Response::Types(service.supported_storage_types()),
        Request::SupportedCryptoMethods => Response::Types(service.supported_crypto_methods()),
        Request::IsSupportedType(r) => Response::Boolean(service.is_supported_type(r)),
        Request::IsSupportedStorageType(r) => {
            Response::Boolean(service.is_supported_storage_type(r))
        }
        Request::IsSupportedCryptoMethod(r) => {
            Response::Boolean(service.is_supported_crypto_method(r))
        }
        Request::SetInsert(r) => Response::SetInsert(service.set_insert(r).await),
        Request::SetRemove(r) => Response::SetRemove(service.set_remove(r).await),
        Request::SetContains(r) => Response::SetContains(service.set_contains(r).await),
        Request::SetLength(r) => Response::SetLength(service.set_length(r).await),
        Request::SetList(_) => unreachable!("streaming request handled by the caller"),
    }
}
