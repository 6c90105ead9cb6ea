//! Keystead OM - key manager admin tool
//!
//! Wires a redb metadata store, the in-process block allocator and (when
//! enabled) the block token authority, then runs one key operation and
//! prints the result as JSON.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use keystead_common::{Config, KeyRequest, ReplicationFactor, ReplicationType};
use keystead_meta_store::RedbMetaStore;
use keystead_om::{BlockLocation, KeyManager, KeyRecord, LocalBlockAllocator, OmMetadataManager};
use keystead_token::{
    BlockToken, BlockTokenAuthority, SigningKey, SystemClock, TokenIdentifier,
    generate_signing_key, signing_key_from_hex,
};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "keystead-om")]
#[command(about = "Keystead key manager")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/keystead/om.toml")]
    config: String,

    /// Metadata database path (overrides om.db_path)
    #[arg(long, env = "KEYSTEAD_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Log level (overrides logging.level)
    #[arg(long)]
    log_level: Option<String>,

    /// Refuse block allocations as if the cluster were in chill mode
    #[arg(long)]
    chill_mode: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a volume
    CreateVolume {
        volume: String,
        #[arg(long, default_value = "admin")]
        owner: String,
    },
    /// Register a bucket inside an existing volume
    CreateBucket { volume: String, bucket: String },
    /// Open a key and allocate its first block
    OpenKey {
        #[command(flatten)]
        key: KeyArgs,
        /// Expected data size in bytes
        #[arg(long)]
        size: Option<i64>,
        /// STAND_ALONE, RATIS or CHAINED
        #[arg(long, default_value = "STAND_ALONE")]
        replication_type: String,
        /// 1 or 3
        #[arg(long, default_value_t = 1)]
        replication_factor: u8,
    },
    /// Allocate one more block for an open key version
    AllocateBlock {
        #[command(flatten)]
        key: KeyArgs,
        #[arg(long, default_value_t = 1)]
        version: u64,
    },
    /// Look up a key
    LookupKey {
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Verify a hex-encoded block token
    VerifyToken { token: String },
}

#[derive(clap::Args, Debug)]
struct KeyArgs {
    volume: String,
    bucket: String,
    key: String,
    /// Identity the block tokens are issued to
    #[arg(long)]
    user: Option<String>,
}

impl KeyArgs {
    fn request(&self) -> KeyRequest {
        let req = KeyRequest::new(&self.volume, &self.bucket, &self.key);
        match &self.user {
            Some(user) => req.with_user(user),
            None => req,
        }
    }
}

fn load_config(path: &str) -> Config {
    if Path::new(path).exists() {
        match std::fs::read_to_string(path) {
            Ok(s) => toml::from_str(&s).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {e}");
                Config::default()
            }),
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {e}");
                Config::default()
            }
        }
    } else {
        Config::default()
    }
}

fn parse_replication(kind: &str, factor: u8) -> Result<(ReplicationType, ReplicationFactor)> {
    let kind = match kind.to_ascii_uppercase().as_str() {
        "STAND_ALONE" | "STANDALONE" => ReplicationType::StandAlone,
        "RATIS" => ReplicationType::Ratis,
        "CHAINED" => ReplicationType::Chained,
        other => bail!("unknown replication type: {other}"),
    };
    let factor = match factor {
        1 => ReplicationFactor::One,
        3 => ReplicationFactor::Three,
        other => bail!("unsupported replication factor: {other}"),
    };
    Ok((kind, factor))
}

/// Load the hex signing key seed, creating it on first use
fn load_or_create_signing_key(path: &Path) -> Result<SigningKey> {
    if path.exists() {
        let seed = std::fs::read_to_string(path)
            .with_context(|| format!("reading signing key {}", path.display()))?;
        return Ok(signing_key_from_hex(&seed)?);
    }

    let key = generate_signing_key();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, hex::encode(key.to_bytes()))
        .with_context(|| format!("writing signing key {}", path.display()))?;
    info!("Generated block token signing key at {}", path.display());
    Ok(key)
}

fn token_json(token: &BlockToken) -> Value {
    json!(hex::encode(token.to_bytes()))
}

fn identifier_json(id: &TokenIdentifier) -> Value {
    json!({
        "kind": id.kind,
        "owner": id.owner,
        "containerId": id.block_id.container_id,
        "localId": id.block_id.local_id,
        "issueTime": id.issue_time,
        "expiryTime": id.expiry_time,
        "maxLength": id.max_length,
    })
}

fn location_json(location: &BlockLocation) -> Value {
    json!({
        "containerId": location.block_id.container_id,
        "localId": location.block_id.local_id,
        "offset": location.offset,
        "length": location.length,
        "token": location.token.as_ref().map(token_json),
    })
}

fn record_json(record: &KeyRecord) -> Value {
    let versions: Vec<Value> = record
        .versions
        .iter()
        .map(|v| {
            json!({
                "version": v.version,
                "locations": v.locations.iter().map(location_json).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "volume": record.volume,
        "bucket": record.bucket,
        "key": record.key,
        "dataSize": record.data_size,
        "creationTime": record.creation_time,
        "modificationTime": record.modification_time,
        "replicationType": record.replication_type.as_str(),
        "replicationFactor": record.replication_factor.replicas(),
        "versions": versions,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(&args.config);
    if let Some(db_path) = &args.db_path {
        config.om.db_path.clone_from(db_path);
    }
    if args.chill_mode {
        config.scm.chill_mode = true;
    }

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("Config file: {}", args.config);
    debug!("Metadata database: {}", config.om.db_path.display());

    let store = Arc::new(
        RedbMetaStore::open(&config.om.db_path)
            .with_context(|| format!("opening {}", config.om.db_path.display()))?,
    );
    let metadata = Arc::new(OmMetadataManager::new(store));

    // Local ids are seeded from the wall clock so separate invocations
    // against the same database never hand out the same block id.
    let first_local_id = chrono::Utc::now().timestamp_millis() * 1000;
    let scm = Arc::new(LocalBlockAllocator::new(
        config.scm.container_id,
        first_local_id,
    ));
    scm.set_chill_mode(config.scm.chill_mode);

    let key_path = config
        .security
        .signing_key_path
        .clone()
        .unwrap_or_else(|| config.om.db_path.with_extension("key"));
    let verifying = matches!(args.command, Command::VerifyToken { .. });
    let authority = if config.block_tokens_enabled() || verifying {
        let authority = Arc::new(BlockTokenAuthority::new(
            config.security.block_token_expiry_ms,
            Arc::new(SystemClock),
        ));
        authority.start(load_or_create_signing_key(&key_path)?)?;
        Some(authority)
    } else {
        None
    };

    let output = match args.command {
        Command::CreateVolume { volume, owner } => {
            let info = metadata.create_volume(&volume, &owner)?;
            json!({
                "volume": info.name,
                "owner": info.owner,
                "creationTime": info.creation_time,
            })
        }
        Command::CreateBucket { volume, bucket } => {
            let info = metadata.create_bucket(&volume, &bucket)?;
            json!({
                "volume": info.volume,
                "bucket": info.name,
                "creationTime": info.creation_time,
            })
        }
        Command::OpenKey {
            key,
            size,
            replication_type,
            replication_factor,
        } => {
            let (kind, factor) = parse_replication(&replication_type, replication_factor)?;
            let mut req = key.request().with_replication(kind, factor);
            if let Some(size) = size {
                req = req.with_data_size(size);
            }
            let manager = key_manager(&config, scm, metadata, authority);
            record_json(&manager.open_key(&req)?)
        }
        Command::AllocateBlock { key, version } => {
            let manager = key_manager(&config, scm, metadata, authority);
            location_json(&manager.allocate_block(&key.request(), version)?)
        }
        Command::LookupKey { key } => {
            let manager = key_manager(&config, scm, metadata, authority);
            record_json(&manager.lookup_key(&key.request())?)
        }
        Command::VerifyToken { token } => {
            let bytes = hex::decode(token.trim()).context("token is not valid hex")?;
            let token = BlockToken::from_bytes(&bytes)?;
            let Some(authority) = authority else {
                bail!("block token authority unavailable");
            };
            match authority.verify(&token) {
                Ok(id) => json!({ "valid": true, "identifier": identifier_json(&id) }),
                Err(e) => {
                    warn!("Token rejected: {}", e);
                    json!({ "valid": false, "error": e.to_string() })
                }
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Key operations mint tokens only when security and block tokens are on
fn key_manager(
    config: &Config,
    scm: Arc<LocalBlockAllocator>,
    metadata: Arc<OmMetadataManager>,
    authority: Option<Arc<BlockTokenAuthority>>,
) -> KeyManager {
    let authority = authority.filter(|_| config.block_tokens_enabled());
    KeyManager::new(scm, metadata, &config.om, authority)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replication() {
        assert_eq!(
            parse_replication("stand_alone", 1).unwrap(),
            (ReplicationType::StandAlone, ReplicationFactor::One)
        );
        assert_eq!(
            parse_replication("RATIS", 3).unwrap(),
            (ReplicationType::Ratis, ReplicationFactor::Three)
        );
        assert!(parse_replication("EC", 1).is_err());
        assert!(parse_replication("RATIS", 2).is_err());
    }

    #[test]
    fn test_signing_key_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/om.key");
        let first = load_or_create_signing_key(&path).unwrap();
        let second = load_or_create_signing_key(&path).unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config("/nonexistent/keystead/om.toml");
        assert_eq!(config.om.service_id, "om1");
    }
}
