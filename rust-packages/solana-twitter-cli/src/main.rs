//! Solana Twitter CLI - messages and NFT profile pictures from the terminal.

use std::{path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{pubkey::Pubkey, signature::read_keypair_file};
use solana_twitter_sdk::{
    config::parse_commitment,
    ArweaveClient, Config, HttpMetadataSource, ImageFile, KeyFile, LocalBackup, MessageAccount,
    MessageClient, MetadataCache, MetaplexMintService, ProfilePictureReader, RpcProgramClient,
    SigningKey, UploadPipeline, Workspace,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "solana-twitter")]
#[command(about = "Solana Twitter CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// RPC URL
    #[arg(short = 'u', long, env = "SOLANA_TWITTER_CLUSTER_URL")]
    cluster_url: Option<String>,

    #[arg(long, env = "SOLANA_TWITTER_COMMITMENT")]
    commitment: Option<String>,

    #[arg(long, env = "SOLANA_TWITTER_PROGRAM_ID")]
    program_id: Option<String>,

    /// Arweave gateway base URL
    #[arg(long, env = "SOLANA_TWITTER_STORAGE_GATEWAY")]
    gateway: Option<String>,

    /// Wallet keypair [default: ~/.config/solana/id.json]
    #[arg(short, long)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show program and connection information
    Info,
    /// Generate a new Arweave key (RSA 4096, JWK)
    Keygen {
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Print the Arweave address of a key file
    Address {
        #[arg(long)]
        key_file: PathBuf,
    },
    /// Upload an image, mint it as an NFT and make it your profile picture
    UploadPfp {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Save the published metadata under the key in this JSON file
        #[arg(long, env = "SOLANA_TWITTER_BACKUP_PATH")]
        backup: Option<PathBuf>,
    },
    /// Show the current profile picture image
    ShowPfp {
        /// Defaults to the wallet owner
        #[arg(long)]
        owner: Option<String>,
    },
    /// Send, edit or delete a message
    #[command(subcommand)]
    Tweet(TweetCommand),
    /// List messages, newest first
    Tweets {
        #[arg(long)]
        author: Option<String>,
    },
}

#[derive(Subcommand)]
enum TweetCommand {
    Send {
        #[arg(long, default_value = "")]
        topic: String,
        content: String,
        /// Message id seed [default: current unix millis]
        #[arg(long)]
        id: Option<String>,
    },
    Update {
        message: String,
        #[arg(long, default_value = "")]
        topic: String,
        content: String,
    },
    Delete {
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let rpc = RpcClient::new_with_commitment(config.cluster_url.clone(), config.commitment);
    let rpc = Arc::new(rpc);
    let program = Arc::new(RpcProgramClient::new(Arc::clone(&rpc), config.program_id));
    let workspace = Workspace::new(config.clone());

    match cli.command {
        Commands::Info => {
            println!("Solana Twitter");
            println!("Program ID: {}", config.program_id);
            println!("Cluster:    {}", config.cluster_url);
            println!("Gateway:    {}", config.storage_gateway);
            println!("Version:    {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Keygen { out } => {
            let key = SigningKey::generate()?;
            tokio::fs::write(&out, key.to_json()?)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            println!("{}", key.address()?);
        }
        Commands::Address { key_file } => {
            let key = KeyFile::from_path(&key_file).load().await?;
            println!("{}", key.address()?);
        }
        Commands::UploadPfp {
            image,
            key_file,
            backup,
        } => {
            connect_wallet(&workspace, cli.keypair)?;
            let image = ImageFile::from_path(&image).await?;
            let key_file = key_file.map(KeyFile::from_path);

            let mut pipeline = UploadPipeline::new(
                workspace.clone(),
                Arc::new(ArweaveClient::new(config.storage_gateway.clone())),
                Arc::new(MetaplexMintService::new(Arc::clone(&rpc))),
                program,
            );
            if let Some(path) = backup {
                pipeline = pipeline.with_backup(LocalBackup::new(path));
            }

            let outcome = pipeline.run(&image, key_file.as_ref()).await?;
            info!(generation = workspace.refresh_generation(), "pipeline finished");
            print_json(&json!({
                "image": outcome.image.uri(&config.storage_gateway),
                "metadata": outcome.metadata.address.uri(&config.storage_gateway),
                "mint": outcome.mint.mint_address.to_string(),
                "tokenAccount": outcome.mint.token_address.to_string(),
                "user": outcome.bind.accounts.user.to_string(),
                "action": format!("{:?}", outcome.bind.action),
                "signature": outcome.bind.signature.to_string(),
            }))?;
        }
        Commands::ShowPfp { owner } => {
            let owner = match owner {
                Some(raw) => parse_pubkey(&raw)?,
                None => {
                    connect_wallet(&workspace, cli.keypair)?;
                    workspace.owner().context("no wallet connected")?
                }
            };
            let reader = ProfilePictureReader::new(
                workspace,
                program,
                Arc::new(MetaplexMintService::new(rpc)),
                Arc::new(MetadataCache::new(Arc::new(HttpMetadataSource::new()?))),
            );
            match reader.image_for(&owner).await? {
                Some(image) => println!("{image}"),
                None => println!("{owner} has no profile picture"),
            }
        }
        Commands::Tweet(command) => {
            connect_wallet(&workspace, cli.keypair)?;
            let messages = MessageClient::new(workspace, program);
            match command {
                TweetCommand::Send { topic, content, id } => {
                    let message = match id {
                        Some(id) => messages.send_with_id(&id, &topic, &content).await?,
                        None => messages.send(&topic, &content).await?,
                    };
                    println!("{message}");
                }
                TweetCommand::Update {
                    message,
                    topic,
                    content,
                } => {
                    let message = parse_pubkey(&message)?;
                    let signature = messages.update(&message, &topic, &content).await?;
                    println!("{signature}");
                }
                TweetCommand::Delete { message } => {
                    let signature = messages.delete(&parse_pubkey(&message)?).await?;
                    println!("{signature}");
                }
            }
        }
        Commands::Tweets { author } => {
            let author = author.as_deref().map(parse_pubkey).transpose()?;
            let messages = MessageClient::new(workspace, program);
            let feed = messages.list(author.as_ref()).await?;
            print_json(&feed.iter().map(message_json).collect())?;
        }
    }

    Ok(())
}

/// Environment first, then explicit flags on top.
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(url) = &cli.cluster_url {
        config.cluster_url = url.clone();
    }
    if let Some(raw) = &cli.commitment {
        config.commitment = parse_commitment(raw)?;
    }
    if let Some(raw) = &cli.program_id {
        config.program_id = parse_pubkey(raw)?;
    }
    if let Some(gateway) = &cli.gateway {
        config.storage_gateway = gateway.trim_end_matches('/').to_string();
    }
    Ok(config)
}

fn connect_wallet(workspace: &Workspace, keypair: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match keypair {
        Some(path) => path,
        None => {
            let home = std::env::var("HOME").context("HOME is not set; pass --keypair")?;
            PathBuf::from(home).join(".config/solana/id.json")
        }
    };
    let keypair = read_keypair_file(&path)
        .map_err(|e| anyhow!("reading keypair {}: {e}", path.display()))?;
    workspace.connect(Arc::new(keypair));
    Ok(())
}

fn parse_pubkey(raw: &str) -> anyhow::Result<Pubkey> {
    Pubkey::from_str(raw).with_context(|| format!("invalid public key: {raw}"))
}

fn message_json(message: &MessageAccount) -> serde_json::Value {
    json!({
        "address": message.address.to_string(),
        "author": message.author.to_string(),
        "timestamp": message.timestamp,
        "topic": message.topic,
        "content": message.content,
    })
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
