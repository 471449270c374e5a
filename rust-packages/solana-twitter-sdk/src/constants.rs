//! Constants for the Solana Twitter SDK.

use solana_sdk::pubkey::Pubkey;

// =============================================================================
// PDA SEEDS
// =============================================================================

/// Seed for the user record PDA: ["user", owner]
pub const USER_SEED: &[u8] = b"user";

// =============================================================================
// PROGRAM IDS
// =============================================================================

/// SPL Token program (classic, not Token-2022)
pub const SPL_TOKEN_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

// =============================================================================
// MESSAGE LIMITS
// =============================================================================

/// Maximum topic length in characters
pub const MAX_TOPIC_CHARS: usize = 50;

/// Maximum content length in characters
pub const MAX_CONTENT_CHARS: usize = 280;

/// Seeds are capped at 32 bytes by the runtime
pub const MAX_MESSAGE_ID_BYTES: usize = 32;

// =============================================================================
// PROFILE PICTURE NFT
// =============================================================================

/// Display name passed to the minting service
pub const PFP_MINT_NAME: &str = "Profile NFT";

/// Name written into the metadata document
pub const PFP_METADATA_NAME: &str = "NFT Profile Picture";

pub const PFP_METADATA_DESCRIPTION: &str = "This is a profile picture";

/// Secondary sales carry no royalty
pub const PFP_SELLER_FEE_BASIS_POINTS: u16 = 0;

/// Single-edition policy
pub const PFP_MAX_SUPPLY: u64 = 1;

/// Creator shares in a metadata document must sum to this
pub const TOTAL_CREATOR_SHARES: u8 = 100;

// =============================================================================
// STORAGE NETWORK
// =============================================================================

pub const DEFAULT_STORAGE_GATEWAY: &str = "https://arweave.net";

pub const CONTENT_TYPE_TAG: &str = "Content-Type";

pub const JSON_CONTENT_TYPE: &str = "application/json";

// =============================================================================
// CLUSTER
// =============================================================================

pub const DEFAULT_CLUSTER_URL: &str = "https://api.devnet.solana.com";

pub const DEFAULT_COMMITMENT: &str = "processed";
