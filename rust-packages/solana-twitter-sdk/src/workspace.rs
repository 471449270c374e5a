//! Shared client context: configuration plus the connected wallet.
//!
//! A [`Workspace`] is cheap to clone and is handed to every component that
//! needs the active wallet. Connecting, disconnecting and refresh requests are
//! published on a [`tokio::sync::watch`] channel so that views can resync.

use std::{fmt, sync::Arc};

use solana_sdk::{pubkey::Pubkey, signer::Signer};
use tokio::sync::watch;
use tracing::info;

use crate::{
    config::Config,
    error::{Error, Result},
};

/// Thread-safe handle to the wallet that signs Solana transactions.
pub type WalletSigner = Arc<dyn Signer + Send + Sync>;

/// Snapshot of the wallet state observed by subscribers.
#[derive(Clone, Default)]
pub struct WalletState {
    pub signer: Option<WalletSigner>,
    /// Bumped on every [`Workspace::request_refresh`]
    pub refresh_generation: u64,
}

impl WalletState {
    pub fn owner(&self) -> Option<Pubkey> {
        self.signer.as_ref().map(|s| s.pubkey())
    }

    pub fn is_connected(&self) -> bool {
        self.signer.is_some()
    }
}

impl fmt::Debug for WalletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletState")
            .field("owner", &self.owner())
            .field("refresh_generation", &self.refresh_generation)
            .finish()
    }
}

#[derive(Clone)]
pub struct Workspace {
    inner: Arc<WorkspaceInner>,
}

struct WorkspaceInner {
    config: Config,
    state: watch::Sender<WalletState>,
}

impl Workspace {
    pub fn new(config: Config) -> Self {
        let (state, _) = watch::channel(WalletState::default());
        Self {
            inner: Arc::new(WorkspaceInner { config, state }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn connect(&self, signer: WalletSigner) {
        info!(owner = %signer.pubkey(), "wallet connected");
        self.inner
            .state
            .send_modify(|state| state.signer = Some(signer));
    }

    pub fn disconnect(&self) {
        self.inner.state.send_modify(|state| {
            if let Some(signer) = state.signer.take() {
                info!(owner = %signer.pubkey(), "wallet disconnected");
            }
        });
    }

    pub fn signer(&self) -> Option<WalletSigner> {
        self.inner.state.borrow().signer.clone()
    }

    /// The connected wallet, or [`Error::NoWalletConnected`].
    pub fn require_signer(&self) -> Result<WalletSigner> {
        self.signer().ok_or(Error::NoWalletConnected)
    }

    pub fn owner(&self) -> Option<Pubkey> {
        self.inner.state.borrow().owner()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().is_connected()
    }

    /// Ask every subscriber to reload its view of on-chain state.
    pub fn request_refresh(&self) {
        self.inner
            .state
            .send_modify(|state| state.refresh_generation += 1);
    }

    pub fn refresh_generation(&self) -> u64 {
        self.inner.state.borrow().refresh_generation
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.inner.state.subscribe()
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("config", &self.inner.config)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}
