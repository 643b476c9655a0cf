pub mod config;
pub mod keys;
mod routes;
pub mod signer;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use regcomment_store::{StoreConfig, UrlSigner};
use tokio::net::TcpListener;
use tracing::info;

pub use routes::{build_router, AppState, InnerAppState};

use config::ServerConfig;
use signer::{LocalSigner, UploadBindings};

/// Wire the signer and store selected by `store_config` into shared state.
pub fn build_state(config: &ServerConfig, store_config: &StoreConfig) -> Result<AppState> {
    let base_url = format!("{}{}", config.public_url(), config.prefix());
    let bindings = Arc::new(UploadBindings::default());
    let signer: Arc<dyn UrlSigner> = match regcomment_store::create_signer(store_config)? {
        Some(signer) => {
            info!("presigning uploads against S3");
            signer
        }
        None => {
            info!("no bucket configured; serving uploads locally at {base_url}uploads/");
            Arc::new(LocalSigner::new(&base_url, bindings.clone()))
        }
    };
    let store = regcomment_store::create_store(store_config)?;

    Ok(Arc::new(InnerAppState {
        policy: config.policy(),
        signer,
        store,
        bindings,
        base_url,
    }))
}

pub async fn serve(listener: TcpListener, state: AppState, prefix: &str) -> Result<()> {
    let app = routes::build_router(state, prefix);
    axum::serve(listener, app).await?;
    Ok(())
}
