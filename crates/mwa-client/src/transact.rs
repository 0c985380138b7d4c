//! Session-scoped access to a wallet.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use mwa_core::{AssociationConfig, NativeModule};

use crate::error::{translate, MobileWalletError};
use crate::wallet::MobileWallet;
use crate::web3::Web3MobileWallet;

/// Run `callback` against a wallet session.
///
/// The session is started before `callback` runs and ended after it
/// returns, whether it succeeded or not. An error from `callback` is
/// returned as is; a failure to end the session is only reported when
/// `callback` succeeded.
///
/// If the returned future is dropped while the session is open, the session
/// is ended on a background task.
pub async fn transact<T, F, Fut>(
    module: Arc<dyn NativeModule>,
    config: Option<AssociationConfig>,
    callback: F,
) -> Result<T, MobileWalletError>
where
    F: FnOnce(MobileWallet) -> Fut,
    Fut: Future<Output = Result<T, MobileWalletError>>,
{
    module.start_session(config).await.map_err(translate)?;
    debug!("wallet session started");

    let pending_end = EndOnDrop::new(module.clone());
    let outcome = callback(MobileWallet::new(module.clone())).await;
    pending_end.disarm();
    let ended = module.end_session().await.map_err(translate);

    match (outcome, ended) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(end_error)) => {
            warn!(error = %end_error, "failed to end session after callback error");
            Err(e)
        }
    }
}

/// Ends the session if `transact` is dropped between start and end.
struct EndOnDrop {
    module: Option<Arc<dyn NativeModule>>,
}

impl EndOnDrop {
    fn new(module: Arc<dyn NativeModule>) -> Self {
        Self {
            module: Some(module),
        }
    }

    fn disarm(mut self) {
        self.module = None;
    }
}

impl Drop for EndOnDrop {
    fn drop(&mut self) {
        let Some(module) = self.module.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                warn!("transact dropped with an open session, ending it");
                handle.spawn(async move {
                    if let Err(e) = module.end_session().await {
                        warn!(error = %e, "failed to end session of dropped transact");
                    }
                });
            }
            Err(_) => warn!("transact dropped outside a runtime, session left open"),
        }
    }
}

/// [`transact`] with the typed [`Web3MobileWallet`] handle.
pub async fn transact_web3<T, F, Fut>(
    module: Arc<dyn NativeModule>,
    config: Option<AssociationConfig>,
    callback: F,
) -> Result<T, MobileWalletError>
where
    F: FnOnce(Web3MobileWallet) -> Fut,
    Fut: Future<Output = Result<T, MobileWalletError>>,
{
    transact(module, config, |wallet| callback(Web3MobileWallet::new(wallet))).await
}
