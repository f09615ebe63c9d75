use std::sync::Arc;

use tracing::{info, warn};

use crate::{clock::Clock, db::Store, error::AppResult};

/// Marks every pending invitation past its expiry as expired. Returns the
/// number of invitations changed.
pub async fn expire_invitations(store: &dyn Store, clock: &Clock) -> AppResult<u64> {
    let expired = store.expire_invitations(clock.now()).await?;
    if expired > 0 {
        info!("Expired {expired} pending invitation(s)");
    }
    Ok(expired)
}

/// Spawn a background task that sweeps expired invitations every
/// `interval_secs` seconds, starting right away.
pub fn start(store: Arc<dyn Store>, clock: Clock, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tokio::time::Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            if let Err(e) = expire_invitations(store.as_ref(), &clock).await {
                warn!("Invitation expiry sweep failed: {e}");
            }
        }
    });
}
