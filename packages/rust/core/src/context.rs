use std::sync::Arc;

use feedherald_shared::Config;
use feedherald_storage::Ledger;

use crate::platform::ChatPlatform;

/// Handles shared by every bridge component.
#[derive(Clone)]
pub struct BridgeContext {
    pub config: Arc<Config>,
    pub ledger: Ledger,
    pub platform: Arc<dyn ChatPlatform>,
}

impl BridgeContext {
    pub fn new(config: Config, ledger: Ledger, platform: Arc<dyn ChatPlatform>) -> Self {
        Self {
            config: Arc::new(config),
            ledger,
            platform,
        }
    }
}
