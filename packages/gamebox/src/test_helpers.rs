use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

use crate::AppState;
use crate::config::{FileConfig, GameboxConfig};
use crate::hub::BroadcastHub;
use crate::metrics::ServerMetrics;
use crate::modes::{GameMode, ImposterMode};
use crate::registry::{RegistrySettings, SessionRegistry};
use crate::words::WordList;

/// Registry with the built-in word list and a fixed RNG seed.
pub fn test_registry() -> SessionRegistry {
    let imposter: Arc<dyn GameMode> = Arc::new(ImposterMode::new(Arc::new(WordList::builtin())));
    SessionRegistry::with_rng(
        BroadcastHub::new(64),
        vec![imposter],
        RegistrySettings::default(),
        StdRng::seed_from_u64(0x5eed),
    )
}

/// Build a fully-wired `AppState` with default configuration.
pub fn test_app_state() -> AppState {
    AppState {
        registry: Arc::new(test_registry()),
        metrics: Arc::new(ServerMetrics::new()),
        config: Arc::new(GameboxConfig::from_file(&FileConfig::default())),
    }
}
