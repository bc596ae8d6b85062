//! Process-wide shared state: the script registry and installed terminal
//! properties.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::properties::TerminalProperties;

/// Names of scripts queued for compilation, uppercased.
///
/// Every dynamic script is also compiled. Entries are never removed.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    compiled: RwLock<HashSet<String>>,
    dynamic: RwLock<HashSet<String>>,
}

impl ScriptRegistry {
    pub fn register_compiled(&self, name: &str) {
        self.compiled.write().insert(name.to_ascii_uppercase());
    }

    pub fn register_dynamic(&self, name: &str) {
        let name = name.to_ascii_uppercase();
        self.compiled.write().insert(name.clone());
        self.dynamic.write().insert(name);
    }

    pub fn is_compiled(&self, name: &str) -> bool {
        self.compiled.read().contains(&name.to_ascii_uppercase())
    }

    pub fn is_dynamic(&self, name: &str) -> bool {
        self.dynamic.read().contains(&name.to_ascii_uppercase())
    }
}

/// Shared state handed to queues and executors.
///
/// Properties are replaced wholesale; sessions keep the snapshot they started
/// with.
#[derive(Debug, Default)]
pub struct EngineContext {
    properties: RwLock<Arc<TerminalProperties>>,
    registry: ScriptRegistry,
}

static GLOBAL: OnceLock<Arc<EngineContext>> = OnceLock::new();

impl EngineContext {
    pub fn new(properties: TerminalProperties) -> Arc<Self> {
        Arc::new(EngineContext {
            properties: RwLock::new(Arc::new(properties)),
            registry: ScriptRegistry::default(),
        })
    }

    /// The context shared by everything in the process that is not handed
    /// one explicitly.
    pub fn global() -> Arc<Self> {
        GLOBAL.get_or_init(Arc::default).clone()
    }

    /// Current properties snapshot.
    pub fn properties(&self) -> Arc<TerminalProperties> {
        self.properties.read().clone()
    }

    /// Replace the properties. Last writer wins.
    pub fn install(&self, properties: TerminalProperties) {
        debug!("installing terminal properties");
        *self.properties.write() = Arc::new(properties);
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_dynamic_implies_compiled() {
        let registry = ScriptRegistry::default();
        registry.register_dynamic("wrap_abc");
        assert!(registry.is_dynamic("WRAP_ABC"));
        assert!(registry.is_compiled("wrap_abc"));

        registry.register_compiled("plain");
        assert!(registry.is_compiled("PLAIN"));
        assert!(!registry.is_dynamic("plain"));
    }

    #[test]
    fn test_install_leaves_held_snapshot_alone() {
        let context = EngineContext::new(TerminalProperties::default());
        let held = context.properties();
        context.install(
            TerminalProperties::builder()
                .with_expectation_timeout(Duration::from_secs(1))
                .build()
                .unwrap(),
        );
        assert_eq!(held.expectation_timeout(), crate::DEFAULT_EXPECTATION_TIMEOUT);
        assert_eq!(context.properties().expectation_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_global_is_shared() {
        let a = EngineContext::global();
        let b = EngineContext::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
