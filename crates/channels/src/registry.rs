use {super::adapter::ChannelAdapter, dray_common::ChannelType, std::collections::HashMap};

/// Registry of all wired channel adapters, keyed by channel type.
///
/// Populated once at startup, then shared read-only. A channel with no
/// entry here is reported as unconfigured, never as an error.
pub struct AdapterRegistry {
    adapters: HashMap<ChannelType, Box<dyn ChannelAdapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter under its own channel type, replacing any
    /// previous adapter for that type.
    pub fn register(&mut self, adapter: Box<dyn ChannelAdapter>) {
        self.adapters.insert(adapter.channel_type(), adapter);
    }

    #[must_use]
    pub fn get(&self, channel: ChannelType) -> Option<&dyn ChannelAdapter> {
        self.adapters.get(&channel).map(|a| a.as_ref())
    }

    #[must_use]
    pub fn contains(&self, channel: ChannelType) -> bool {
        self.adapters.contains_key(&channel)
    }

    #[must_use]
    pub fn list(&self) -> Vec<ChannelType> {
        self.adapters.keys().copied().collect()
    }
}
