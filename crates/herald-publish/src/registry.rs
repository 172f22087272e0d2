use std::sync::Arc;

use herald_core::{Platform, PlatformFamily};

use crate::adapter::PublishAdapter;

/// Static platform → adapter table.
///
/// One adapter per [`PlatformFamily`]; the match in [`Self::for_family`] is
/// exhaustive, so a new family cannot be added without wiring an adapter.
#[derive(Clone)]
pub struct AdapterRegistry {
    direct: Arc<dyn PublishAdapter>,
    aggregator: Arc<dyn PublishAdapter>,
}

impl AdapterRegistry {
    pub fn new(direct: Arc<dyn PublishAdapter>, aggregator: Arc<dyn PublishAdapter>) -> Self {
        Self { direct, aggregator }
    }

    pub fn for_family(&self, family: PlatformFamily) -> &Arc<dyn PublishAdapter> {
        match family {
            PlatformFamily::Direct => &self.direct,
            PlatformFamily::Aggregator => &self.aggregator,
        }
    }

    pub fn for_platform(&self, platform: Platform) -> &Arc<dyn PublishAdapter> {
        self.for_family(platform.family())
    }
}
