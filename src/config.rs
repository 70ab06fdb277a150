/// Entity service configuration
///
/// Every field has a default; use the builder methods to override.
#[derive(Debug, Clone)]
pub struct EntityServiceConfig {
    /// Upper bound applied to `limit` (and used for `limit = -1`)
    pub max_limit: Option<u64>,

    /// Page size used by `find_page` when the caller gives none
    pub default_page_size: u64,

    /// Delete component rows an update no longer references
    pub prune_stale_components: bool,

    /// Delete dynamic-zone members together with their parent
    pub cascade_dynamic_zones: bool,
}

impl EntityServiceConfig {
    pub fn new() -> Self {
        Self {
            max_limit: None,
            default_page_size: 10,
            prune_stale_components: true,
            cascade_dynamic_zones: true,
        }
    }

    /// Set maximum limit
    pub fn max_limit(mut self, max: u64) -> Self {
        self.max_limit = Some(max);
        self
    }

    /// Set default page size
    pub fn default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size.max(1);
        self
    }

    /// Keep component rows an update stopped referencing
    pub fn keep_stale_components(mut self) -> Self {
        self.prune_stale_components = false;
        self
    }

    /// Leave dynamic-zone members behind when their parent is deleted
    pub fn keep_dynamic_zone_members(mut self) -> Self {
        self.cascade_dynamic_zones = false;
        self
    }
}

impl Default for EntityServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}
