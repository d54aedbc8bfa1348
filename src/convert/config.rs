use serde::{Deserialize, Serialize};

/// Configuration for batch conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Index given to the first line item when no item header (`H`) sets one.
    pub first_item_index: u32,
    /// Spread documents over the rayon pool. Only effective with the
    /// `parallel` feature; output order is the same either way.
    pub parallel: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            first_item_index: 1,
            parallel: true,
        }
    }
}

/// Builder for [`ConvertConfig`].
///
/// # Example
///
/// ```
/// use notafiscal::convert::ConvertConfigBuilder;
///
/// let config = ConvertConfigBuilder::new()
///     .first_item_index(0)
///     .parallel(false)
///     .build();
/// assert_eq!(config.first_item_index, 0);
/// ```
#[derive(Debug, Default)]
pub struct ConvertConfigBuilder {
    config: ConvertConfig,
}

impl ConvertConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting item index.
    pub fn first_item_index(mut self, index: u32) -> Self {
        self.config.first_item_index = index;
        self
    }

    /// Enable or disable parallel document processing.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ConvertConfig {
        self.config
    }
}
