//! Caller options for Basis supercompression.

use thiserror::Error;

/// Highest accepted quality level.
pub const MAX_QUALITY_LEVEL: u32 = 255;
/// Quality used when neither a quality level nor both cluster caps are given.
pub const DEFAULT_QUALITY_LEVEL: u32 = 128;
/// Highest accepted compression level.
pub const MAX_COMPRESSION_LEVEL: u32 = 5;
/// Compression level used when the caller passes 0.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 1;
/// Highest endpoint or selector cluster count the encoder supports.
pub const MAX_CLUSTERS: u32 = 16128;

/// Options for [`crate::compress_basis_ex`].
///
/// The [`Default`] value requests the default quality on a single thread.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BasisParams {
    /// Encoder worker threads. 0 is treated as 1.
    pub thread_count: u32,
    /// Encoder effort, 0 for [`DEFAULT_COMPRESSION_LEVEL`].
    pub compression_level: u32,
    /// 1 to 255, lower is smaller and lower quality. 0 selects a default.
    ///
    /// A non-zero value overrides [`Self::max_endpoints`] and [`Self::max_selectors`].
    pub quality_level: u32,
    /// Endpoint cluster cap. Only used when both caps are non-zero.
    pub max_endpoints: u32,
    /// Selector cluster cap. Only used when both caps are non-zero.
    pub max_selectors: u32,
    /// Endpoint RDO threshold, forwarded when greater than 0.
    pub endpoint_rdo_threshold: f32,
    /// Selector RDO threshold, forwarded when greater than 0.
    pub selector_rdo_threshold: f32,
    /// Disables both RDO passes.
    pub normal_map: bool,
    /// Maps red to RGB and green to alpha before encoding.
    pub separate_rg_to_rgb_a: bool,
    /// Applies the texture's `KTXswizzle` metadata before encoding.
    pub pre_swizzle: bool,
    /// Disables endpoint RDO.
    pub no_endpoint_rdo: bool,
    /// Disables selector RDO.
    pub no_selector_rdo: bool,
}

impl BasisParams {
    /// Parameters for a single threaded run at `quality_level`.
    pub fn with_quality(quality_level: u32) -> Self {
        Self {
            thread_count: 1,
            quality_level,
            ..Default::default()
        }
    }

    /// Checks every field is within the range the encoder accepts.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.quality_level > MAX_QUALITY_LEVEL {
            return Err(ParamsError::QualityLevel(self.quality_level));
        }
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(ParamsError::CompressionLevel(self.compression_level));
        }
        if self.max_endpoints > MAX_CLUSTERS {
            return Err(ParamsError::EndpointClusters(self.max_endpoints));
        }
        if self.max_selectors > MAX_CLUSTERS {
            return Err(ParamsError::SelectorClusters(self.max_selectors));
        }
        if !is_valid_threshold(self.endpoint_rdo_threshold) {
            return Err(ParamsError::EndpointRdoThreshold(self.endpoint_rdo_threshold));
        }
        if !is_valid_threshold(self.selector_rdo_threshold) {
            return Err(ParamsError::SelectorRdoThreshold(self.selector_rdo_threshold));
        }
        Ok(())
    }
}

#[inline]
fn is_valid_threshold(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

/// Malformed [`BasisParams`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ParamsError {
    /// Quality above [`MAX_QUALITY_LEVEL`].
    #[error("Quality level {0} exceeds 255")]
    QualityLevel(u32),

    /// Compression level above [`MAX_COMPRESSION_LEVEL`].
    #[error("Compression level {0} exceeds 5")]
    CompressionLevel(u32),

    /// Endpoint cap above [`MAX_CLUSTERS`].
    #[error("Endpoint cluster count {0} exceeds 16128")]
    EndpointClusters(u32),

    /// Selector cap above [`MAX_CLUSTERS`].
    #[error("Selector cluster count {0} exceeds 16128")]
    SelectorClusters(u32),

    /// Negative or non finite endpoint RDO threshold.
    #[error("Invalid endpoint RDO threshold {0}")]
    EndpointRdoThreshold(f32),

    /// Negative or non finite selector RDO threshold.
    #[error("Invalid selector RDO threshold {0}")]
    SelectorRdoThreshold(f32),
}

/// Builder for [`BasisParams`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BasisParamsBuilder {
    params: BasisParams,
}

impl BasisParamsBuilder {
    /// Create a new builder with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of encoder worker threads.
    pub fn thread_count(mut self, thread_count: u32) -> Self {
        self.params.thread_count = thread_count;
        self
    }

    /// Set the encoder effort, 0 for the default.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.params.compression_level = level;
        self
    }

    /// Set the quality level, 0 for the default.
    pub fn quality_level(mut self, level: u32) -> Self {
        self.params.quality_level = level;
        self
    }

    /// Cap the endpoint and selector cluster counts.
    ///
    /// Ignored when a quality level is set.
    pub fn max_clusters(mut self, endpoints: u32, selectors: u32) -> Self {
        self.params.max_endpoints = endpoints;
        self.params.max_selectors = selectors;
        self
    }

    /// Set the endpoint and selector RDO thresholds.
    pub fn rdo_thresholds(mut self, endpoint: f32, selector: f32) -> Self {
        self.params.endpoint_rdo_threshold = endpoint;
        self.params.selector_rdo_threshold = selector;
        self
    }

    /// Disable RDO, for normal maps.
    pub fn normal_map(mut self, normal_map: bool) -> Self {
        self.params.normal_map = normal_map;
        self
    }

    /// Map red to RGB and green to alpha before encoding.
    pub fn separate_rg_to_rgb_a(mut self, separate: bool) -> Self {
        self.params.separate_rg_to_rgb_a = separate;
        self
    }

    /// Apply the texture's swizzle metadata before encoding.
    pub fn pre_swizzle(mut self, pre_swizzle: bool) -> Self {
        self.params.pre_swizzle = pre_swizzle;
        self
    }

    /// Disable the endpoint and/or selector RDO passes.
    pub fn disable_rdo(mut self, endpoint: bool, selector: bool) -> Self {
        self.params.no_endpoint_rdo = endpoint;
        self.params.no_selector_rdo = selector;
        self
    }

    /// Validate and return the parameters.
    pub fn build(self) -> Result<BasisParams, ParamsError> {
        self.params.validate()?;
        Ok(self.params)
    }
}
