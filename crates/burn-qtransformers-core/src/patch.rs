//! Patch embedding for vision inputs
//!
//! A convolution with kernel = stride = `patch_size` and no padding is the
//! same as cutting the image into non-overlapping windows, flattening each
//! window, and multiplying by one shared matrix. That is what this module
//! does. Rows and columns that do not fill a whole patch are dropped.

use burn::nn::Linear;
use burn::prelude::*;

use crate::error::ModelError;
use crate::init::ParamInit;
use crate::projection::dense;

/// Number of patches along one side of a `image_size` square
pub fn patches_per_side(image_size: usize, patch_size: usize) -> usize {
    image_size / patch_size
}

/// Patchify: Convert a channels-last image to a sequence of patch embeddings
#[derive(Module, Debug)]
pub struct PatchEmbed<B: Backend> {
    /// Projection from a flattened `(patch, patch, channels)` window to hidden dim
    pub proj: Linear<B>,
    /// Patch size
    pub patch_size: usize,
    /// Number of input channels
    pub in_channels: usize,
}

/// Configuration for PatchEmbed
#[derive(Debug, Clone)]
pub struct PatchEmbedConfig {
    /// Patch size (height = width = stride)
    pub patch_size: usize,
    /// Number of input channels
    pub in_channels: usize,
    /// Hidden dimension
    pub hidden_size: usize,
}

impl PatchEmbedConfig {
    pub fn new(patch_size: usize, in_channels: usize, hidden_size: usize) -> Self {
        Self {
            patch_size,
            in_channels,
            hidden_size,
        }
    }

    /// Initialize the module
    ///
    /// Kernel weights are LeCun-normal over the window size.
    pub fn init<B: Backend>(&self, init: &mut ParamInit, device: &B::Device) -> PatchEmbed<B> {
        let patch_dim = self.patch_size * self.patch_size * self.in_channels;
        PatchEmbed {
            proj: dense(patch_dim, self.hidden_size, init, device),
            patch_size: self.patch_size,
            in_channels: self.in_channels,
        }
    }
}

impl<B: Backend> PatchEmbed<B> {
    /// Convert image to patch sequence
    ///
    /// # Arguments
    ///
    /// * `x` - Image tensor [batch, height, width, channels]
    ///
    /// # Returns
    ///
    /// Patch embeddings [batch, num_patches, hidden_size], patches in
    /// row-major grid order
    pub fn forward(&self, x: Tensor<B, 4>) -> Result<Tensor<B, 3>, ModelError> {
        let [batch, height, width, channels] = x.dims();
        if channels != self.in_channels {
            return Err(ModelError::shape(format!(
                "patch embedding expects {} channels, got {channels}",
                self.in_channels
            )));
        }

        let ps = self.patch_size;
        let ph = height / ps;
        let pw = width / ps;
        if ph == 0 || pw == 0 {
            return Err(ModelError::shape(format!(
                "image {height}x{width} is smaller than patch size {ps}"
            )));
        }

        // VALID padding: drop the remainder
        let x = if ph * ps != height || pw * ps != width {
            x.slice([0..batch, 0..ph * ps, 0..pw * ps, 0..channels])
        } else {
            x
        };

        // [B, H, W, C] -> [B, ph, ps, pw, ps, C]
        let x = x.reshape([batch, ph, ps, pw, ps, channels]);
        // -> [B, ph, pw, ps, ps, C]
        let x = x.swap_dims(2, 3);
        // Flatten windows: [B, ph*pw, ps*ps*C]
        let x = x.reshape([batch, ph * pw, ps * ps * channels]);

        Ok(self.proj.forward(x))
    }
}
