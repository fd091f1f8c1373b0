//! Vision transformer classifier
//!
//! # Architecture
//!
//! ```text
//! image -> patch embedding -> [class token] + positional embedding -> dropout
//!       -> N x TransformerBlock -> LayerNorm -> token | mean pooling -> Linear
//! ```
//!
//! # Presets
//!
//! - MNIST digits (28x28x1, 10 classes)
//! - Electron/photon calorimeter images (32x32x2, 2 classes)
//! - Quark/gluon jet images (125x125x3, 2 classes)

use burn::module::Param;
use burn::nn::Linear;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use burn_qtransformers_core::dropout::{Dropout, ForwardMode};
use burn_qtransformers_core::init::ParamInit;
use burn_qtransformers_core::layernorm::LayerNorm;
use burn_qtransformers_core::patch::{patches_per_side, PatchEmbed, PatchEmbedConfig};
use burn_qtransformers_core::projection::dense;
use burn_qtransformers_core::quantum::QuantumCircuits;
use burn_qtransformers_core::transformer::{forward_blocks, TransformerBlock};
use burn_qtransformers_core::ModelError;

use crate::config::TransformerConfig;

/// How the final sequence is reduced to one vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierPooling {
    /// Prepend a learned class token and read it back at position 0
    Token,
    /// Global average over all positions
    #[default]
    Gap,
}

fn default_channels_last() -> bool {
    true
}

fn default_pos_embedding_std() -> f64 {
    0.02
}

/// Image Classifier Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageClassifierConfig {
    /// Block settings
    #[serde(flatten)]
    pub transformer: TransformerConfig,
    /// Number of output classes
    pub num_classes: usize,
    /// Patch side (kernel size and stride)
    pub patch_size: usize,
    /// Image side; images are square
    pub image_size: usize,
    /// Number of input channels
    pub num_channels: usize,
    /// Pooling variant
    #[serde(default)]
    pub classifier: ClassifierPooling,
    /// Whether inputs are [batch, height, width, channels]
    #[serde(default = "default_channels_last")]
    pub channels_last: bool,
    /// Standard deviation of the positional embedding init
    #[serde(default = "default_pos_embedding_std")]
    pub pos_embedding_std: f64,
}

impl ImageClassifierConfig {
    pub fn new(
        transformer: TransformerConfig,
        num_classes: usize,
        patch_size: usize,
        image_size: usize,
        num_channels: usize,
    ) -> Self {
        Self {
            transformer,
            num_classes,
            patch_size,
            image_size,
            num_channels,
            classifier: ClassifierPooling::Gap,
            channels_last: true,
            pos_embedding_std: default_pos_embedding_std(),
        }
    }

    pub fn with_classifier(mut self, classifier: ClassifierPooling) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_channels_last(mut self, channels_last: bool) -> Self {
        self.channels_last = channels_last;
        self
    }

    /// MNIST digits configuration
    pub fn mnist() -> Self {
        Self::new(TransformerConfig::new(8, 2, 4, 8).with_dropout(0.1), 10, 7, 28, 1)
    }

    /// Electron/photon configuration
    pub fn electron_photon() -> Self {
        Self::new(TransformerConfig::new(8, 2, 4, 8).with_dropout(0.1), 2, 8, 32, 2)
    }

    /// Quark/gluon configuration
    pub fn quark_gluon() -> Self {
        Self::new(TransformerConfig::new(8, 2, 4, 8).with_dropout(0.1), 2, 25, 125, 3)
    }

    /// Creates a tiny model for testing
    pub fn tiny() -> Self {
        Self::new(TransformerConfig::new(8, 2, 2, 16), 4, 4, 12, 2)
    }

    /// `(image_size / patch_size)^2`, remainder dropped
    pub fn num_patches(&self) -> usize {
        patches_per_side(self.image_size, self.patch_size).pow(2)
    }

    /// Sequence length seen by the blocks
    pub fn num_positions(&self) -> usize {
        match self.classifier {
            ClassifierPooling::Token => self.num_patches() + 1,
            ClassifierPooling::Gap => self.num_patches(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.transformer.validate()?;
        if self.patch_size == 0 || self.patch_size > self.image_size {
            return Err(ModelError::Config(format!(
                "patch size {} must be in 1..={}",
                self.patch_size, self.image_size
            )));
        }
        if self.num_channels == 0 {
            return Err(ModelError::Config("num_channels must be positive".into()));
        }
        if self.num_classes == 0 {
            return Err(ModelError::Config("num_classes must be positive".into()));
        }
        if self.pos_embedding_std < 0.0 {
            return Err(ModelError::Config(
                "pos_embedding_std must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Initialize the model from `seed`
    ///
    /// The same `(config, circuits, seed)` always yields identical parameters.
    pub fn init<B: Backend>(
        &self,
        circuits: &QuantumCircuits<B>,
        seed: u64,
        device: &B::Device,
    ) -> Result<ImageClassifier<B>, ModelError> {
        self.validate()?;
        let hidden = self.transformer.hidden_size;
        let mut init = ParamInit::new(seed);

        let patch_embed =
            PatchEmbedConfig::new(self.patch_size, self.num_channels, hidden).init(&mut init, device);
        let cls_token = match self.classifier {
            ClassifierPooling::Token => Some(Param::from_tensor(Tensor::zeros([1, 1, hidden], device))),
            ClassifierPooling::Gap => None,
        };
        let pos_embedding = Param::from_tensor(init.normal(
            [1, self.num_positions(), hidden],
            self.pos_embedding_std,
            device,
        ));
        let blocks = self.transformer.block().init_stack(
            self.transformer.num_transformer_blocks,
            circuits,
            &mut init,
            device,
        )?;
        let norm = LayerNorm::new(hidden, device);
        let head = dense(hidden, self.num_classes, &mut init, device);

        let model = ImageClassifier {
            patch_embed,
            cls_token,
            pos_embedding,
            dropout: Dropout::new(self.transformer.dropout_rate),
            blocks,
            norm,
            head,
            channels_last: self.channels_last,
        };

        tracing::debug!(
            num_params = model.num_params(),
            num_patches = self.num_patches(),
            num_positions = self.num_positions(),
            classifier = ?self.classifier,
            quantum_attention = circuits.attention.is_some(),
            quantum_mlp = circuits.mlp.is_some(),
            "initialized image classifier"
        );

        Ok(model)
    }
}

/// Vision transformer classifier
#[derive(Module, Debug)]
pub struct ImageClassifier<B: Backend> {
    pub patch_embed: PatchEmbed<B>,
    /// Present only with [`ClassifierPooling::Token`]
    pub cls_token: Option<Param<Tensor<B, 3>>>,
    /// [1, num_positions, hidden_size]
    pub pos_embedding: Param<Tensor<B, 3>>,
    pub dropout: Dropout,
    pub blocks: Vec<TransformerBlock<B>>,
    pub norm: LayerNorm<B>,
    pub head: Linear<B>,
    pub channels_last: bool,
}

impl<B: Backend> ImageClassifier<B> {
    pub fn pooling(&self) -> ClassifierPooling {
        match self.cls_token {
            Some(_) => ClassifierPooling::Token,
            None => ClassifierPooling::Gap,
        }
    }

    pub fn num_positions(&self) -> usize {
        self.pos_embedding.dims()[1]
    }

    pub fn num_patches(&self) -> usize {
        match self.cls_token {
            Some(_) => self.num_positions() - 1,
            None => self.num_positions(),
        }
    }

    /// Activations after the final layer norm
    ///
    /// # Arguments
    ///
    /// * `images` - [batch, height, width, channels], or
    ///   [batch, channels, height, width] when the model is not channels-last
    /// * `mode` - Deterministic, or training with a dropout stream
    ///
    /// # Returns
    ///
    /// [batch, num_positions, hidden_size]
    pub fn forward_features(
        &self,
        images: Tensor<B, 4>,
        mode: &mut ForwardMode<'_>,
    ) -> Result<Tensor<B, 3>, ModelError> {
        let images = if self.channels_last {
            images
        } else {
            images.permute([0, 2, 3, 1])
        };

        let [batch, height, width, _channels] = images.dims();
        if batch == 0 {
            return Err(ModelError::Shape("empty batch".into()));
        }
        if height != width {
            return Err(ModelError::Shape(format!(
                "input must be square, got {height}x{width}"
            )));
        }
        let per_side = patches_per_side(height, self.patch_embed.patch_size);
        if per_side * per_side != self.num_patches() {
            return Err(ModelError::Shape(format!(
                "{height}x{width} image gives {} patches, model expects {}",
                per_side * per_side,
                self.num_patches()
            )));
        }

        let x = self.patch_embed.forward(images)?;
        let x = match &self.cls_token {
            Some(cls) => Tensor::cat(vec![cls.val().repeat_dim(0, batch), x], 1),
            None => x,
        };
        let x = self.dropout.forward(x + self.pos_embedding.val(), mode);

        tracing::trace!(batch, positions = self.num_positions(), "image classifier forward");

        let x = forward_blocks(&self.blocks, x, mode)?;
        Ok(self.norm.forward(x))
    }

    /// Reduce positions to one vector per example
    ///
    /// Token pooling reads position 0, average pooling takes the mean.
    pub fn pool(&self, features: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, _positions, hidden] = features.dims();
        match self.pooling() {
            ClassifierPooling::Token => features
                .slice([0..batch, 0..1, 0..hidden])
                .reshape([batch, hidden]),
            ClassifierPooling::Gap => features.mean_dim(1).squeeze(1),
        }
    }

    /// Classification logits [batch, num_classes]
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
        mode: &mut ForwardMode<'_>,
    ) -> Result<Tensor<B, 2>, ModelError> {
        let features = self.forward_features(images, mode)?;
        Ok(self.head.forward(self.pool(features)))
    }

    /// Logits from a raw buffer of any rank
    ///
    /// Fails with [`ModelError::Shape`] unless the data is 4-dimensional.
    pub fn forward_data(
        &self,
        data: TensorData,
        mode: &mut ForwardMode<'_>,
    ) -> Result<Tensor<B, 2>, ModelError> {
        if data.shape.len() != 4 {
            return Err(ModelError::Shape(format!(
                "input must be a 4D tensor, got rank {}",
                data.shape.len()
            )));
        }
        let images = Tensor::<B, 4>::from_data(data, &self.pos_embedding.device());
        self.forward(images, mode)
    }

    /// Evaluation-mode logits
    pub fn infer(&self, images: Tensor<B, 4>) -> Result<Tensor<B, 2>, ModelError> {
        self.forward(images, &mut ForwardMode::Deterministic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn images(shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        ParamInit::new(5).normal(shape, 1.0, &Default::default())
    }

    #[test]
    fn test_image_classifier_shape() {
        let device = Default::default();
        let model = ImageClassifierConfig::tiny()
            .init::<TestBackend>(&QuantumCircuits::classical(), 0, &device)
            .unwrap();

        let logits = model.infer(images([3, 12, 12, 2])).unwrap();
        assert_eq!(logits.dims(), [3, 4]);
    }

    #[test]
    fn test_patch_grid_with_class_token() {
        let config = ImageClassifierConfig::mnist().with_classifier(ClassifierPooling::Token);
        assert_eq!(config.num_patches(), 16);
        assert_eq!(config.num_positions(), 17);

        let device = Default::default();
        let model = config
            .init::<TestBackend>(&QuantumCircuits::classical(), 0, &device)
            .unwrap();
        assert_eq!(model.pos_embedding.dims(), [1, 17, 8]);
        assert_eq!(model.num_patches(), 16);

        let features = model
            .forward_features(images([2, 28, 28, 1]), &mut ForwardMode::Deterministic)
            .unwrap();
        assert_eq!(features.dims(), [2, 17, 8]);
    }

    #[test]
    fn test_class_token_starts_at_zero() {
        let device = Default::default();
        let model = ImageClassifierConfig::tiny()
            .with_classifier(ClassifierPooling::Token)
            .init::<TestBackend>(&QuantumCircuits::classical(), 0, &device)
            .unwrap();

        let cls: Vec<f32> = model.cls_token.unwrap().val().into_data().to_vec().unwrap();
        assert_eq!(cls, vec![0.0; 8]);
    }

    #[test]
    fn test_non_divisible_image_drops_remainder() {
        // floor(14 / 4) = 3 patches per side, same grid as the 12x12 config
        let device = Default::default();
        let model = ImageClassifierConfig::tiny()
            .init::<TestBackend>(&QuantumCircuits::classical(), 0, &device)
            .unwrap();

        let logits = model.infer(images([1, 14, 14, 2])).unwrap();
        assert_eq!(logits.dims(), [1, 4]);
    }

    #[test]
    fn test_non_square_rejected() {
        let device = Default::default();
        let model = ImageClassifierConfig::tiny()
            .init::<TestBackend>(&QuantumCircuits::classical(), 0, &device)
            .unwrap();

        let err = model.infer(images([1, 12, 16, 2])).unwrap_err();
        assert!(matches!(err, ModelError::Shape(_)));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let device = Default::default();
        let model = ImageClassifierConfig::tiny()
            .init::<TestBackend>(&QuantumCircuits::classical(), 0, &device)
            .unwrap();

        let err = model
            .infer(Tensor::zeros([0, 12, 12, 2], &device))
            .unwrap_err();
        assert!(matches!(err, ModelError::Shape(_)));
    }

    #[test]
    fn test_wrong_grid_rejected() {
        let device = Default::default();
        let model = ImageClassifierConfig::tiny()
            .init::<TestBackend>(&QuantumCircuits::classical(), 0, &device)
            .unwrap();

        let err = model.infer(images([1, 16, 16, 2])).unwrap_err();
        assert!(matches!(err, ModelError::Shape(_)));
    }

    #[test]
    fn test_channels_first_input() {
        let device = Default::default();
        let model = ImageClassifierConfig::tiny()
            .with_channels_last(false)
            .init::<TestBackend>(&QuantumCircuits::classical(), 0, &device)
            .unwrap();

        let logits = model.infer(images([2, 2, 12, 12])).unwrap();
        assert_eq!(logits.dims(), [2, 4]);
    }

    #[test]
    fn test_channels_first_matches_channels_last() {
        let device = Default::default();
        let last = ImageClassifierConfig::tiny()
            .init::<TestBackend>(&QuantumCircuits::classical(), 3, &device)
            .unwrap();
        let first = ImageClassifierConfig::tiny()
            .with_channels_last(false)
            .init::<TestBackend>(&QuantumCircuits::classical(), 3, &device)
            .unwrap();

        let x = images([2, 12, 12, 2]);
        let a: Vec<f32> = last.infer(x.clone()).unwrap().into_data().to_vec().unwrap();
        let b: Vec<f32> = first
            .infer(x.permute([0, 3, 1, 2]))
            .unwrap()
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_forward_data_rank_check() {
        let device = Default::default();
        let model = ImageClassifierConfig::tiny()
            .init::<TestBackend>(&QuantumCircuits::classical(), 0, &device)
            .unwrap();

        let data = TensorData::new(vec![0.0f32; 12 * 12 * 2], [12, 12, 2]);
        let err = model.forward_data(data, &mut ForwardMode::Deterministic).unwrap_err();
        assert!(matches!(err, ModelError::Shape(_)));

        let data = TensorData::new(vec![0.0f32; 12 * 12 * 2], [1, 12, 12, 2]);
        let logits = model.forward_data(data, &mut ForwardMode::Deterministic).unwrap();
        assert_eq!(logits.dims(), [1, 4]);
    }

    #[test]
    fn test_presets_are_valid() {
        for config in [
            ImageClassifierConfig::mnist(),
            ImageClassifierConfig::electron_photon(),
            ImageClassifierConfig::quark_gluon(),
        ] {
            assert!(config.validate().is_ok());
        }
        assert_eq!(ImageClassifierConfig::electron_photon().num_patches(), 16);
        assert_eq!(ImageClassifierConfig::quark_gluon().num_patches(), 25);
    }

    #[test]
    fn test_patch_larger_than_image_rejected() {
        let mut config = ImageClassifierConfig::tiny();
        config.patch_size = 13;
        assert!(matches!(config.validate(), Err(ModelError::Config(_))));
    }
}
