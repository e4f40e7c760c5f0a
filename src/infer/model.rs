//! Feed-forward model with an optional reduced-precision mirror for faster
//! inference.

use std::path::{Path, PathBuf};

use burn::module::{Ignored, Module, ModuleMapper, ModuleVisitor, ParamId};
use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::bf16;

use super::config::{Activation, ModelConfig};

/// File extension for serialized model parameters.
pub const MODEL_FILE_EXT: &str = "mpk";

/// Hidden layers in order, each (linear -> optional norm -> activation),
/// followed by an optional final projection.
#[derive(Module, Debug)]
pub struct MlpNet<B: Backend> {
    linears: Vec<Linear<B>>,
    norms: Vec<LayerNorm<B>>,
    output: Option<Linear<B>>,
    activation: Ignored<Activation>,
}

impl<B: Backend> MlpNet<B> {
    fn new(config: &ModelConfig, device: &B::Device) -> Self {
        let mut linears = Vec::with_capacity(config.layer_sizes.len());
        let mut norms = Vec::new();
        let mut last_size = config.num_inputs;

        for &size in &config.layer_sizes {
            linears.push(LinearConfig::new(last_size, size).init(device));
            if config.layer_norm {
                norms.push(LayerNormConfig::new(size).init(device));
            }
            last_size = size;
        }

        let output = config
            .output_layer
            .then(|| LinearConfig::new(last_size, config.num_outputs).init(device));

        Self {
            linears,
            norms,
            output,
            activation: Ignored(config.activation),
        }
    }

    fn forward(&self, mut x: Tensor<B, 2>) -> Tensor<B, 2> {
        for (i, linear) in self.linears.iter().enumerate() {
            x = linear.forward(x);
            if let Some(norm) = self.norms.get(i) {
                x = norm.forward(x);
            }
            x = self.activation.0.apply(x);
        }

        match &self.output {
            Some(output) => output.forward(x),
            None => x,
        }
    }

    /// Element count of every parameter, in module order.
    fn param_numels(&self) -> Vec<usize> {
        let mut visitor = ParamNumels::default();
        self.visit(&mut visitor);
        visitor.numels
    }
}

#[derive(Default)]
struct ParamNumels {
    numels: Vec<usize>,
}

impl<B: Backend> ModuleVisitor<B> for ParamNumels {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.numels.push(tensor.shape().num_elements());
    }
}

struct ReducePrecision;

impl<B: Backend> ModuleMapper<B> for ReducePrecision {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        reduce_precision(tensor)
    }
}

/// Round-trips through bf16 to shed mantissa bits while staying in the
/// backend's float type.
fn reduce_precision<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, D> {
    let device = tensor.device();
    let data = tensor.into_data().convert::<bf16>().convert::<f32>();
    Tensor::from_data(data, &device)
}

/// Cache for the reduced-precision copy of a network. Invalidated whenever the
/// primary parameters change.
#[derive(Debug)]
struct MirrorCache<B: Backend> {
    net: Option<MlpNet<B>>,
    stale: bool,
}

impl<B: Backend> Default for MirrorCache<B> {
    fn default() -> Self {
        Self {
            net: None,
            stale: true,
        }
    }
}

impl<B: Backend> MirrorCache<B> {
    fn refresh(&mut self, primary: &MlpNet<B>) -> &MlpNet<B> {
        if self.stale {
            self.net = Some(primary.clone().map(&mut ReducePrecision));
            self.stale = false;
        }
        self.net
            .get_or_insert_with(|| primary.clone().map(&mut ReducePrecision))
    }

    fn invalidate(&mut self) {
        self.stale = true;
    }
}

/// A named feed-forward model owning its parameters and device placement.
#[derive(Debug)]
pub struct Model<B: Backend> {
    name: String,
    pub config: ModelConfig,
    device: B::Device,
    net: MlpNet<B>,
    mirror: MirrorCache<B>,
}

impl<B: Backend> Model<B> {
    /// Builds the network described by `config`. An invalid config is a setup
    /// defect and panics.
    ///
    /// When the config has no output layer, its `num_outputs` is redefined to
    /// the last hidden width and is observable through [`Model::config`].
    pub fn new(name: &str, mut config: ModelConfig, device: B::Device) -> Self {
        if !config.is_valid() {
            panic!("cannot create model \"{name}\" with invalid config: {config:?}");
        }

        let net = MlpNet::new(&config, &device);

        if !config.output_layer {
            // Without a projection, the output width is the last hidden width.
            config.num_outputs = *config.layer_sizes.last().unwrap();
        }

        Self {
            name: name.to_string(),
            config,
            device,
            net,
            mirror: MirrorCache::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_params(&self) -> usize {
        self.net.num_params()
    }

    /// Forward pass over a batch. The reduced-precision path is refused while
    /// gradients are being tracked; mixed precision would corrupt training.
    pub fn forward(&mut self, input: Tensor<B, 2>, reduced_precision: bool) -> Tensor<B, 2> {
        let reduced_precision = reduced_precision && !B::ad_enabled();

        if !reduced_precision {
            return self.net.forward(input);
        }

        let mirror = self.mirror.refresh(&self.net);
        mirror.forward(reduce_precision(input))
    }

    /// Preferred on-disk location: upper-cased name inside `folder`.
    pub fn save_path(&self, folder: &Path) -> PathBuf {
        folder
            .join(self.name.to_uppercase())
            .with_extension(MODEL_FILE_EXT)
    }

    fn find_model_file(&self, folder: &Path) -> PathBuf {
        let upper = self.save_path(folder);
        if upper.exists() {
            return upper;
        }
        let lower = folder
            .join(self.name.to_lowercase())
            .with_extension(MODEL_FILE_EXT);
        if lower.exists() {
            return lower;
        }
        upper // default, for the error message
    }

    /// Loads parameters from `folder`. A missing file is fatal unless
    /// `allow_missing`; an unreadable blob or a parameter layout that does not
    /// match this architecture is always fatal.
    pub fn load(&mut self, folder: &Path, allow_missing: bool) {
        let path = self.find_model_file(folder);

        if !path.exists() {
            if allow_missing {
                tracing::warn!(
                    "model \"{}\" not found in {} (skipping)",
                    self.name,
                    folder.display()
                );
                return;
            }
            panic!(
                "model \"{}\" does not exist in {} (looked for {})",
                self.name,
                folder.display(),
                path.display()
            );
        }

        let numels_before = self.net.param_numels();

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.net = self
            .net
            .clone()
            .load_file(path.clone(), &recorder, &self.device)
            .unwrap_or_else(|err| {
                panic!(
                    "failed to load model \"{}\" from {}: {err}",
                    self.name,
                    path.display()
                )
            });

        let numels_after = self.net.param_numels();
        if numels_before != numels_after {
            panic!(
                "loaded model \"{}\" has different parameter sizes than expected \
                 (configured {numels_before:?}, checkpoint {numels_after:?}); \
                 the layer sizes / layer norm / activation / output layer \
                 settings do not match the checkpoint",
                self.name
            );
        }

        self.mirror.invalidate();
        tracing::info!(
            "loaded model \"{}\" from {} ({} params)",
            self.name,
            path.display(),
            self.num_params()
        );
    }

    /// Writes current parameters to the preferred path inside `folder`.
    pub fn save(&self, folder: &Path) {
        let path = self.save_path(folder);
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.net
            .clone()
            .save_file(path.clone(), &recorder)
            .unwrap_or_else(|err| {
                panic!(
                    "failed to save model \"{}\" to {}: {err}",
                    self.name,
                    path.display()
                )
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::config::PartialModelConfig;

    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    type B = NdArray;

    fn small_config(output_layer: bool) -> ModelConfig {
        let partial = PartialModelConfig {
            layer_sizes: vec![16, 8],
            output_layer,
            ..Default::default()
        };
        ModelConfig::from_partial(&partial, 4, if output_layer { 6 } else { 0 })
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nitrobot-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_output_width_redefined_without_projection() {
        let model = Model::<B>::new("trunk", small_config(false), NdArrayDevice::default());
        assert_eq!(model.config.num_outputs, 8);
    }

    #[test]
    fn test_output_width_kept_with_projection() {
        let model = Model::<B>::new("head", small_config(true), NdArrayDevice::default());
        assert_eq!(model.config.num_outputs, 6);
    }

    #[test]
    #[should_panic(expected = "invalid config")]
    fn test_empty_hidden_layers_is_fatal() {
        let partial = PartialModelConfig::default();
        let config = ModelConfig::from_partial(&partial, 4, 6);
        Model::<B>::new("bad", config, NdArrayDevice::default());
    }

    #[test]
    fn test_forward_shapes() {
        let mut model = Model::<B>::new("head", small_config(true), NdArrayDevice::default());
        let input = Tensor::<B, 2>::zeros([3, 4], &NdArrayDevice::default());
        let out = model.forward(input, false);
        assert_eq!(out.dims(), [3, 6]);
    }

    #[test]
    fn test_reduced_precision_is_close_to_full() {
        let device = NdArrayDevice::default();
        let mut model = Model::<B>::new("head", small_config(true), device);
        let input = Tensor::<B, 2>::random([2, 4], burn::tensor::Distribution::Uniform(-1.0, 1.0), &device);

        let full: Vec<f32> = model
            .forward(input.clone(), false)
            .into_data()
            .to_vec()
            .unwrap();
        let reduced: Vec<f32> = model.forward(input, true).into_data().to_vec().unwrap();

        for (f, r) in full.iter().zip(&reduced) {
            assert!((f - r).abs() < 0.05, "full {f} vs reduced {r}");
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let device = NdArrayDevice::default();
        let dir = temp_dir("roundtrip");
        let input = Tensor::<B, 2>::random([2, 4], burn::tensor::Distribution::Uniform(-1.0, 1.0), &device);

        let mut model = Model::<B>::new("head", small_config(true), device);
        let before: Vec<f32> = model
            .forward(input.clone(), false)
            .into_data()
            .to_vec()
            .unwrap();
        model.save(&dir);

        let mut reloaded = Model::<B>::new("head", small_config(true), device);
        reloaded.load(&dir, false);
        let after: Vec<f32> = reloaded.forward(input, false).into_data().to_vec().unwrap();

        for (b, a) in before.iter().zip(&after) {
            assert!((b - a).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_is_case_insensitive() {
        let device = NdArrayDevice::default();
        let dir = temp_dir("case");
        let model = Model::<B>::new("head", small_config(true), device);
        model.save(&dir);

        // Rename the blob to its lower-case variant
        let upper = model.save_path(&dir);
        let lower = dir.join("head").with_extension(MODEL_FILE_EXT);
        std::fs::rename(&upper, &lower).unwrap();

        let mut reloaded = Model::<B>::new("head", small_config(true), device);
        reloaded.load(&dir, false);
    }

    #[test]
    #[should_panic(expected = "different parameter sizes")]
    fn test_resized_hidden_layer_fails_to_load() {
        let device = NdArrayDevice::default();
        let dir = temp_dir("resized");

        let model = Model::<B>::new("head", small_config(true), device);
        model.save(&dir);

        let partial = PartialModelConfig {
            layer_sizes: vec![32, 8], // first hidden layer widened
            ..Default::default()
        };
        let config = ModelConfig::from_partial(&partial, 4, 6);
        let mut mismatched = Model::<B>::new("head", config, device);
        mismatched.load(&dir, false);
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_missing_file_is_fatal() {
        let dir = temp_dir("missing");
        let mut model = Model::<B>::new("absent", small_config(true), NdArrayDevice::default());
        model.load(&dir, false);
    }

    #[test]
    fn test_missing_file_skipped_when_allowed() {
        let dir = temp_dir("missing-ok");
        let mut model = Model::<B>::new("optional", small_config(true), NdArrayDevice::default());
        model.load(&dir, true);
    }
}
