//! Architecture configuration for inference models.

use burn::prelude::*;
use burn::tensor::activation;

/// Activation applied after each hidden layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Relu,
    LeakyRelu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub fn apply<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Relu => activation::relu(input),
            Activation::LeakyRelu => activation::leaky_relu(input, 0.01),
            Activation::Sigmoid => activation::sigmoid(input),
            Activation::Tanh => activation::tanh(input),
        }
    }
}

/// Architecture of one model without its input/output widths, which are
/// derived from the observation and action spaces at construction time.
#[derive(Debug, Clone)]
pub struct PartialModelConfig {
    /// Hidden layer widths, in order.
    pub layer_sizes: Vec<usize>,
    pub activation: Activation,
    /// Normalize after each hidden linear layer.
    pub layer_norm: bool,
    /// Append a final linear projection to an explicit output width.
    pub output_layer: bool,
}

impl Default for PartialModelConfig {
    fn default() -> Self {
        Self {
            layer_sizes: Vec::new(),
            activation: Activation::Relu,
            layer_norm: true,
            output_layer: true,
        }
    }
}

impl PartialModelConfig {
    pub fn is_valid(&self) -> bool {
        !self.layer_sizes.is_empty()
    }
}

/// Complete architecture for one model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub layer_sizes: Vec<usize>,
    pub activation: Activation,
    pub layer_norm: bool,
    pub output_layer: bool,
    pub num_inputs: usize,
    pub num_outputs: usize,
}

impl ModelConfig {
    pub fn from_partial(partial: &PartialModelConfig, num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            layer_sizes: partial.layer_sizes.clone(),
            activation: partial.activation,
            layer_norm: partial.layer_norm,
            output_layer: partial.output_layer,
            num_inputs,
            num_outputs,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.layer_sizes.is_empty()
            && self.num_inputs > 0
            && (self.num_outputs > 0 || !self.output_layer)
    }
}
