//! Policy inference: model architecture configs, feed-forward stacks with an
//! optional reduced-precision mirror, the name-keyed model registry, and the
//! masked softmax action-selection pipeline.
//!
//! ```text
//! observations ──► shared_head (optional) ──► policy ──► logits
//!                                                          │ /temperature
//!                                                          ▼
//!                          legality mask ──► disabled-logit bias ──► softmax
//!                                                          │ floor at 1e-11
//!                                                          ▼
//!                                    argmax │ multinomial sample + log-prob
//! ```

pub mod config;
pub mod model;
pub mod model_set;
pub mod pipeline;
pub mod unit;

pub use config::{Activation, ModelConfig, PartialModelConfig};
pub use model::{MODEL_FILE_EXT, Model};
pub use model_set::ModelSet;
pub use pipeline::{
    ACTION_DISABLED_LOGIT, ACTION_MIN_PROB, POLICY, SHARED_HEAD, infer_actions,
    make_inference_models,
};
pub use unit::InferUnit;
