use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Array3, ArrayView3};
use serde::Deserialize;
use tracing::info;

use super::{ModelError, Reconstructor};

/// Activation applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Linear,
    Tanh,
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    weights: Vec<Vec<f64>>, // [out][in]
    bias: Vec<f64>,         // [out]
    #[serde(default = "default_activation")]
    activation: Activation,
}

fn default_activation() -> Activation {
    Activation::Linear
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    input_features: usize,
    layers: Vec<LayerFile>,
}

#[derive(Debug, Clone)]
struct DenseLayer {
    weights: Array2<f64>, // [out, in]
    bias: Array1<f64>,
    activation: Activation,
}

/// Dense autoencoder applied independently to every timestep of a sequence.
///
/// Weights are exported by the training tooling as JSON:
///
/// ```json
/// { "input_features": 4,
///   "layers": [ { "weights": [[..], ..], "bias": [..], "activation": "relu" }, .. ] }
/// ```
#[derive(Debug, Clone)]
pub struct DenseAutoencoder {
    input_features: usize,
    layers: Vec<DenseLayer>,
}

impl DenseAutoencoder {
    /// Load weights from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            features = model.input_features,
            layers = model.layers.len(),
            "Loaded dense autoencoder"
        );
        Ok(model)
    }

    pub fn from_json(content: &str) -> Result<Self, ModelError> {
        let file: ModelFile = serde_json::from_str(content)?;
        Self::from_file(file)
    }

    fn from_file(file: ModelFile) -> Result<Self, ModelError> {
        if file.input_features == 0 {
            return Err(ModelError::Architecture("input_features must be positive".into()));
        }
        if file.layers.is_empty() {
            return Err(ModelError::Architecture("model has no layers".into()));
        }

        let mut width = file.input_features;
        let mut layers = Vec::with_capacity(file.layers.len());
        for (i, layer) in file.layers.into_iter().enumerate() {
            let out = layer.weights.len();
            if out == 0 {
                return Err(ModelError::Architecture(format!("layer {} has no units", i)));
            }
            if layer.bias.len() != out {
                return Err(ModelError::Architecture(format!(
                    "layer {} has {} units but {} biases",
                    i,
                    out,
                    layer.bias.len()
                )));
            }
            if let Some(row) = layer.weights.iter().find(|row| row.len() != width) {
                return Err(ModelError::Architecture(format!(
                    "layer {} expects {} inputs, found a weight row of length {}",
                    i,
                    width,
                    row.len()
                )));
            }

            let flat: Vec<f64> = layer.weights.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((out, width), flat)
                .map_err(|e| ModelError::Architecture(format!("layer {}: {}", i, e)))?;
            layers.push(DenseLayer {
                weights,
                bias: Array1::from(layer.bias),
                activation: layer.activation,
            });
            width = out;
        }

        if width != file.input_features {
            return Err(ModelError::Architecture(format!(
                "final layer emits {} features, autoencoder input has {}",
                width, file.input_features
            )));
        }

        Ok(Self {
            input_features: file.input_features,
            layers,
        })
    }

    /// An autoencoder that returns its input unchanged.
    pub fn identity(features: usize) -> Self {
        Self {
            input_features: features,
            layers: vec![DenseLayer {
                weights: Array2::eye(features),
                bias: Array1::zeros(features),
                activation: Activation::Linear,
            }],
        }
    }
}

impl Reconstructor for DenseAutoencoder {
    fn reconstruct(&self, batch: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        let (n, steps, features) = batch.dim();
        if features != self.input_features {
            return Err(ModelError::ShapeMismatch {
                expected: vec![n, steps, self.input_features],
                actual: vec![n, steps, features],
            });
        }

        // Every timestep goes through the same stack, so flatten to rows.
        let mut x = batch
            .to_owned()
            .into_shape_with_order((n * steps, features))
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        for layer in &self.layers {
            let mut out = x.dot(&layer.weights.t());
            out += &layer.bias;
            match layer.activation {
                Activation::Relu => out.mapv_inplace(|v| v.max(0.0)),
                Activation::Tanh => out.mapv_inplace(f64::tanh),
                Activation::Linear => {}
            }
            x = out;
        }

        x.into_shape_with_order((n, steps, features))
            .map_err(|e| ModelError::Inference(e.to_string()))
    }

    fn input_features(&self) -> Option<usize> {
        Some(self.input_features)
    }

    fn name(&self) -> &str {
        "dense-autoencoder"
    }
}
