//! Training domain: pipeline construction, fitting and artefact persistence.

pub mod booster;
pub mod classifier;
pub mod domain;
pub mod pipeline;
pub mod repo_fs;
pub mod service;

pub use booster::{BoostedClassifier, BoosterParams, TreeMethod};
pub use classifier::{Classifier, Engine, XgbClassifier};
pub use domain::{
    ModelArtifact, ModelManifest, ModelParams, ModelRepo, ParamValue, TrainReport, TrainRequest,
};
pub use pipeline::{build_pipeline, build_pipeline_with, Pipeline, Preprocessor};
pub use repo_fs::{read_artifact, FsModelRepo};
pub use service::{train, train_with_repo};
