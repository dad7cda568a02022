pub mod classifier;
pub mod entities;
pub mod error;
pub mod intents;
pub mod model;
pub mod rule;

pub use classifier::Classifier;
pub use entities::{Entity, EntityKind};
pub use error::NluError;
pub use intents::{Classification, Intent, Method};
pub use model::ModelClassifier;
