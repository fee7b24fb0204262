pub mod retrain;

pub use retrain::{start_retrain_job, RetrainJobConfig};
