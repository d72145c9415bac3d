pub mod digest;
pub mod output;
pub mod partition;
pub mod runner;
pub mod stats;

pub use digest::{document_group, image_group, reduce_digest, Representative};
pub use output::{project, to_json_line};
pub use partition::reduce_key;
pub use runner::{partition_of, JobRunner, JobSummary};
pub use stats::{DigestStats, PartitionStats};
