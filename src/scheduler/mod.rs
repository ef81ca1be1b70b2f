pub mod jobs;

pub use jobs::{JobScheduler, JobSummary};
