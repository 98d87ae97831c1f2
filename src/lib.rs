pub mod bitbucket;
pub mod cli;
pub mod clock;
pub mod diff;
pub mod error;
pub mod model;
pub mod report;
