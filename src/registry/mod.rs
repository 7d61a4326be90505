pub mod analysis;
pub mod audit;
pub mod config;
pub mod context;
pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod manifest;
pub mod model;
pub mod paths;
pub mod prompt;
pub mod results;
pub mod structured;
pub mod sync;
pub mod util;
