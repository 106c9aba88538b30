pub mod agent;
pub mod completion;
pub mod context;
pub mod data_points;
pub mod errors;
pub mod memory;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod researcher;
pub mod token_counter;
pub mod tools;
pub mod web;
