pub mod analysis;
pub mod capture_control;
pub mod configuration;
pub mod error_handling;
pub mod pipeline;
pub mod subprocess;

#[cfg(test)]
pub mod test_support;
