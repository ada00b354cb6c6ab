//! Configuration access port trait.

/// Sectioned key/value configuration.
///
/// Blank values read as absent. A present value that does not parse as the
/// requested type is an `Err` carrying the offending text.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_float(&self, section: &str, key: &str) -> Result<Option<f64>, String>;
    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, String>;
}
