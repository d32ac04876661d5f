//! Configuration access port.

use crate::domain::error::CloseCacheError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;

    /// Like [`ConfigPort::get_string`], but a missing key is an error.
    fn require_string(&self, section: &str, key: &str) -> Result<String, CloseCacheError> {
        self.get_string(section, key)
            .ok_or_else(|| CloseCacheError::ConfigMissing {
                section: section.into(),
                key: key.into(),
            })
    }
}
