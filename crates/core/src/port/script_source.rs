// Script Source Port
// Resolves upgrade script names to SQL text

use crate::error::Result;

pub trait ScriptSource: Send + Sync {
    /// Load the SQL text for `name` (e.g. `schema-410to420.sql`)
    ///
    /// # Errors
    /// - AppError::NotFound if no script with that name exists
    fn load(&self, name: &str) -> Result<String>;
}
