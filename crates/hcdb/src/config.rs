//! Options controlling how databases are written to disk

/// Durability and metadata options for atomic writes and updates
///
/// # Example
///
/// ```
/// use hcdb::UpdateOptions;
///
/// // Skip fsync for throwaway databases (tests, scratch builds)
/// let options = UpdateOptions::default().with_sync(false);
/// assert!(!options.sync);
/// assert!(options.preserve_permissions);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Flush the new file to stable storage before it replaces the old one
    pub sync: bool,
    /// Give the new file the permission bits of the file it replaces
    pub preserve_permissions: bool,
}

impl UpdateOptions {
    /// Set whether the new file is synced before the rename
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Set whether permissions are copied from the replaced file
    pub fn with_preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            sync: true,
            preserve_permissions: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_durable() {
        let options = UpdateOptions::default();
        assert!(options.sync);
        assert!(options.preserve_permissions);
    }

    #[test]
    fn test_builders() {
        let options = UpdateOptions::default()
            .with_sync(false)
            .with_preserve_permissions(false);
        assert_eq!(
            options,
            UpdateOptions {
                sync: false,
                preserve_permissions: false,
            }
        );
    }
}
