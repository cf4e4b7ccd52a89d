use crate::traits::LedgerError;

/// Key/value platform settings.
#[allow(async_fn_in_trait)]
pub trait SettingsManagement {
    async fn fetch_setting(&self, key: &str) -> Result<Option<String>, LedgerError>;

    async fn store_setting(&self, key: &str, value: &str) -> Result<(), LedgerError>;
}
