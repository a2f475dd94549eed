use serde::{Deserialize, Serialize};

/// Key of the process-wide switch that blocks regular sending.
pub const CHAT_ACCESS_DISABLED: &str = "chat_access_disabled";

/// A row of the `settings` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettingRow {
    pub key: String,
    pub value: bool,
}
