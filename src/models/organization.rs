//! Organization entity model
//!
//! Organizations are the tenant boundary. Screenshot policy lives in the
//! `settings` JSON column and is read through [`OrganizationSettings`].

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "organizations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    /// Organization policy as JSON (see [`OrganizationSettings`])
    #[sea_orm(column_type = "JsonBinary")]
    pub settings: Option<JsonValue>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    Users,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parsed settings; missing or malformed JSON falls back to defaults.
    pub fn settings(&self) -> OrganizationSettings {
        self.settings
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

/// How screenshots of an organization are blurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BlurMode {
    Always,
    #[default]
    Optional,
    Never,
}

impl BlurMode {
    /// Whether a new screenshot from a user with the given permission is blurred.
    pub fn should_blur(self, user_can_blur: bool) -> bool {
        match self {
            BlurMode::Always => true,
            BlurMode::Optional => user_can_blur,
            BlurMode::Never => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizationSettings {
    pub blur_mode: BlurMode,
    /// Seconds between captures
    pub screenshot_interval: u32,
    /// Days to keep screenshots
    pub screenshot_retention: u32,
    pub allow_screenshot_delete: bool,
    /// Minutes after capture during which the owner may delete a screenshot
    pub delete_grace_period: i64,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        Self {
            blur_mode: BlurMode::Optional,
            screenshot_interval: 600,
            screenshot_retention: 30,
            allow_screenshot_delete: true,
            delete_grace_period: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blur_mode_policy() {
        assert!(BlurMode::Always.should_blur(false));
        assert!(BlurMode::Always.should_blur(true));
        assert!(BlurMode::Optional.should_blur(true));
        assert!(!BlurMode::Optional.should_blur(false));
        assert!(!BlurMode::Never.should_blur(true));
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let settings: OrganizationSettings =
            serde_json::from_value(json!({"blurMode": "always", "deleteGracePeriod": 10}))
                .unwrap();
        assert_eq!(settings.blur_mode, BlurMode::Always);
        assert_eq!(settings.delete_grace_period, 10);
        assert_eq!(settings.screenshot_interval, 600);
        assert!(settings.allow_screenshot_delete);
    }
}
