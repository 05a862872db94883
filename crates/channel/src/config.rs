use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::error::{ChannelResult, MissingParameterSnafu};

/// Path under the database root where chat records live.
pub const MESSAGES_PATH: &str = "messages";

/// Connection parameters for the realtime database project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: String,
    #[serde(default)]
    pub database_url: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub messaging_sender_id: String,
    #[serde(default)]
    pub app_id: String,
}

impl ChannelConfig {
    pub fn normalized(mut self) -> Self {
        for value in self.parameters_mut() {
            *value = value.trim().to_string();
        }
        self.database_url = self.database_url.trim_end_matches('/').to_string();
        self
    }

    /// Checks that every connection parameter is present.
    pub fn validate(&self) -> ChannelResult<()> {
        for (name, value) in self.parameters() {
            ensure!(
                !value.trim().is_empty(),
                MissingParameterSnafu {
                    stage: "validate-channel-config",
                    parameter: name,
                }
            );
        }

        Ok(())
    }

    /// URL of the messages collection in the REST API.
    pub fn messages_url(&self) -> String {
        format!(
            "{}/{MESSAGES_PATH}.json",
            self.database_url.trim_end_matches('/')
        )
    }

    fn parameters(&self) -> [(&'static str, &str); 7] {
        [
            ("api_key", self.api_key.as_str()),
            ("auth_domain", self.auth_domain.as_str()),
            ("database_url", self.database_url.as_str()),
            ("project_id", self.project_id.as_str()),
            ("storage_bucket", self.storage_bucket.as_str()),
            ("messaging_sender_id", self.messaging_sender_id.as_str()),
            ("app_id", self.app_id.as_str()),
        ]
    }

    fn parameters_mut(&mut self) -> [&mut String; 7] {
        [
            &mut self.api_key,
            &mut self.auth_domain,
            &mut self.database_url,
            &mut self.project_id,
            &mut self.storage_bucket,
            &mut self.messaging_sender_id,
            &mut self.app_id,
        ]
    }
}
