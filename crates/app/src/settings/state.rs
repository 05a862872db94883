use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chirp_channel::{
    ChannelConfig, ChannelResult, FIREBASE_CHANNEL_ID, LocalChannel, MessageChannel,
    create_channel,
};
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use gpui::*;
use gpui_component::{Theme, ThemeMode, ThemeRegistry};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ResultExt, Snafu};

use crate::profile::DEFAULT_AVATAR_STYLE;

pub const SETTINGS_DIRECTORY_NAME: &str = "chirp";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Environment variables that override connection parameters from the settings file.
pub const ENVIRONMENT_OVERRIDES: [(&str, &str); 8] = [
    ("channel_id", "CHIRP_CHANNEL"),
    ("api_key", "CHIRP_API_KEY"),
    ("auth_domain", "CHIRP_AUTH_DOMAIN"),
    ("database_url", "CHIRP_DATABASE_URL"),
    ("project_id", "CHIRP_PROJECT_ID"),
    ("storage_bucket", "CHIRP_STORAGE_BUCKET"),
    ("messaging_sender_id", "CHIRP_MESSAGING_SENDER_ID"),
    ("app_id", "CHIRP_APP_ID"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_channel_id")]
    pub channel_id: String,
    #[serde(flatten)]
    pub connection: ChannelConfig,
    #[serde(default = "default_avatar_style")]
    pub avatar_style: String,
    #[serde(
        default = "default_theme_mode",
        serialize_with = "serialize_theme_mode",
        deserialize_with = "deserialize_theme_mode"
    )]
    pub theme_mode: ThemeMode,
    #[serde(default)]
    pub theme_name: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            channel_id: default_channel_id(),
            connection: ChannelConfig::default(),
            avatar_style: default_avatar_style(),
            theme_mode: default_theme_mode(),
            theme_name: String::new(),
        }
    }
}

impl ClientSettings {
    pub fn normalized(mut self) -> Self {
        self.channel_id = if self.channel_id.trim().is_empty() {
            default_channel_id()
        } else {
            self.channel_id.trim().to_ascii_lowercase()
        };
        self.connection = self.connection.normalized();
        self.avatar_style = if self.avatar_style.trim().is_empty() {
            default_avatar_style()
        } else {
            self.avatar_style.trim().to_string()
        };
        self.theme_name = self.theme_name.trim().to_string();
        self
    }

    /// Builds the configured channel client.
    pub fn create_channel(&self) -> ChannelResult<Arc<dyn MessageChannel>> {
        create_channel(&self.channel_id, self.connection.clone())
    }

    /// Builds the configured channel, falling back to a local loopback channel
    /// when the backend cannot be constructed.
    pub fn create_channel_or_local(&self) -> Arc<dyn MessageChannel> {
        match self.create_channel() {
            Ok(channel) => {
                tracing::info!(channel_id = %channel.id(), "initialized message channel");
                channel
            }
            Err(error) => {
                tracing::error!(
                    channel_id = %self.channel_id,
                    error = %error,
                    "failed to initialize message channel, messages stay on this device"
                );
                Arc::new(LocalChannel::new())
            }
        }
    }

    pub fn apply_theme(&self, window: Option<&mut Window>, cx: &mut App) {
        if let Some(theme_config) = ThemeRegistry::global(cx)
            .themes()
            .get(&SharedString::from(self.theme_name.clone()))
            .cloned()
        {
            let mode = theme_config.mode;
            let theme = Theme::global_mut(cx);
            if mode.is_dark() {
                theme.dark_theme = theme_config;
            } else {
                theme.light_theme = theme_config;
            }
            Theme::change(mode, window, cx);
            return;
        }

        Theme::change(self.theme_mode, window, cx);
    }
}

/// Settings snapshot shared between clones; `reload` swaps in a fresh one.
#[derive(Clone)]
pub struct SettingsStore {
    settings: Arc<ArcSwap<ClientSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".chirp"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_sources(&config_path, |name| std::env::var(name).ok());
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn settings(&self) -> Arc<ClientSettings> {
        self.settings.load_full()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Re-reads the settings file and environment and publishes the result.
    pub fn reload(&self) -> Arc<ClientSettings> {
        self.reload_from_sources(|name| std::env::var(name).ok())
    }

    fn reload_from_sources(&self, env: impl Fn(&str) -> Option<String>) -> Arc<ClientSettings> {
        let settings = Arc::new(Self::load_from_sources(&self.config_path, env));
        self.settings.store(settings.clone());
        settings
    }

    /// Writes the current settings to disk when no settings file exists yet,
    /// so connection parameters can be filled in by hand.
    pub fn ensure_template(&self) -> Result<bool, SettingsError> {
        if self.config_path.exists() {
            return Ok(false);
        }

        self.persist(&self.settings())?;
        Ok(true)
    }

    fn load_from_sources(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> ClientSettings {
        let mut figment = Figment::from(Serialized::defaults(ClientSettings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        // Values are merged as strings so numeric-looking ids stay intact.
        for (key, variable) in ENVIRONMENT_OVERRIDES {
            if let Some(value) = env(variable).filter(|value| !value.trim().is_empty()) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        match figment.extract::<ClientSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                ClientSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ClientSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_channel_id() -> String {
    FIREBASE_CHANNEL_ID.to_string()
}

fn default_avatar_style() -> String {
    DEFAULT_AVATAR_STYLE.to_string()
}

fn default_theme_mode() -> ThemeMode {
    ThemeMode::Light
}

fn serialize_theme_mode<S>(value: &ThemeMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.name())
}

fn deserialize_theme_mode<'de, D>(deserializer: D) -> Result<ThemeMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_theme_mode(&value))
}

fn parse_theme_mode(value: &str) -> ThemeMode {
    if value.trim().eq_ignore_ascii_case("dark") {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}
