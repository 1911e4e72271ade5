use crate::phone::PhoneNumber;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub communities: Vec<Community>,
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub lookup: LookupSettings,
}

/// A governed group: membership is decided by the ordered roster sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub name: String,
    /// Ordered: the first source containing a match is authoritative.
    #[serde(default)]
    pub sources: Vec<RosterSource>,
    /// Registration form offered to rejected join requests.
    pub form_link: Option<String>,
    /// Marks the group where `verify/<number>` commands are served.
    #[serde(default)]
    pub verification: bool,
    #[serde(default)]
    pub policy: ContentPolicy,
}

/// One searchable external table, optionally narrowed to a named partition
/// (sub-sheet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSource {
    pub sheet_id: String,
    pub partition: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPolicy {
    /// Only `verify/...` and the bot admin commands are tolerated; anything
    /// else is deleted and the sender warned.
    #[serde(default)]
    pub verify_only: bool,
    #[serde(default)]
    pub block_stickers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Principals (phone numbers) entitled to `@all`.
    pub admins: Vec<String>,
    /// Groups where `@all` is honored at all.
    #[serde(default)]
    pub allowed_groups: Vec<String>,
    /// Numbers never mentioned by a broadcast.
    #[serde(default)]
    pub excluded: Vec<String>,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_max_uses")]
    pub max_uses: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub columns: ColumnMap,
}

/// Which cell of a roster row holds which field. The mapping differs per
/// deployment and per source layout, so it is configuration, never a
/// hard-coded constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMap {
    pub phone: usize,
    pub name: usize,
    pub email: usize,
    pub gender: usize,
    pub region: usize,
}

impl Default for ColumnMap {
    // Columns D/B/C/E/G of the reference deployment's sheet.
    fn default() -> Self {
        ColumnMap {
            phone: 3,
            name: 1,
            email: 2,
            gender: 4,
            region: 6,
        }
    }
}

impl Default for LookupSettings {
    fn default() -> Self {
        LookupSettings {
            max_retries: default_max_retries(),
            columns: ColumnMap::default(),
        }
    }
}

fn default_window_seconds() -> u64 {
    24 * 60 * 60
}

fn default_max_uses() -> usize {
    3
}

fn default_max_retries() -> u32 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Config {
            communities: vec![Community {
                id: "120363421079207775@g.us".to_string(),
                name: "Verification".to_string(),
                sources: vec![RosterSource {
                    sheet_id: "YOUR_SHEET_ID".to_string(),
                    partition: Some("Verified".to_string()),
                }],
                form_link: Some("https://forms.google.com/your-form-link".to_string()),
                verification: true,
                policy: ContentPolicy {
                    verify_only: true,
                    block_stickers: false,
                },
            }],
            broadcast: BroadcastConfig {
                admins: vec!["+919876543210".to_string()],
                allowed_groups: vec!["120363421079207775@g.us".to_string()],
                excluded: vec![],
                window_seconds: default_window_seconds(),
                max_uses: default_max_uses(),
            },
            lookup: LookupSettings::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {path}"))?;
        Ok(())
    }

    /// Fail at load time rather than lazily on first access.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for community in &self.communities {
            if community.id.is_empty() {
                bail!("Community '{}' has an empty id", community.name);
            }
            if !seen.insert(&community.id) {
                bail!("Duplicate community id: {}", community.id);
            }
            for source in &community.sources {
                if source.sheet_id.is_empty() {
                    bail!(
                        "Community '{}' has a roster source with an empty sheet id",
                        community.name
                    );
                }
            }
        }
        if self.communities.iter().filter(|c| c.verification).count() > 1 {
            bail!("At most one community may be marked as the verification group");
        }
        for admin in &self.broadcast.admins {
            if PhoneNumber::normalize(admin).is_empty() {
                bail!("Broadcast admin entry contains no digits: {admin}");
            }
        }
        if self.broadcast.max_uses == 0 {
            bail!("broadcast.max_uses must be at least 1");
        }
        if self.broadcast.window_seconds == 0 {
            bail!("broadcast.window_seconds must be at least 1");
        }
        Ok(())
    }

    pub fn community_by_chat(&self, chat: &str) -> Option<&Community> {
        self.communities.iter().find(|c| c.id == chat)
    }

    pub fn verification_community(&self) -> Option<&Community> {
        self.communities.iter().find(|c| c.verification)
    }
}
