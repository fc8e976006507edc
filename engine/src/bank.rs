//! Bot bank
//!
//! A library of reusable bot templates. Templates are participant
//! configurations without slot identity or activity state; instantiating one
//! binds it to a debate slot. The bank travels inside backups, and restored
//! bots keep their template link only when the uid still resolves here.

use serde::{Deserialize, Serialize};

use crate::chat::{Bot, BotModelConfig};

/// Default sampling temperature for blank templates
const DEFAULT_TEMPERATURE: f32 = 0.5;

/// A saved participant configuration, detached from any debate slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BotTemplate {
    /// Stable template identifier (uuid v4)
    pub uid: String,

    /// Display name
    pub name: String,

    /// Optional blurb
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model settings
    pub model_config: BotModelConfig,

    /// Persona instructions
    pub system_prompt: String,
}

impl BotTemplate {
    /// Capture a bot's configuration as a template.
    ///
    /// Keeps the bot's existing uid when present, otherwise mints one.
    pub fn from_bot(bot: &Bot) -> Self {
        Self {
            uid: bot
                .uid
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: bot.name.clone(),
            description: bot.description.clone(),
            model_config: bot.model_config.clone(),
            system_prompt: bot.system_prompt.clone(),
        }
    }

    /// Bind this template to a debate slot
    pub fn instantiate(&self, slot_id: impl Into<String>) -> Bot {
        Bot {
            id: slot_id.into(),
            uid: Some(self.uid.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            model_config: self.model_config.clone(),
            system_prompt: self.system_prompt.clone(),
            is_active: false,
        }
    }
}

/// The template library
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct BotBank {
    templates: Vec<BotTemplate>,
}

impl BotBank {
    /// Create an empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved templates, in insertion order
    pub fn templates(&self) -> &[BotTemplate] {
        &self.templates
    }

    /// Look up a template by uid
    pub fn get(&self, uid: &str) -> Option<&BotTemplate> {
        self.templates.iter().find(|t| t.uid == uid)
    }

    /// True when the uid resolves to a saved template
    pub fn contains(&self, uid: &str) -> bool {
        self.get(uid).is_some()
    }

    /// Save a bot's configuration, inserting or updating by uid.
    ///
    /// A bot without a uid gets a freshly minted one. A uid the bank has
    /// never seen is inserted as-is, so identities carried in from outside
    /// survive and a later save updates them in place. Returns the saved
    /// template's uid.
    pub fn save(&mut self, bot: &Bot) -> String {
        if let Some(uid) = bot.uid.as_deref() {
            if let Some(existing) = self.templates.iter_mut().find(|t| t.uid == uid) {
                existing.name = bot.name.clone();
                existing.description = bot.description.clone();
                existing.model_config = bot.model_config.clone();
                existing.system_prompt = bot.system_prompt.clone();
                return existing.uid.clone();
            }
        }

        let template = BotTemplate::from_bot(bot);
        let uid = template.uid.clone();
        self.templates.push(template);
        uid
    }

    /// Remove a template by uid. Returns false when the uid is unknown.
    pub fn remove(&mut self, uid: &str) -> bool {
        let before = self.templates.len();
        self.templates.retain(|t| t.uid != uid);
        self.templates.len() != before
    }

    /// Drop every template
    pub fn clear(&mut self) {
        self.templates.clear();
    }

    /// Replace the whole bank (backup restore)
    pub fn replace(&mut self, templates: Vec<BotTemplate>) {
        self.templates = templates;
    }
}

/// A fresh unconfigured bot for the given slot
pub fn create_blank(slot_id: impl Into<String>) -> Bot {
    Bot {
        id: slot_id.into(),
        uid: None,
        name: "New Bot".to_string(),
        description: None,
        model_config: BotModelConfig {
            temperature: DEFAULT_TEMPERATURE,
        },
        system_prompt: String::new(),
        is_active: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{default_bots, BOT_ONE, BOT_TWO};

    #[test]
    fn test_save_and_instantiate_round_trip() {
        let mut bank = BotBank::new();
        let bot = default_bots().remove(0);

        let uid = bank.save(&bot);
        assert_eq!(uid, bot.uid.clone().unwrap());

        let rebound = bank.get(&uid).unwrap().instantiate(BOT_TWO);
        assert_eq!(rebound.id, BOT_TWO);
        assert_eq!(rebound.uid.as_deref(), Some(uid.as_str()));
        assert_eq!(rebound.name, bot.name);
        assert_eq!(rebound.system_prompt, bot.system_prompt);
        assert!(!rebound.is_active);
    }

    #[test]
    fn test_save_updates_existing_template() {
        let mut bank = BotBank::new();
        let mut bot = default_bots().remove(0);
        let uid = bank.save(&bot);

        bot.name = "Axiom II".to_string();
        bot.model_config.temperature = 0.4;
        let updated_uid = bank.save(&bot);

        assert_eq!(uid, updated_uid);
        assert_eq!(bank.templates().len(), 1);
        let template = bank.get(&uid).unwrap();
        assert_eq!(template.name, "Axiom II");
        assert_eq!(template.model_config.temperature, 0.4);
    }

    #[test]
    fn test_save_mints_uid_only_when_absent() {
        let mut bank = BotBank::new();

        let mut bot = create_blank(BOT_ONE);
        bot.name = "Fresh".to_string();
        let minted = bank.save(&bot);
        assert!(bank.contains(&minted));

        // A uid the bank has never seen is kept, not re-minted.
        bot.uid = Some("imported-identity".to_string());
        let kept = bank.save(&bot);
        assert_eq!(kept, "imported-identity");
        assert!(bank.contains("imported-identity"));

        // Saving it again updates in place rather than duplicating.
        bot.name = "Fresh II".to_string();
        assert_eq!(bank.save(&bot), "imported-identity");
        assert_eq!(bank.templates().len(), 2);
        assert_eq!(bank.get("imported-identity").unwrap().name, "Fresh II");
    }

    #[test]
    fn test_first_save_keeps_default_bot_identity() {
        let mut bank = BotBank::new();
        let bot = default_bots().remove(0);

        let uid = bank.save(&bot);
        assert_eq!(Some(uid.as_str()), bot.uid.as_deref());
        bank.save(&bot);
        assert_eq!(bank.templates().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut bank = BotBank::new();
        let bots = default_bots();
        let uid = bank.save(&bots[0]);
        bank.save(&bots[1]);

        assert!(bank.remove(&uid));
        assert!(!bank.remove(&uid));
        assert_eq!(bank.templates().len(), 1);

        bank.clear();
        assert!(bank.templates().is_empty());
    }

    #[test]
    fn test_create_blank() {
        let bot = create_blank(BOT_ONE);
        assert_eq!(bot.id, BOT_ONE);
        assert!(bot.uid.is_none());
        assert!(bot.system_prompt.is_empty());
        assert!(!bot.is_active);
    }

    #[test]
    fn test_bank_serializes_as_bare_array() {
        let mut bank = BotBank::new();
        bank.save(&default_bots()[0]);
        let json = serde_json::to_string(&bank).unwrap();
        assert!(json.starts_with('['));

        let back: BotBank = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bank);
    }
}
