//! Two-language text catalog and the process-wide language choice.
//!
//! The dictionaries are embedded at compile time and share one nested schema.
//! Keys are dot paths (`"nav.home"`). A key that is missing, or that names a
//! section rather than a text, is an error: there is no fallback between
//! languages.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_error::AppError;
use crate::preference_store::PreferenceStore;

pub const LANGUAGE_KEY: &str = "app_language";

const EN_SOURCE: &str = include_str!("../locales/en.json");
const HI_SOURCE: &str = include_str!("../locales/hi.json");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    En,
    Hi,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::En),
            "hi" => Some(Language::Hi),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Language::En => Language::Hi,
            Language::Hi => Language::En,
        }
    }
}

pub struct Catalog {
    en: JsonValue,
    hi: JsonValue,
}

impl Catalog {
    pub fn embedded() -> Result<Self, AppError> {
        Ok(Self {
            en: serde_json::from_str(EN_SOURCE)?,
            hi: serde_json::from_str(HI_SOURCE)?,
        })
    }

    fn root(&self, language: Language) -> &JsonValue {
        match language {
            Language::En => &self.en,
            Language::Hi => &self.hi,
        }
    }

    fn node(&self, language: Language, key: &str) -> Result<&JsonValue, AppError> {
        let missing = || AppError::MissingTranslation(format!("{}:{key}", language.code()));
        if key.is_empty() {
            return Err(missing());
        }
        key.split('.')
            .try_fold(self.root(language), |node, part| node.get(part))
            .ok_or_else(missing)
    }

    pub fn lookup(&self, language: Language, key: &str) -> Result<&str, AppError> {
        self.node(language, key)?
            .as_str()
            .ok_or_else(|| AppError::MissingTranslation(format!("{}:{key} is not a text", language.code())))
    }

    /// Resolves a key holding a list of texts, e.g. `"about_page.tags"`.
    pub fn lookup_list(&self, language: Language, key: &str) -> Result<Vec<&str>, AppError> {
        let not_list = || AppError::MissingTranslation(format!("{}:{key} is not a text list", language.code()));
        self.node(language, key)?
            .as_array()
            .ok_or_else(not_list)?
            .iter()
            .map(|item| item.as_str().ok_or_else(not_list))
            .collect()
    }
}

/// The active language, read everywhere and changed only by [`LocaleState::toggle`]
/// or [`LocaleState::set_language`].
pub struct LocaleState {
    language: RwLock<Language>,
    prefs: Option<PreferenceStore>,
    catalog: Catalog,
}

impl LocaleState {
    /// Restores the persisted choice; a missing or unknown flag means English.
    pub fn open(prefs: PreferenceStore) -> Result<Self, AppError> {
        let language = match prefs.get(LANGUAGE_KEY)? {
            Some(code) => Language::from_code(&code).unwrap_or_else(|| {
                warn!("Unknown language flag '{code}', using default");
                Language::default()
            }),
            None => Language::default(),
        };
        info!("Language restored as '{}'", language.code());

        Ok(Self { language: RwLock::new(language), prefs: Some(prefs), catalog: Catalog::embedded()? })
    }

    /// State that is not persisted across sessions.
    pub fn in_memory(language: Language) -> Result<Self, AppError> {
        Ok(Self { language: RwLock::new(language), prefs: None, catalog: Catalog::embedded()? })
    }

    fn current(&self) -> RwLockReadGuard<'_, Language> {
        self.language.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_mut(&self) -> RwLockWriteGuard<'_, Language> {
        self.language.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn language(&self) -> Language {
        *self.current()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Switches to the other language and persists the choice. A failed
    /// write is logged; the switch still takes effect for this session.
    pub fn toggle(&self) -> Language {
        let next = {
            let mut language = self.current_mut();
            *language = language.toggled();
            *language
        };
        self.persist(next);
        next
    }

    pub fn set_language(&self, language: Language) {
        *self.current_mut() = language;
        self.persist(language);
    }

    fn persist(&self, language: Language) {
        if let Some(prefs) = &self.prefs {
            if let Err(e) = prefs.set(LANGUAGE_KEY, language.code()) {
                warn!("Could not persist language '{}': {e}", language.code());
            }
        }
    }

    /// Text for `key` in the active language.
    pub fn t(&self, key: &str) -> Result<&str, AppError> {
        self.catalog.lookup(self.language(), key)
    }
}
