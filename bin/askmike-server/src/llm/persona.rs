//! The character the assistant plays, and the system prompt built from it.

use serde::Deserialize;

const MIKE_TOML: &str = include_str!("../../persona/mike.toml");

/// Number of lore items included in the system prompt.
const PROMPT_LORE_ITEMS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct Persona {
    pub name: String,
    pub system: String,
    #[serde(default)]
    pub bio: Vec<String>,
    pub style: StyleGuide,
    #[serde(default)]
    pub lore: Vec<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StyleGuide {
    #[serde(default)]
    pub all: Vec<String>,
    #[serde(default)]
    pub chat: Vec<String>,
    #[serde(default)]
    pub post: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entity {
    pub name: String,
    pub role: String,
    pub contribution: String,
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Persona {
    /// The built-in "Mike" persona.
    pub fn mike() -> Result<Self, toml::de::Error> {
        Self::from_toml(MIKE_TOML)
    }

    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn system_prompt(&self) -> String {
        let entities = self
            .entities
            .iter()
            .map(|e| format!("{} ({}): {}", e.name, e.role, e.contribution))
            .collect::<Vec<_>>()
            .join("\n");
        let lore = &self.lore[..self.lore.len().min(PROMPT_LORE_ITEMS)];

        format!(
            "{system}\n\n\
             STYLE GUIDELINES:\n\
             General Style:\n{all}\n\n\
             Chat Style:\n{chat}\n\n\
             Post Style:\n{post}\n\n\
             ENTITIES & INFLUENCES:\n{entities}\n\n\
             BACKGROUND LORE (to subtly reference when appropriate):\n{lore}",
            system = self.system,
            all = bullets(&self.style.all),
            chat = bullets(&self.style.chat),
            post = bullets(&self.style.post),
            lore = bullets(lore),
        )
    }
}
