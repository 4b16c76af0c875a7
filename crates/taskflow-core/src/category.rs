use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const FALLBACK_COLOR: &str = "#6366f1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl Category {
    pub fn new(id: &str, name: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CategoriesFile {
    #[serde(default, rename = "category")]
    categories: Vec<Category>,
}

/// Read-only category list supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categories {
    items: Vec<Category>,
}

impl Default for Categories {
    fn default() -> Self {
        Self::new(vec![
            Category::new("1", "Personal", "#6366f1"),
            Category::new("2", "Work", "#ec4899"),
            Category::new("3", "Health", "#10b981"),
            Category::new("4", "Learning", "#f59e0b"),
        ])
    }
}

impl Categories {
    pub fn new(items: Vec<Category>) -> Self {
        Self { items }
    }

    #[tracing::instrument(skip(path))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed: CategoriesFile = toml::from_str(&raw)
            .with_context(|| format!("failed parsing {}", path.display()))?;

        if parsed.categories.is_empty() {
            return Err(anyhow!("{} defines no categories", path.display()));
        }
        for (idx, category) in parsed.categories.iter().enumerate() {
            if parsed.categories[..idx].iter().any(|c| c.id == category.id) {
                return Err(anyhow!(
                    "{} defines category id {} twice",
                    path.display(),
                    category.id
                ));
            }
        }

        info!(file = %path.display(), count = parsed.categories.len(), "loaded categories");
        Ok(Self::new(parsed.categories))
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.items.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn name_for(&self, id: &str) -> &str {
        self.get(id).map_or(UNCATEGORIZED, |c| c.name.as_str())
    }

    pub fn color_for(&self, id: &str) -> &str {
        self.get(id).map_or(FALLBACK_COLOR, |c| c.color.as_str())
    }

    /// Picks the category new tasks land in when no category filter is active.
    pub fn default_id(&self, preferred: Option<&str>) -> String {
        if let Some(id) = preferred
            && self.contains(id)
        {
            return id.to_string();
        }
        let fallback = self.items.first().map_or("1", |c| c.id.as_str());
        debug!(?preferred, fallback, "default category not configured or unknown");
        fallback.to_string()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.items.iter()
    }
}
