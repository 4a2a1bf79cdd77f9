use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// One purchasable tool listing. Loaded once at startup and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub price: Decimal,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, item_id: &ItemId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| &item.id == item_id)
    }

    /// Fuzzy lookup for spoken or typed item names.
    ///
    /// Both sides are lowercased and trimmed; an item matches when its name
    /// contains the query or the query contains its name, so "windsurf"
    /// resolves "Windsurf Editor" and "the windsurf editor please" resolves
    /// "Windsurf". Ties break on catalog order - the first match wins, even
    /// when a later item would be a closer fit. Short names can therefore
    /// shadow longer queries; that permissiveness is deliberate and callers
    /// must not depend on best-match behavior.
    pub fn find_by_name(&self, query: &str) -> Option<&CatalogItem> {
        let normalized_query = normalize(query);
        if normalized_query.is_empty() {
            return None;
        }

        self.items.iter().find(|item| {
            let normalized_name = normalize(&item.name);
            normalized_name.contains(&normalized_query)
                || normalized_query.contains(&normalized_name)
        })
    }

    /// One line per item as `"<name> - $<price>"`. This exact shape is part
    /// of the extraction prompt contract; changing it changes model behavior.
    pub fn summary(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{} - ${}", item.name, item.price))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The built-in dev-tool storefront used when no `[catalog]` config
    /// section is provided.
    pub fn storefront() -> Self {
        let item = |id: &str, name: &str, cents: i64, category: &str, description: &str| {
            CatalogItem {
                id: ItemId::new(id),
                name: name.to_string(),
                price: Decimal::new(cents, 2),
                category: category.to_string(),
                description: Some(description.to_string()),
                image: None,
            }
        };

        Self::new(vec![
            item(
                "1",
                "Windsurf",
                15_00,
                "code-generation",
                "AI-powered VS Code fork with agentic capabilities",
            ),
            item(
                "2",
                "GitHub Copilot",
                20_00,
                "code-generation",
                "AI code completion across multiple languages",
            ),
            item(
                "3",
                "Tabnine",
                15_00,
                "code-generation",
                "Context-aware code suggestions with security focus",
            ),
            item(
                "4",
                "Replit GhostWriter",
                15_00,
                "code-generation",
                "Cloud-based AI coding assistant",
            ),
            item(
                "5",
                "Cursor",
                20_00,
                "code-generation",
                "AI-powered VS Code fork with real-time assistance",
            ),
            item("6", "Devin", 200_00, "code-generation", "Advanced autonomous coding agent"),
            item(
                "7",
                "JetBrains IntelliJ IDEA",
                149_00,
                "developer-tools",
                "Java IDE with smart assistance",
            ),
            item("8", "Visual Studio Code", 0, "developer-tools", "Extensible code editor"),
            item("9", "Postman", 12_00, "developer-tools", "API development platform"),
            item("10", "Docker", 0, "developer-tools", "Containerization platform"),
            item("11", "Jenkins", 0, "developer-tools", "CI/CD automation server"),
        ])
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
