//! API request/response models for recipe generation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::prompts::Mode;

pub const MAX_ITEMS: usize = 50;
pub const MAX_ITEM_CHARS: usize = 100;
pub const MAX_REQUIREMENTS_CHARS: usize = 500;
pub const MAX_NUM_RECIPES: u8 = 3;

fn default_num_recipes() -> u8 {
    3
}

/// How the completion is returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Freeform text completion
    Text,
    /// Schema-constrained `{recipes: [...]}` document
    #[default]
    Structured,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecipeRequest {
    /// Ingredients on hand, 1-50 entries
    pub items: Vec<String>,
    /// Optional free-text requirements (sanitized before prompting)
    #[serde(default)]
    pub requirements: Option<String>,
    /// Tone the recipes are written in
    #[serde(default)]
    pub mode: Mode,
    /// How many recipes to generate (1-3)
    #[serde(default = "default_num_recipes", alias = "numRecipes")]
    pub num_recipes: u8,
    /// Include step-by-step preparation instructions
    #[serde(default, alias = "fullSteps")]
    pub full_steps: bool,
    #[serde(default)]
    pub format: ResponseFormat,
}

impl RecipeRequest {
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(validation("items", "At least one item is required"));
        }
        if self.items.len() > MAX_ITEMS {
            return Err(validation("items", format!("Too many items (maximum {MAX_ITEMS})")));
        }
        for item in &self.items {
            let trimmed = item.trim();
            if trimmed.is_empty() {
                return Err(validation("items", "Item cannot be empty"));
            }
            if trimmed.chars().count() > MAX_ITEM_CHARS {
                return Err(validation("items", "Item too long"));
            }
        }

        if let Some(requirements) = &self.requirements {
            if requirements.chars().count() > MAX_REQUIREMENTS_CHARS {
                return Err(validation(
                    "requirements",
                    format!("Requirements text is too long (maximum {MAX_REQUIREMENTS_CHARS} characters)"),
                ));
            }
        }

        if self.num_recipes == 0 || self.num_recipes > MAX_NUM_RECIPES {
            return Err(validation(
                "num_recipes",
                format!("Recipe count must be between 1 and {MAX_NUM_RECIPES}"),
            ));
        }

        Ok(())
    }
}

fn validation(field: &str, message: impl Into<String>) -> Error {
    Error::Validation {
        field: Some(field.to_string()),
        message: message.into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeStep {
    pub step_number: u32,
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Recipe {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<RecipeStep>>,
}

/// The provider's structured completion document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StructuredRecipes {
    pub recipes: Vec<Recipe>,
}

/// Either form of recipe output under the shared `recipes` key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RecipesBody {
    Text(String),
    Recipes(Vec<Recipe>),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeResponse {
    pub recipes: RecipesBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: &[&str]) -> RecipeRequest {
        RecipeRequest {
            items: items.iter().map(|s| s.to_string()).collect(),
            requirements: None,
            mode: Mode::Default,
            num_recipes: 3,
            full_steps: false,
            format: ResponseFormat::Structured,
        }
    }

    #[test]
    fn test_defaults_applied_on_minimal_payload() {
        let parsed: RecipeRequest = serde_json::from_str(r#"{"items": ["eggs"]}"#).unwrap();
        assert_eq!(parsed.num_recipes, 3);
        assert!(!parsed.full_steps);
        assert_eq!(parsed.mode, Mode::Default);
        assert_eq!(parsed.format, ResponseFormat::Structured);
    }

    #[test]
    fn test_camel_case_aliases_accepted() {
        let parsed: RecipeRequest =
            serde_json::from_str(r#"{"items": ["eggs"], "numRecipes": 2, "fullSteps": true}"#).unwrap();
        assert_eq!(parsed.num_recipes, 2);
        assert!(parsed.full_steps);
    }

    #[test]
    fn test_empty_items_rejected() {
        let err = request(&[]).validate().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_blank_item_rejected() {
        assert!(request(&["eggs", "   "]).validate().is_err());
    }

    #[test]
    fn test_item_count_and_length_bounds() {
        let many: Vec<String> = (0..51).map(|i| format!("item{i}")).collect();
        let mut req = request(&[]);
        req.items = many;
        assert!(req.validate().is_err());

        let long_item = "x".repeat(101);
        assert!(request(&[&long_item]).validate().is_err());
        let ok_item = "x".repeat(100);
        assert!(request(&[&ok_item]).validate().is_ok());
    }

    #[test]
    fn test_requirements_length_bound() {
        let mut req = request(&["eggs"]);
        req.requirements = Some("y".repeat(501));
        assert!(req.validate().is_err());
        req.requirements = Some("y".repeat(500));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_num_recipes_bounds() {
        let mut req = request(&["eggs"]);
        req.num_recipes = 0;
        assert!(req.validate().is_err());
        req.num_recipes = 4;
        assert!(req.validate().is_err());
        req.num_recipes = 1;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_recipes_body_serializes_both_forms() {
        let text = RecipeResponse { recipes: RecipesBody::Text("1. Pancakes".to_string()) };
        assert_eq!(serde_json::to_value(&text).unwrap(), serde_json::json!({"recipes": "1. Pancakes"}));

        let structured = RecipeResponse {
            recipes: RecipesBody::Recipes(vec![Recipe {
                name: "Pancakes".to_string(),
                description: "Fluffy.".to_string(),
                steps: None,
            }]),
        };
        let value = serde_json::to_value(&structured).unwrap();
        assert_eq!(value["recipes"][0]["name"], "Pancakes");
        assert!(value["recipes"][0].get("steps").is_none());
    }
}
