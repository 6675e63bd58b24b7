//! JSON schema constraints for structured recipe output.

use serde_json::{json, Value};

/// Builds the `response_format` object constraining the provider to emit
/// `{recipes: [{name, description, steps?}]}`. `steps` is present and
/// required only when `full_steps` is set.
pub fn recipe_response_format(num_recipes: u8, full_steps: bool) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": recipe_schema(num_recipes, full_steps),
    })
}

fn recipe_schema(num_recipes: u8, full_steps: bool) -> Value {
    let mut recipe_properties = json!({
        "name": {
            "type": "string",
            "description": "The name of the recipe",
        },
        "description": {
            "type": "string",
            "description": "A brief description of the recipe (2-3 sentences)",
        },
    });

    if full_steps {
        recipe_properties["steps"] = json!({
            "type": "array",
            "description": "Step-by-step preparation instructions",
            "items": {
                "type": "object",
                "properties": {
                    "step_number": {
                        "type": "number",
                        "description": "The sequential number of this step",
                    },
                    "instruction": {
                        "type": "string",
                        "description": "The instruction for this step",
                    },
                },
                "required": ["step_number", "instruction"],
                "additionalProperties": false,
            },
        });
    }

    let required = if full_steps {
        json!(["name", "description", "steps"])
    } else {
        json!(["name", "description"])
    };

    let plural = if num_recipes > 1 { "s" } else { "" };
    let steps_suffix = if full_steps { " with full preparation steps" } else { "" };

    json!({
        "name": "recipe_suggestions",
        "description": format!(
            "Generate exactly {num_recipes} recipe suggestion{plural} based on the provided ingredients{steps_suffix}"
        ),
        "schema": {
            "type": "object",
            "properties": {
                "recipes": {
                    "type": "array",
                    "description": format!("An array of exactly {num_recipes} recipe{plural}"),
                    "items": {
                        "type": "object",
                        "properties": recipe_properties,
                        "required": required,
                        "additionalProperties": false,
                    },
                },
            },
            "required": ["recipes"],
            "additionalProperties": false,
        },
        "strict": true,
    })
}
