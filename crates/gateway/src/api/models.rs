//! `GET /models` (§6): provider -> model list map.
//!
//! The gateway doesn't discover models from the backends themselves (that
//! lives entirely inside each CLI's own `initialize` handshake); this is a
//! static catalog an operator dashboard can offer as defaults for
//! `set_model`.

use axum::Json;

pub async fn models() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "claude": ["claude-opus-4", "claude-sonnet-4", "claude-haiku-4"],
        "codex": ["gpt-5-codex", "gpt-5-codex-mini"],
        "gemini": ["gemini-2.5-pro", "gemini-2.5-flash"],
        "mock": ["mock"],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_covers_every_provider() {
        let Json(body) = models().await;
        for provider in ["claude", "codex", "gemini", "mock"] {
            assert!(body.get(provider).is_some_and(|v| v.is_array()), "missing {provider}");
        }
    }
}
