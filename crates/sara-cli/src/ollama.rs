//! Ollama discovery: lists locally downloaded models via `/api/tags`.

use serde::Deserialize;

/// A single model entry returned by Ollama's `/api/tags` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

/// Ping the Ollama server and return the list of available models.
///
/// Blocking; call only outside the async runtime.
pub fn fetch_models(base_url: &str) -> Result<Vec<OllamaModel>, String> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let response =
        reqwest::blocking::get(&url).map_err(|e| format!("Ollama unreachable at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("Ollama returned HTTP {}", response.status()));
    }

    let tags: TagsResponse = response
        .json()
        .map_err(|e| format!("Failed to parse Ollama response: {}", e))?;

    Ok(tags.models)
}

/// `true` if `wanted` is among `models`, allowing Ollama's implicit `:latest`
/// tag (`llama3` matches `llama3:latest`).
pub fn has_model(models: &[OllamaModel], wanted: &str) -> bool {
    models.iter().any(|m| {
        m.name == wanted || m.name.strip_suffix(":latest").is_some_and(|base| base == wanted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(names: &[&str]) -> Vec<OllamaModel> {
        names
            .iter()
            .map(|n| OllamaModel {
                name: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn latest_tag_is_implicit() {
        let available = models(&["llama3:latest", "nomic-embed-text:v1.5"]);
        assert!(has_model(&available, "llama3"));
        assert!(has_model(&available, "llama3:latest"));
        assert!(!has_model(&available, "nomic-embed-text"));
        assert!(!has_model(&available, "mistral"));
    }

    #[test]
    fn tags_response_tolerates_missing_models() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(tags.models.is_empty());
    }

    #[test]
    fn unreachable_server_is_an_error() {
        assert!(fetch_models("http://127.0.0.1:1").is_err());
    }
}
