use serde::{Deserialize, Serialize};
use sv_domain::state::Document;

/// Body of the similarity-match RPC.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRequest<'a> {
    pub query_embedding: &'a [f32],
    pub match_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<&'a serde_json::Value>,
}

/// One row returned by the match RPC.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchRow {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(alias = "page_content", alias = "text")]
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub similarity: Option<f32>,
}

impl From<MatchRow> for Document {
    fn from(row: MatchRow) -> Self {
        let mut metadata = match row.metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("raw".into(), other);
                map
            }
        };
        if let Some(id) = row.id {
            metadata.entry("id").or_insert(id);
        }
        if let Some(sim) = row.similarity {
            metadata.insert("similarity".into(), serde_json::json!(sim));
        }
        Document {
            text: row.content,
            metadata: serde_json::Value::Object(metadata),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_to_document_keeps_similarity_and_id() {
        let row: MatchRow = serde_json::from_str(
            r#"{"id": 7, "content": "Villa A has 3 bedrooms", "metadata": {"source": "brochure"}, "similarity": 0.82}"#,
        )
        .unwrap();
        let doc = Document::from(row);
        assert_eq!(doc.text, "Villa A has 3 bedrooms");
        assert_eq!(doc.metadata["source"], "brochure");
        assert_eq!(doc.metadata["id"], 7);
        assert!(doc.metadata["similarity"].as_f64().unwrap() > 0.8);
    }

    #[test]
    fn page_content_alias_and_missing_metadata() {
        let row: MatchRow = serde_json::from_str(r#"{"page_content": "x"}"#).unwrap();
        let doc = Document::from(row);
        assert_eq!(doc.text, "x");
        assert!(doc.metadata.as_object().unwrap().is_empty());
    }
}
