use serde::{Deserialize, Serialize};

use super::EmbeddingError;

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

/// One call to an OpenAI-compatible `/embeddings` endpoint.
pub async fn call_embeddings(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    expected_dimensions: u32,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let url = format!("{}/embeddings", base_url.trim_end_matches('/'));

    let mut request = http.post(&url).json(&EmbeddingsRequest {
        model,
        input: texts,
    });
    if !api_key.is_empty() {
        request = request.header("Authorization", format!("Bearer {}", api_key));
    }

    let response = request
        .send()
        .await
        .map_err(|e| EmbeddingError::Http(e.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(EmbeddingError::Auth(format!("{}: {}", status, body)));
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(EmbeddingError::RateLimited { retry_after });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EmbeddingError::Api(format!("{}: {}", status, body)));
    }

    let body: EmbeddingsResponse = response
        .json()
        .await
        .map_err(|e| EmbeddingError::Api(format!("Malformed embeddings response: {}", e)))?;

    // The API may return data out of order; sort by index.
    let mut data = body.data;
    data.sort_by_key(|d| d.index);

    let mut embeddings = Vec::with_capacity(data.len());
    for datum in data {
        if datum.embedding.len() != expected_dimensions as usize {
            return Err(EmbeddingError::DimensionMismatch {
                expected: expected_dimensions,
                got: datum.embedding.len(),
            });
        }
        embeddings.push(datum.embedding);
    }

    Ok(embeddings)
}
