use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::sources::{http_client, Predictor};
use crate::types::{ModelId, Prediction};

#[derive(Serialize)]
struct PredictRequest<'a> {
    model: &'a str,
    team: &'a str,
}

/// HTTP front of the model service: `POST {base}/predict {"model", "team"}`.
/// The service picks the team's next game and answers with a [`Prediction`].
pub struct ModelServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ModelServiceClient {
    pub fn new(base_url: String) -> Result<Self> {
        Ok(Self { client: http_client()?, base_url })
    }
}

#[async_trait]
impl Predictor for ModelServiceClient {
    async fn predict(&self, model: ModelId, home_team: &str) -> Result<Prediction> {
        let url = format!("{}/predict", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&PredictRequest { model: model.as_str(), team: home_team })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::collaborator("model service", format!("{status}: {body}")));
        }

        let prediction: Prediction = resp.json().await?;
        debug!(
            model = %model,
            team = home_team,
            game_id = prediction.info.game_id,
            winner = ?prediction.winner,
            "Model answered"
        );
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::Prediction;
    use serde_json::json;

    #[test]
    fn decline_deserializes_with_null_winner() {
        let p: Prediction = serde_json::from_value(json!({
            "winner": null,
            "confidence": 0.0,
            "info": {
                "game_id": 746001,
                "date": "2026-10-18",
                "datetime": "2026-10-18T19:10:00-04:00",
                "home": "New York Mets",
                "away": "Atlanta Braves"
            }
        }))
        .unwrap();
        assert!(p.winner.is_none());
        assert_eq!(p.info.venue, "");
        assert!(p.info.home_probable.is_none());
    }
}
