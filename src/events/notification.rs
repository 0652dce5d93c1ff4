use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A competitor undercuts us and no automatic change was made
    CompetitorPriceDrop,
    /// The engine lowered our price
    AutoPriceAdjusted,
    /// A competitor link's observed price moved
    PriceChange,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::CompetitorPriceDrop => "competitor_price_drop",
            NotificationType::AutoPriceAdjusted => "auto_price_adjusted",
            NotificationType::PriceChange => "price_change",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub product_id: Option<i64>,
    pub competitor_id: Option<i64>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Notification {
    /// Alert-only: a competitor is cheaper and our price stays as it is
    pub fn competitor_price_drop(
        product_id: i64,
        product_name: &str,
        competitor_id: i64,
        competitor_price: f64,
        current_price: f64,
        recommended_price: f64,
        blocked_by: Option<String>,
    ) -> Self {
        let message = match &blocked_by {
            Some(guard) => format!(
                "Competitor sells {} at {:.2}, below our {:.2}. Recommended {:.2} was not applied: {}",
                product_name, competitor_price, current_price, recommended_price, guard
            ),
            None => format!(
                "Competitor sells {} at {:.2}, below our {:.2}. Recommended price: {:.2}",
                product_name, competitor_price, current_price, recommended_price
            ),
        };

        let mut metadata = object(json!({
            "competitorPrice": competitor_price,
            "currentPrice": current_price,
            "recommendedPrice": recommended_price,
            "priceGap": current_price - competitor_price,
        }));
        if let Some(guard) = blocked_by {
            metadata.insert("guard".to_string(), Value::String(guard));
        }

        Self {
            notification_type: NotificationType::CompetitorPriceDrop,
            product_id: Some(product_id),
            competitor_id: Some(competitor_id),
            title: format!("Competitor price drop: {}", product_name),
            message,
            metadata,
        }
    }

    pub fn auto_price_adjusted(
        product_id: i64,
        product_name: &str,
        competitor_id: i64,
        old_price: f64,
        new_price: f64,
    ) -> Self {
        Self {
            notification_type: NotificationType::AutoPriceAdjusted,
            product_id: Some(product_id),
            competitor_id: Some(competitor_id),
            title: format!("Price adjusted: {}", product_name),
            message: format!(
                "Price of {} changed automatically from {:.2} to {:.2}",
                product_name, old_price, new_price
            ),
            metadata: object(json!({
                "oldPrice": old_price,
                "newPrice": new_price,
            })),
        }
    }

    pub fn price_change(
        product_id: i64,
        competitor_id: i64,
        link_id: i64,
        old_price: Option<f64>,
        new_price: f64,
    ) -> Self {
        let message = match old_price {
            Some(old) => format!("Competitor price changed from {:.2} to {:.2}", old, new_price),
            None => format!("Competitor price observed at {:.2}", new_price),
        };
        Self {
            notification_type: NotificationType::PriceChange,
            product_id: Some(product_id),
            competitor_id: Some(competitor_id),
            title: "Competitor price change".to_string(),
            message,
            metadata: object(json!({
                "linkId": link_id,
                "oldPrice": old_price,
                "newPrice": new_price,
            })),
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
