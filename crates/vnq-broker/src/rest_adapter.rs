//! Signed REST broker adapter implementing `vnq_execution::BrokerAdapter`.
//!
//! Response parsing is defensive by design: an order type or
//! status the broker returns that this crate doesn't recognize never panics
//! or propagates a parse error up through the order pipeline -- it degrades
//! to the safest default (`OrderType::Lo`, `OrderStatus::Pending`) and logs
//! a warning, since an order the system can't classify is still a live
//! broker-side order that must not be silently dropped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rsa::RsaPrivateKey;
use serde::Deserialize;
use serde_json::json;

use vnq_execution::{BrokerAck, BrokerAdapter, BrokerOrderStatus, BrokerRejected};
use vnq_resilience::{BreakerError, CircuitBreaker, RetryPolicy};
use vnq_schemas::{Order, OrderType};

use crate::auth::{sign_payload, AuthError, TokenState};

pub struct SsiRestBrokerConfig {
    pub base_url: String,
    pub consumer_id: String,
    pub consumer_secret: String,
    pub private_key: RsaPrivateKey,
}

pub struct SsiRestBroker {
    config: SsiRestBrokerConfig,
    http: reqwest::Client,
    token: TokenState,
    circuit_breaker: CircuitBreaker,
    retry_policy: RetryPolicy,
}

impl SsiRestBroker {
    pub fn new(config: SsiRestBrokerConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            token: TokenState::new(),
            circuit_breaker: CircuitBreaker::new("broker-rest", 5, Duration::from_secs(30)),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Wraps one outbound broker call in the circuit breaker, then the retry
    /// policy: a tripped breaker fails fast without touching the network, and
    /// only transport-level failures (timeouts, connect errors) get retried
    /// -- a broker-side business rejection reaches the caller unchanged.
    async fn call_with_resilience<T, F, Fut>(&self, operation: &'static str, f: F) -> anyhow::Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        self.circuit_breaker
            .call(|| self.retry_policy.run(operation, &f, |e: &anyhow::Error| is_retryable_error(e)))
            .await
            .map_err(|err| match err {
                BreakerError::Open(open) => anyhow::Error::new(open),
                BreakerError::Inner(inner) => inner,
            })
    }

    async fn authenticate(&self) -> Result<(String, std::time::Duration), AuthError> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let fields = [
            ("consumerID", self.config.consumer_id.as_str()),
            ("consumerSecret", self.config.consumer_secret.as_str()),
            ("timestamp", timestamp.as_str()),
        ];
        let signature = sign_payload(&self.config.private_key, &fields)?;

        let body = json!({
            "consumerID": self.config.consumer_id,
            "consumerSecret": self.config.consumer_secret,
            "timestamp": timestamp,
            "signature": signature,
        });

        let resp: AuthResponse = self
            .http
            .post(format!("{}/api/v2/Trading/AccessToken", self.config.base_url))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if resp.status != 200 {
            return Err(AuthError::Rejected(resp.message));
        }
        let data = resp.data.ok_or_else(|| AuthError::Rejected("missing data in auth response".into()))?;
        Ok((data.access_token, std::time::Duration::from_secs(data.expires_in)))
    }
}

#[derive(Deserialize)]
struct AuthResponse {
    status: i32,
    #[serde(default)]
    message: String,
    data: Option<AuthData>,
}

#[derive(Deserialize)]
struct AuthData {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "expiresIn", default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    1800
}

#[derive(Deserialize)]
struct OrderResponse {
    status: i32,
    #[serde(default)]
    message: String,
    data: Option<OrderResponseData>,
}

#[derive(Deserialize)]
struct OrderResponseData {
    #[serde(rename = "orderId")]
    order_id: String,
}

#[derive(Deserialize)]
struct OrderStatusResponse {
    status: i32,
    #[serde(default)]
    message: String,
    data: Option<OrderStatusData>,
}

#[derive(Deserialize)]
struct OrderStatusData {
    #[serde(rename = "orderId")]
    order_id: String,
    #[serde(rename = "orderStatus")]
    order_status: String,
    #[serde(rename = "filledQuantity", default)]
    filled_quantity: i64,
    #[serde(rename = "avgPrice", default)]
    avg_price: Option<String>,
}

#[derive(Deserialize)]
struct OpenOrdersResponse {
    status: i32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Vec<OrderStatusData>,
}

/// Only transport-level failures are worth a retry or a strike against the
/// breaker -- a parsed broker rejection is a business outcome, not a fault.
fn is_retryable_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .map(|e| e.is_timeout() || e.is_connect() || e.is_request())
        .unwrap_or(false)
}

/// Defensive parse: anything other than the four known codes maps to LO.
pub fn parse_order_type(raw: Option<&str>) -> OrderType {
    match raw {
        Some("LO") => OrderType::Lo,
        Some("ATO") => OrderType::Ato,
        Some("ATC") => OrderType::Atc,
        Some("MP") => OrderType::Mp,
        other => {
            if other.is_some() {
                tracing::warn!(raw = ?other, "unrecognized broker order type, defaulting to LO");
            }
            OrderType::Lo
        }
    }
}

#[async_trait]
impl BrokerAdapter for SsiRestBroker {
    async fn place_order(&self, order: &Order) -> Result<BrokerAck, BrokerRejected> {
        let token = self
            .token
            .get_access_token(|| self.authenticate())
            .await
            .map_err(|e| BrokerRejected { reason: e.to_string() })?;

        let body = json!({
            "symbol": order.symbol.as_str(),
            "side": match order.side {
                vnq_schemas::Side::Buy => "B",
                vnq_schemas::Side::Sell => "S",
            },
            "orderType": match order.order_type {
                OrderType::Lo => "LO",
                OrderType::Ato => "ATO",
                OrderType::Atc => "ATC",
                OrderType::Mp => "MP",
            },
            "quantity": order.quantity.raw(),
            "price": order.limit_price.to_wire_string(),
            "clientOrderId": order.order_id,
        });

        let parsed: OrderResponse = self
            .call_with_resilience("broker_place_order", || async {
                let resp = self
                    .http
                    .post(format!("{}/api/v2/Trading/NewOrder", self.config.base_url))
                    .bearer_auth(&token)
                    .json(&body)
                    .send()
                    .await?;
                Ok(resp.json::<OrderResponse>().await?)
            })
            .await
            .map_err(|e| BrokerRejected { reason: e.to_string() })?;

        if parsed.status != 200 {
            return Err(BrokerRejected { reason: parsed.message });
        }
        let data = parsed
            .data
            .ok_or_else(|| BrokerRejected { reason: "broker accepted order but returned no data".into() })?;

        Ok(BrokerAck {
            broker_order_id: data.order_id,
        })
    }

    async fn cancel_order(&self, broker_order_id: &str) -> anyhow::Result<()> {
        let token = self.token.get_access_token(|| self.authenticate()).await?;

        let body = json!({ "orderId": broker_order_id });
        let resp: OrderResponse = self
            .call_with_resilience("broker_cancel_order", || async {
                let resp = self
                    .http
                    .post(format!("{}/api/v2/Trading/CancelOrder", self.config.base_url))
                    .bearer_auth(&token)
                    .json(&body)
                    .send()
                    .await?;
                Ok(resp.json::<OrderResponse>().await?)
            })
            .await?;

        if resp.status != 200 {
            anyhow::bail!("broker rejected cancel for order {broker_order_id}: {}", resp.message);
        }
        Ok(())
    }

    async fn get_order_status(&self, broker_order_id: &str) -> anyhow::Result<BrokerOrderStatus> {
        let token = self.token.get_access_token(|| self.authenticate()).await?;

        let resp: OrderStatusResponse = self
            .call_with_resilience("broker_get_order_status", || async {
                let resp = self
                    .http
                    .get(format!("{}/api/v2/Trading/OrderStatus/{broker_order_id}", self.config.base_url))
                    .bearer_auth(&token)
                    .send()
                    .await?;
                Ok(resp.json::<OrderStatusResponse>().await?)
            })
            .await?;

        if resp.status != 200 {
            anyhow::bail!("broker rejected order status query for {broker_order_id}: {}", resp.message);
        }
        let data = resp
            .data
            .ok_or_else(|| anyhow::anyhow!("broker returned no data for order status query"))?;
        Ok(order_status_from_wire(data))
    }

    async fn get_open_orders(&self, symbol: Option<&str>) -> anyhow::Result<Vec<BrokerOrderStatus>> {
        let token = self.token.get_access_token(|| self.authenticate()).await?;

        let resp: OpenOrdersResponse = self
            .call_with_resilience("broker_get_open_orders", || async {
                let mut req = self
                    .http
                    .get(format!("{}/api/v2/Trading/OpenOrders", self.config.base_url))
                    .bearer_auth(&token);
                if let Some(sym) = symbol {
                    req = req.query(&[("symbol", sym)]);
                }
                let resp = req.send().await?;
                Ok(resp.json::<OpenOrdersResponse>().await?)
            })
            .await?;
        if resp.status != 200 {
            anyhow::bail!("broker rejected open orders query: {}", resp.message);
        }
        Ok(resp.data.into_iter().map(order_status_from_wire).collect())
    }
}

/// Defensive: an unparseable `avgPrice` string degrades to `None` rather than
/// failing the whole status query -- a synchronizer tick must still see the
/// status and filled quantity even if the price field is malformed.
fn order_status_from_wire(data: OrderStatusData) -> BrokerOrderStatus {
    let avg_fill_price = data
        .avg_price
        .and_then(|s| s.parse::<rust_decimal::Decimal>().ok());
    BrokerOrderStatus {
        broker_order_id: data.order_id,
        raw_status: data.order_status,
        filled_quantity: data.filled_quantity,
        avg_fill_price,
    }
}
