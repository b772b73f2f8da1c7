//! PayMongo checkout sessions via REST API (no SDK dependency)

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{CheckoutRequest, CreatedCheckout, PaymentGateway, PaymentGatewayError};
use crate::config::Config;

const CURRENCY: &str = "PHP";
const PAYMENT_METHODS: &[&str] = &["gcash"];
const DESCRIPTION: &str = "Food Reservation Payment";

#[derive(Serialize)]
struct LineItem<'a> {
    amount: i64,
    currency: &'a str,
    name: &'a str,
    quantity: i64,
}

#[derive(Serialize)]
struct Metadata {
    #[serde(rename = "type")]
    kind: &'static str,
    id: String,
}

#[derive(Serialize)]
struct SessionAttributes<'a> {
    line_items: Vec<LineItem<'a>>,
    payment_method_types: &'a [&'a str],
    description: &'a str,
    send_email_receipt: bool,
    show_description: bool,
    show_line_items: bool,
    success_url: &'a str,
    metadata: Metadata,
}

#[derive(Serialize)]
struct SessionData<'a> {
    attributes: SessionAttributes<'a>,
}

#[derive(Serialize)]
struct CreateSessionBody<'a> {
    data: SessionData<'a>,
}

fn request_body(req: &CheckoutRequest) -> CreateSessionBody<'_> {
    CreateSessionBody {
        data: SessionData {
            attributes: SessionAttributes {
                line_items: vec![
                    LineItem {
                        amount: req.amount_centavos,
                        currency: CURRENCY,
                        name: "Total",
                        quantity: 1,
                    },
                    LineItem {
                        amount: req.service_fee_centavos,
                        currency: CURRENCY,
                        name: "Small Service Fee",
                        quantity: 1,
                    },
                ],
                payment_method_types: PAYMENT_METHODS,
                description: DESCRIPTION,
                send_email_receipt: false,
                show_description: true,
                show_line_items: true,
                success_url: &req.success_url,
                metadata: Metadata {
                    kind: req.target.kind(),
                    id: req.target.id().to_string(),
                },
            },
        },
    }
}

pub struct PayMongoClient {
    http: reqwest::Client,
    secret_key: String,
    api_url: String,
}

impl PayMongoClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            secret_key: config.paymongo_secret_key.clone(),
            api_url: config.paymongo_api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for PayMongoClient {
    async fn create_checkout(
        &self,
        req: &CheckoutRequest,
    ) -> Result<CreatedCheckout, PaymentGatewayError> {
        let resp = self
            .http
            .post(format!("{}/v1/checkout_sessions", self.api_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request_body(req))
            .send()
            .await
            .map_err(|e| PaymentGatewayError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(PaymentGatewayError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PaymentGatewayError::MalformedResponse(e.to_string()))?;

        let session_id = body["data"]["id"].as_str();
        let checkout_url = body["data"]["attributes"]["checkout_url"].as_str();
        match (session_id, checkout_url) {
            (Some(id), Some(url)) if !id.is_empty() && !url.is_empty() => Ok(CreatedCheckout {
                session_id: id.to_string(),
                checkout_url: url.to_string(),
            }),
            _ => Err(PaymentGatewayError::MalformedResponse(format!(
                "checkout session without id or checkout_url: {body}"
            ))),
        }
    }
}
