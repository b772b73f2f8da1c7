//! Hosted checkout and payment confirmation
//!
//! Checkout creates a gateway session for an unpaid order (whole week) or
//! reservation (one day) and records which target it pays for. The gateway
//! later confirms payment through a signed webhook; the paid flag is flipped
//! with a compare-and-set so redelivered events change nothing.

pub mod paymongo;
pub mod signature;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{CheckoutResponse, Order, PaymentTarget, Profile};
use thiserror::Error;

use crate::config::Config;
use crate::db::{CheckoutSession, RepoError, Store};
use crate::error::{ServiceError, ServiceResult};

pub use paymongo::PayMongoClient;

/// The only event type that confirms a payment
pub const PAID_EVENT: &str = "checkout_session.payment.paid";

const CENTAVOS_PER_PESO: i64 = 100;

#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),

    #[error("gateway rejected the request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("unexpected gateway response: {0}")]
    MalformedResponse(String),
}

impl From<PaymentGatewayError> for AppError {
    fn from(_: PaymentGatewayError) -> Self {
        AppError::new(ErrorCode::PaymentGatewayError)
    }
}

#[derive(Debug, Error)]
pub enum WebhookVerificationError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("malformed signature header")]
    MalformedSignature,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("unknown checkout session: {0}")]
    UnknownSession(String),

    #[error(transparent)]
    Store(#[from] RepoError),
}

impl From<WebhookVerificationError> for ServiceError {
    fn from(err: WebhookVerificationError) -> Self {
        match err {
            WebhookVerificationError::MissingSignature
            | WebhookVerificationError::MalformedSignature
            | WebhookVerificationError::SignatureMismatch
            | WebhookVerificationError::TimestampOutOfTolerance => {
                ServiceError::App(AppError::new(ErrorCode::WebhookSignatureInvalid))
            }
            WebhookVerificationError::InvalidPayload(msg) => ServiceError::App(
                AppError::with_message(ErrorCode::WebhookPayloadInvalid, msg),
            ),
            WebhookVerificationError::UnknownSession(id) => ServiceError::App(
                AppError::new(ErrorCode::WebhookSessionUnknown).with_detail("session_id", id),
            ),
            WebhookVerificationError::Store(e) => ServiceError::Repo(e),
        }
    }
}

/// What the gateway is asked to charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub amount_centavos: i64,
    pub service_fee_centavos: i64,
    pub success_url: String,
    pub target: PaymentTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCheckout {
    pub session_id: String,
    pub checkout_url: String,
}

/// Hosted checkout provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(
        &self,
        req: &CheckoutRequest,
    ) -> Result<CreatedCheckout, PaymentGatewayError>;
}

/// Fee in centavos: `amount × 100 × rate`, ties rounded to even
pub fn service_fee_centavos(amount: i64, rate: Decimal) -> i64 {
    (Decimal::from(amount) * Decimal::from(CENTAVOS_PER_PESO) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
        .unwrap_or(0)
}

/// Result of a verified webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event type that does not confirm a payment
    Ignored,
    /// Target flipped from unpaid to paid
    Paid(PaymentTarget),
    /// Target was already paid
    AlreadyPaid(PaymentTarget),
}

#[derive(Deserialize)]
struct WebhookEvent {
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    id: String,
    attributes: EventAttributes,
}

#[derive(Deserialize)]
struct EventAttributes {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<EventResource>,
}

#[derive(Deserialize)]
struct EventResource {
    id: String,
}

#[derive(Clone)]
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn Store>,
    fee_rate: Decimal,
    success_url: String,
    webhook_secret: String,
}

impl PaymentService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            gateway,
            store,
            fee_rate: config.service_fee_rate,
            success_url: config.host_url.clone(),
            webhook_secret: config.paymongo_webhook_secret.clone(),
        }
    }

    /// Start a hosted checkout for an unpaid order or reservation of `profile`
    pub async fn checkout(
        &self,
        profile: &Profile,
        target: PaymentTarget,
    ) -> ServiceResult<CheckoutResponse> {
        let (order, amount) = self.payable(profile, target).await?;
        if amount <= 0 {
            return Err(AppError::validation("Nothing to pay").into());
        }

        let service_fee = service_fee_centavos(amount, self.fee_rate);
        let request = CheckoutRequest {
            amount_centavos: amount * CENTAVOS_PER_PESO,
            service_fee_centavos: service_fee,
            success_url: self.success_url.clone(),
            target,
        };
        let created = self.gateway.create_checkout(&request).await.map_err(|e| {
            tracing::warn!(error = %e, target = target.kind(), id = target.id(), "Checkout creation failed");
            AppError::from(e)
        })?;

        self.store
            .record_checkout_session(&CheckoutSession {
                id: created.session_id.clone(),
                target,
                order_id: order.id,
                amount,
                service_fee,
                created_at: shared::util::now_millis(),
            })
            .await?;

        tracing::info!(
            session_id = %created.session_id,
            target = target.kind(),
            id = target.id(),
            amount,
            service_fee,
            "Checkout session created"
        );
        Ok(CheckoutResponse {
            checkout_url: created.checkout_url,
            amount,
            service_fee,
        })
    }

    /// Owning order and amount in pesos; rejects foreign and paid targets
    async fn payable(&self, profile: &Profile, target: PaymentTarget) -> ServiceResult<(Order, i64)> {
        match target {
            PaymentTarget::Order(id) => {
                let order = self
                    .store
                    .find_order(id)
                    .await?
                    .filter(|o| o.profile_id == profile.id)
                    .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
                // Days paid on their own are not charged again
                let amount = order.outstanding();
                if amount == 0 && order.has_payment() {
                    return Err(AppError::new(ErrorCode::OrderAlreadyPaid).into());
                }
                Ok((order, amount))
            }
            PaymentTarget::Reservation(id) => {
                let order = self
                    .store
                    .find_order_by_reservation(id)
                    .await?
                    .filter(|o| o.profile_id == profile.id)
                    .ok_or_else(|| AppError::new(ErrorCode::ReservationNotFound))?;
                let reservation = order
                    .reservation(id)
                    .ok_or_else(|| AppError::new(ErrorCode::ReservationNotFound))?;
                if order.paid || reservation.paid {
                    return Err(AppError::new(ErrorCode::OrderAlreadyPaid).into());
                }
                let amount = reservation.subtotal();
                Ok((order, amount))
            }
        }
    }

    /// Verify and apply a gateway webhook delivery.
    ///
    /// The event id is recorded only after the paid flag is applied, so a
    /// delivery that fails midway is retried in full by the gateway.
    pub async fn handle_webhook(
        &self,
        signature_header: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookVerificationError> {
        let header = signature_header.ok_or(WebhookVerificationError::MissingSignature)?;
        signature::verify_signature(
            body,
            header,
            &self.webhook_secret,
            chrono::Utc::now().timestamp(),
        )?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookVerificationError::InvalidPayload(e.to_string()))?;
        let event_id = event.data.id;
        let event_type = event.data.attributes.event_type;

        if event_type != PAID_EVENT {
            tracing::debug!(event_id = %event_id, event_type = %event_type, "Unhandled webhook event type");
            return Ok(WebhookOutcome::Ignored);
        }

        let session_id = event
            .data
            .attributes
            .data
            .map(|d| d.id)
            .ok_or_else(|| WebhookVerificationError::InvalidPayload("missing checkout session".into()))?;
        let session = self
            .store
            .find_checkout_session(&session_id)
            .await?
            .ok_or_else(|| WebhookVerificationError::UnknownSession(session_id.clone()))?;

        let changed = match session.target {
            PaymentTarget::Order(id) => self.store.mark_orders_paid(&[id]).await? > 0,
            PaymentTarget::Reservation(id) => match self.store.mark_reservation_paid(id).await {
                Ok(result) => result.changed,
                Err(RepoError::NotFound(_)) => {
                    return Err(WebhookVerificationError::UnknownSession(session_id));
                }
                Err(e) => return Err(e.into()),
            },
        };

        let first_delivery = self
            .store
            .record_webhook_event(&event_id, &event_type, shared::util::now_millis())
            .await?;
        if !first_delivery {
            tracing::info!(event_id = %event_id, "Duplicate webhook event");
        }

        let target = session.target;
        if changed {
            tracing::info!(
                event_id = %event_id,
                session_id = %session_id,
                target = target.kind(),
                id = target.id(),
                "Payment confirmed"
            );
            Ok(WebhookOutcome::Paid(target))
        } else {
            tracing::info!(session_id = %session_id, "Payment already applied");
            Ok(WebhookOutcome::AlreadyPaid(target))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeGateway, paid_event};
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::{
        CatalogStore, NewOrder, NewProfile, NewReservation, OrderStore, PaymentStore, ProfileStore,
    };
    use shared::models::{FoodCategory, FoodItemCreate, FormUpsert, Selection, Weekday};

    struct Fixture {
        service: PaymentService,
        store: Arc<MemoryStore>,
        gateway: Arc<FakeGateway>,
        profile: Profile,
        order: Order,
    }

    const SECRET: &str = "whsk_test_secret";

    async fn fixture_with(gateway: FakeGateway) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(gateway);
        let rice = store
            .create_food_item(&FoodItemCreate {
                name: "Rice Meal".into(),
                price: 60,
                category: FoodCategory::Lunch,
                image: String::new(),
            })
            .await
            .unwrap();
        let form = store
            .create_form(
                &FormUpsert {
                    category: FoodCategory::Lunch,
                    week: "2024-W01".into(),
                    active: true,
                    options: vec![],
                },
                0,
            )
            .await
            .unwrap();
        let profile = store
            .create_profile(&NewProfile {
                email: "ana@school.edu.ph".into(),
                name: "Ana".into(),
                role: None,
                department: None,
                coins: 50,
                is_admin: false,
                created_at: 0,
            })
            .await
            .unwrap();
        let day = |weekday, quantity| NewReservation {
            weekday,
            selections: vec![Selection {
                food_item_id: rice.id,
                food_item_name: rice.name.clone(),
                unit_price: 60,
                quantity,
            }],
        };
        let order = store
            .create_order(&NewOrder {
                profile_id: profile.id,
                form_id: form.id,
                name: profile.name.clone(),
                grade: String::new(),
                total: 180,
                coins_awarded: 60,
                created_at: 0,
                reservations: vec![day(Weekday::Monday, 1), day(Weekday::Tuesday, 2)],
            })
            .await
            .unwrap();
        let config = Config::for_tests("http://unused.test");
        Fixture {
            service: PaymentService::new(gateway.clone(), store.clone(), &config),
            store,
            gateway,
            profile,
            order,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(FakeGateway::default()).await
    }

    async fn deliver(
        f: &Fixture,
        event_id: &str,
        session_id: &str,
    ) -> Result<WebhookOutcome, WebhookVerificationError> {
        let body = paid_event(event_id, session_id);
        let header = signature::sign(&body, SECRET, chrono::Utc::now().timestamp(), false);
        f.service.handle_webhook(Some(&header), &body).await
    }

    #[test]
    fn test_service_fee_rounding() {
        let rate = Decimal::new(25, 3);
        assert_eq!(service_fee_centavos(100, rate), 250);
        // 2.5 → 2, 7.5 → 8
        assert_eq!(service_fee_centavos(1, rate), 2);
        assert_eq!(service_fee_centavos(3, rate), 8);
        assert_eq!(service_fee_centavos(0, rate), 0);
    }

    #[tokio::test]
    async fn test_checkout_records_session() {
        let f = fixture().await;
        let resp = f
            .service
            .checkout(&f.profile, PaymentTarget::Order(f.order.id))
            .await
            .unwrap();
        assert_eq!(resp.amount, 180);
        assert_eq!(resp.service_fee, 450);
        assert_eq!(resp.checkout_url, "https://checkout.example.test/cs_test_1");

        let sent = f.gateway.requests.lock().clone();
        assert_eq!(sent[0].amount_centavos, 18_000);
        assert_eq!(sent[0].success_url, "http://localhost:8080");

        let session = f.store.find_checkout_session("cs_test_1").await.unwrap().unwrap();
        assert_eq!(session.target, PaymentTarget::Order(f.order.id));
        assert_eq!(session.order_id, f.order.id);
    }

    #[tokio::test]
    async fn test_checkout_rejects_foreign_and_paid() {
        let f = fixture().await;
        let stranger = Profile {
            id: f.profile.id + 1,
            ..f.profile.clone()
        };
        let err: AppError = f
            .service
            .checkout(&stranger, PaymentTarget::Order(f.order.id))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::OrderNotFound);

        f.store.mark_orders_paid(&[f.order.id]).await.unwrap();
        let monday = f.order.reservations[0].id;
        let err: AppError = f
            .service
            .checkout(&f.profile, PaymentTarget::Reservation(monday))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::OrderAlreadyPaid);
        assert!(f.gateway.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_order_unpaid() {
        let f = fixture_with(FakeGateway::failing()).await;
        let err: AppError = f
            .service
            .checkout(&f.profile, PaymentTarget::Order(f.order.id))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::PaymentGatewayError);
        let order = f.store.find_order(f.order.id).await.unwrap().unwrap();
        assert!(!order.paid);
    }

    #[tokio::test]
    async fn test_webhook_is_idempotent() {
        let f = fixture().await;
        f.service
            .checkout(&f.profile, PaymentTarget::Order(f.order.id))
            .await
            .unwrap();

        let first = deliver(&f, "evt_1", "cs_test_1").await.unwrap();
        assert_eq!(first, WebhookOutcome::Paid(PaymentTarget::Order(f.order.id)));
        let order = f.store.find_order(f.order.id).await.unwrap().unwrap();
        assert!(order.paid);
        assert!(order.reservations.iter().all(|r| r.paid));

        let again = deliver(&f, "evt_1", "cs_test_1").await.unwrap();
        assert_eq!(again, WebhookOutcome::AlreadyPaid(PaymentTarget::Order(f.order.id)));
        assert_eq!(f.store.find_order(f.order.id).await.unwrap().unwrap(), order);
    }

    #[tokio::test]
    async fn test_reservation_payments_complete_order() {
        let f = fixture().await;
        let [monday, tuesday] = [f.order.reservations[0].id, f.order.reservations[1].id];
        f.service
            .checkout(&f.profile, PaymentTarget::Reservation(monday))
            .await
            .unwrap();
        f.service
            .checkout(&f.profile, PaymentTarget::Reservation(tuesday))
            .await
            .unwrap();

        deliver(&f, "evt_1", "cs_test_1").await.unwrap();
        let order = f.store.find_order(f.order.id).await.unwrap().unwrap();
        assert!(order.reservation(monday).unwrap().paid);
        assert!(!order.paid);

        deliver(&f, "evt_2", "cs_test_2").await.unwrap();
        assert!(f.store.find_order(f.order.id).await.unwrap().unwrap().paid);
    }

    #[tokio::test]
    async fn test_order_checkout_after_paid_day_charges_remainder() {
        let f = fixture().await;
        let monday = f.order.reservations[0].id;
        f.service
            .checkout(&f.profile, PaymentTarget::Reservation(monday))
            .await
            .unwrap();
        deliver(&f, "evt_1", "cs_test_1").await.unwrap();

        let resp = f
            .service
            .checkout(&f.profile, PaymentTarget::Order(f.order.id))
            .await
            .unwrap();
        assert_eq!(resp.amount, 120);
        assert_eq!(resp.service_fee, 300);
        assert_eq!(f.gateway.requests.lock()[1].amount_centavos, 12_000);

        deliver(&f, "evt_2", "cs_test_2").await.unwrap();
        let order = f.store.find_order(f.order.id).await.unwrap().unwrap();
        assert!(order.paid);
        assert!(order.reservations.iter().all(|r| r.paid));

        let err: AppError = f
            .service
            .checkout(&f.profile, PaymentTarget::Order(f.order.id))
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::OrderAlreadyPaid);
        assert_eq!(f.gateway.requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_session_changes_nothing() {
        let f = fixture().await;
        let err = deliver(&f, "evt_1", "cs_missing").await.unwrap_err();
        assert!(matches!(err, WebhookVerificationError::UnknownSession(_)));
        assert!(!f.store.find_order(f.order.id).await.unwrap().unwrap().paid);
        assert!(
            f.store
                .record_webhook_event("evt_1", PAID_EVENT, 0)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_bad_signature_changes_nothing() {
        let f = fixture().await;
        f.service
            .checkout(&f.profile, PaymentTarget::Order(f.order.id))
            .await
            .unwrap();
        let body = paid_event("evt_1", "cs_test_1");
        let header = signature::sign(&body, "wrong", chrono::Utc::now().timestamp(), false);

        let err = f.service.handle_webhook(Some(&header), &body).await.unwrap_err();
        assert!(matches!(err, WebhookVerificationError::SignatureMismatch));
        let err = f.service.handle_webhook(None, &body).await.unwrap_err();
        assert!(matches!(err, WebhookVerificationError::MissingSignature));
        assert!(!f.store.find_order(f.order.id).await.unwrap().unwrap().paid);
    }

    #[tokio::test]
    async fn test_other_event_types_ignored() {
        let f = fixture().await;
        let body = serde_json::to_vec(&serde_json::json!({
            "data": {"id": "evt_9", "attributes": {"type": "payment.failed"}}
        }))
        .unwrap();
        let header = signature::sign(&body, SECRET, chrono::Utc::now().timestamp(), true);
        let outcome = f.service.handle_webhook(Some(&header), &body).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }
}
