#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kolo::app_state::AppState;
use kolo::clients::{GatewayReceipt, NotificationDispatcher, NotificationEvent, PaymentGateway};
use kolo::config::{AppConfig, GatewayInfo, PinPolicy, RetryPolicy, SpendCaps};
use kolo::error::PaymentError;
use kolo::models::{GatewayStatus, PaymentMethod, PayoutDestination};
use secrecy::SecretString;
use uuid::Uuid;

pub mod fixtures;

/// Configuration with small, predictable limits for tests.
pub fn test_config() -> AppConfig {
    AppConfig {
        pin: PinPolicy {
            pepper: SecretString::new("test-pepper".into()),
            hash_iterations: 10_000,
            token_ttl_secs: 120,
        },
        caps: SpendCaps {
            per_transaction: 1_000_000,
            daily_outflow: 5_000_000,
        },
        retry: RetryPolicy {
            base_delay_secs: 1,
            max_delay_secs: 4,
            max_attempts: 5,
        },
        savings_settlement_delay_minutes: 0,
        withdrawal_fee_minor: 0,
        gateway: GatewayInfo {
            api_url: "http://127.0.0.1:9".into(),
            secret_key: SecretString::new("sk_test_paygate".into()),
            timeout_secs: 5,
        },
    }
}

#[derive(Debug, Clone)]
pub enum GatewayCall {
    Charge {
        reference: Uuid,
        amount: i64,
        method: PaymentMethod,
    },
    Payout {
        reference: Uuid,
        amount: i64,
        bank_code: String,
    },
}

/// Gateway double driven by a queue of scripted outcomes. Every call pops
/// the front of the script; calling past the end is a test bug and panics.
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<GatewayReceipt, PaymentError>>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push_approved(&self, external_id: &str) {
        self.script.lock().unwrap().push_back(Ok(GatewayReceipt {
            status: GatewayStatus::Approved,
            external_id: Some(external_id.to_string()),
            message: None,
        }));
    }

    pub fn push_rejected(&self, message: &str) {
        self.script.lock().unwrap().push_back(Ok(GatewayReceipt {
            status: GatewayStatus::Rejected,
            external_id: None,
            message: Some(message.to_string()),
        }));
    }

    pub fn push_transient(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(PaymentError::GatewayTransient(message.to_string())));
    }

    /// Everything the engine has asked the gateway to do, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_outcome(&self) -> Result<GatewayReceipt, PaymentError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("gateway called with no scripted outcome left")
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn charge(
        &self,
        reference: Uuid,
        amount: i64,
        method: PaymentMethod,
    ) -> Result<GatewayReceipt, PaymentError> {
        self.calls.lock().unwrap().push(GatewayCall::Charge {
            reference,
            amount,
            method,
        });
        self.next_outcome()
    }

    async fn payout(
        &self,
        reference: Uuid,
        amount: i64,
        destination: &PayoutDestination,
    ) -> Result<GatewayReceipt, PaymentError> {
        self.calls.lock().unwrap().push(GatewayCall::Payout {
            reference,
            amount,
            bank_code: destination.bank_code.clone(),
        });
        self.next_outcome()
    }
}

/// Notifier double that records every event it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Uuid, NotificationEvent)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(Uuid, NotificationEvent)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn dispatch(&self, user_id: Uuid, event: NotificationEvent) {
        self.events.lock().unwrap().push((user_id, event));
    }
}

/// Application state wired to scripted doubles, plus handles to the doubles.
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

/// Create a test AppState with default test configuration.
pub fn create_test_app_state() -> TestHarness {
    create_test_app_state_with(test_config())
}

pub fn create_test_app_state_with(config: AppConfig) -> TestHarness {
    let gateway = ScriptedGateway::new();
    let notifier = RecordingNotifier::new();
    let state = AppState::new(config, gateway.clone(), notifier.clone());
    TestHarness {
        state,
        gateway,
        notifier,
    }
}
