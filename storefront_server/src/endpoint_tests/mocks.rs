use mockall::mock;
use shop_common::Money;
use storefront_engine::db_types::OrderId;

use crate::integrations::payment_gateway::{GatewayError, PaymentGateway, PaymentIntent, RefundReceipt};

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn create_intent(&self, amount: Money, order_id: &OrderId) -> Result<PaymentIntent, GatewayError>;
        async fn refund_intent(&self, intent_id: &str) -> Result<RefundReceipt, GatewayError>;
    }
}

impl MockGateway {
    /// A gateway that must not be called at all.
    pub fn untouchable() -> Self {
        let mut gateway = MockGateway::new();
        gateway.expect_create_intent().times(0);
        gateway.expect_refund_intent().times(0);
        gateway
    }
}
