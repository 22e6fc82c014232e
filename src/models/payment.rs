use serde::{Deserialize, Serialize};

/// Form fields posted by the browser to the gateway's hosted payment page.
/// Field names follow the gateway's wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRequest {
    pub key: String,
    pub txnid: String,
    pub amount: String,
    pub productinfo: String,
    pub firstname: String,
    pub email: String,
    pub phone: String,
    pub surl: String,
    pub furl: String,
    pub hash: String,
    /// Carries the booking id through the gateway and back in the callback.
    pub udf1: String,
    pub udf2: String,
    pub udf3: String,
    pub udf4: String,
    pub udf5: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    pub payment_url: String,
    pub payment_data: PaymentRequest,
}

/// Callback payload sent by the gateway after the payer leaves the hosted page.
///
/// The gateway posts many more fields than these (bank reference, mode,
/// card hints); anything not covered by the response signature is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayCallback {
    pub status: String,
    pub txnid: String,
    pub amount: String,
    pub productinfo: String,
    pub firstname: String,
    pub email: String,
    pub phone: String,
    pub mihpayid: String,
    pub udf1: String,
    pub udf2: String,
    pub udf3: String,
    pub udf4: String,
    pub udf5: String,
    pub hash: String,
}

impl GatewayCallback {
    pub fn booking_id(&self) -> &str {
        &self.udf1
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub success: bool,
    pub booking_id: String,
    pub transaction_id: String,
    pub gateway_payment_id: String,
}
