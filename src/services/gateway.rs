//! Hosted-checkout gateway adapter.
//!
//! Outbound, the browser is handed a signed form to post to the gateway.
//! Inbound, the gateway posts the verdict back with its own signature.
//! Both signatures are SHA-512 over pipe-joined fields bracketed by the
//! merchant key and the shared salt, which never leaves this process.

use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::config::GatewayConfig;
use crate::errors::AppError;
use crate::models::{Booking, GatewayCallback, PaymentInitiation, PaymentRequest};

/// Who the gateway shows as paying.
#[derive(Debug, Clone, Default)]
pub struct Payer {
    pub first_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Clone)]
pub struct PayuGateway {
    config: GatewayConfig,
}

impl PayuGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.merchant_key.is_empty() && !self.config.merchant_salt.expose_secret().is_empty()
    }

    /// `key|txnid|amount|productinfo|firstname|email|udf1..udf5|<5 empty>|salt`
    pub fn request_signature(&self, req: &PaymentRequest) -> String {
        let salt = self.config.merchant_salt.expose_secret();
        let fields: [&str; 17] = [
            &self.config.merchant_key,
            &req.txnid,
            &req.amount,
            &req.productinfo,
            &req.firstname,
            &req.email,
            &req.udf1,
            &req.udf2,
            &req.udf3,
            &req.udf4,
            &req.udf5,
            "",
            "",
            "",
            "",
            "",
            salt,
        ];
        sha512_hex(&fields.join("|"))
    }

    /// `salt|status|<5 empty>|udf5..udf1|email|firstname|productinfo|amount|txnid|key`
    pub fn response_signature(&self, cb: &GatewayCallback) -> String {
        let salt = self.config.merchant_salt.expose_secret();
        let fields: [&str; 18] = [
            salt,
            &cb.status,
            "",
            "",
            "",
            "",
            "",
            &cb.udf5,
            &cb.udf4,
            &cb.udf3,
            &cb.udf2,
            &cb.udf1,
            &cb.email,
            &cb.firstname,
            &cb.productinfo,
            &cb.amount,
            &cb.txnid,
            &self.config.merchant_key,
        ];
        sha512_hex(&fields.join("|"))
    }

    /// Rejects any callback whose signature does not match byte for byte.
    pub fn verify_callback(&self, cb: &GatewayCallback) -> Result<(), AppError> {
        let expected = self.response_signature(cb);
        let received = cb.hash.trim().to_ascii_lowercase();

        if bool::from(expected.as_bytes().ct_eq(received.as_bytes())) {
            Ok(())
        } else {
            tracing::warn!(
                txn_id = %cb.txnid,
                booking_id = %cb.booking_id(),
                status = %cb.status,
                "gateway callback signature mismatch"
            );
            Err(AppError::Security("invalid payment signature".to_string()))
        }
    }

    /// Builds the signed form for a booking that already has a transaction id.
    pub fn payment_request(
        &self,
        booking: &Booking,
        payer: &Payer,
        txn_id: &str,
    ) -> PaymentInitiation {
        let mut request = PaymentRequest {
            key: self.config.merchant_key.clone(),
            txnid: txn_id.to_string(),
            amount: format_amount(booking.total_amount),
            productinfo: format!("Tour Booking - {}", booking.booking_reference),
            firstname: payer.first_name.clone(),
            email: payer.email.clone(),
            phone: payer.phone.clone(),
            surl: self.config.success_url.clone(),
            furl: self.config.failure_url.clone(),
            hash: String::new(),
            udf1: booking.id.clone(),
            udf2: String::new(),
            udf3: String::new(),
            udf4: String::new(),
            udf5: String::new(),
        };
        request.hash = self.request_signature(&request);

        PaymentInitiation {
            payment_url: self.config.base_url.clone(),
            payment_data: request,
        }
    }
}

/// Amount as the gateway expects it: always two decimal places.
pub fn format_amount(amount: Decimal) -> String {
    let mut value = amount.round_dp(2);
    value.rescale(2);
    value.to_string()
}

fn sha512_hex(input: &str) -> String {
    hex::encode(Sha512::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use secrecy::Secret;

    use crate::models::{BookingStatus, PaymentStatus};

    const REQUEST_HASH: &str = "8567e46b0809352cccb713857a112d95c5a699d7b7bba3576b83adc3ff2bd92fe86eec4cbb8b094c10f53239a47b4e4a5fe132cd8a97ec3126f805469aa93ec1";
    const RESPONSE_HASH: &str = "94710bf398c24ecdc28b65f068eda67902ff0c456dc737929204cb2360d86489d80b1e84fcc70542a8cdacc1e5b22e5a0c0d04c5b0a39e9e51487c787d0afe38";

    fn gateway() -> PayuGateway {
        PayuGateway::new(GatewayConfig {
            merchant_key: "gtKFFx".to_string(),
            merchant_salt: Secret::new("eCwWELxi".to_string()),
            base_url: "https://test.payu.in/_payment".to_string(),
            success_url: "http://localhost:5000/api/v1/payments/verify".to_string(),
            failure_url: "http://localhost:5000/api/v1/payments/verify".to_string(),
        })
    }

    fn booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: "b-1".to_string(),
            booking_reference: "VT1".to_string(),
            owner_id: None,
            product_id: "tour-1".to_string(),
            number_of_travelers: 2,
            travel_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            total_amount: Decimal::from(20000),
            traveler_details: vec![],
            special_requests: None,
            email: Some("asha@example.com".to_string()),
            phone: None,
            is_guest: true,
            booking_status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            gateway_txn_id: None,
            gateway_payment_id: None,
            cancelled_at: None,
            cancellation_reason: None,
            cart_line_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn payer() -> Payer {
        Payer {
            first_name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9999999999".to_string(),
        }
    }

    fn success_callback() -> GatewayCallback {
        GatewayCallback {
            status: "success".to_string(),
            txnid: "TXN1700000000000ABC1234".to_string(),
            amount: "20000.00".to_string(),
            productinfo: "Tour Booking - VT1".to_string(),
            firstname: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            mihpayid: "403993715521937565".to_string(),
            udf1: "b-1".to_string(),
            hash: RESPONSE_HASH.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_payment_request_fields_and_signature() {
        let init = gateway().payment_request(&booking(), &payer(), "TXN1700000000000ABC1234");
        let data = &init.payment_data;
        assert_eq!(init.payment_url, "https://test.payu.in/_payment");
        assert_eq!(data.amount, "20000.00");
        assert_eq!(data.productinfo, "Tour Booking - VT1");
        assert_eq!(data.udf1, "b-1");
        assert_eq!(data.hash, REQUEST_HASH);
    }

    #[test]
    fn test_amount_has_two_decimals() {
        let mut b = booking();
        b.total_amount = Decimal::new(123455, 1);
        let init = gateway().payment_request(&b, &payer(), "TXN1");
        assert_eq!(init.payment_data.amount, "12345.50");
    }

    #[test]
    fn test_callback_with_valid_signature_is_accepted() {
        assert!(gateway().verify_callback(&success_callback()).is_ok());

        let mut upper = success_callback();
        upper.hash = RESPONSE_HASH.to_uppercase();
        assert!(gateway().verify_callback(&upper).is_ok());
    }

    #[test]
    fn test_single_flipped_byte_is_rejected() {
        let mut forged = success_callback();
        let mut bytes = forged.hash.into_bytes();
        bytes[10] = if bytes[10] == b'0' { b'1' } else { b'0' };
        forged.hash = String::from_utf8(bytes).unwrap();

        let err = gateway().verify_callback(&forged).unwrap_err();
        assert!(matches!(err, AppError::Security(ref m) if m == "invalid payment signature"));
    }

    #[test]
    fn test_tampered_field_is_rejected() {
        let mut forged = success_callback();
        forged.amount = "1.00".to_string();
        assert!(gateway().verify_callback(&forged).is_err());

        let mut flipped = success_callback();
        flipped.status = "failure".to_string();
        assert!(gateway().verify_callback(&flipped).is_err());
    }

    #[test]
    fn test_missing_hash_is_rejected() {
        let mut cb = success_callback();
        cb.hash.clear();
        assert!(gateway().verify_callback(&cb).is_err());
    }
}
