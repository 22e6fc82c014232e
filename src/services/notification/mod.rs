pub mod postmark;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{Booking, Product};

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Confirmation mail sent once a booking's payment succeeds.
pub fn booking_confirmation(
    to: &str,
    name: &str,
    booking: &Booking,
    product: &Product,
    frontend_url: &str,
) -> EmailMessage {
    let reference = &booking.booking_reference;
    let travel_date = booking.travel_date.format("%d %b %Y").to_string();
    let amount = format_inr(booking.total_amount);
    let travelers = booking.number_of_travelers;
    let title = &product.title;

    let text_body = format!(
        "Dear {name},\n\n\
         Your booking is confirmed!\n\n\
         Booking Reference: {reference}\n\
         Tour: {title}\n\
         Travel Date: {travel_date}\n\
         Travellers: {travelers}\n\
         Total Amount: \u{20b9}{amount}\n\n\
         Thank you for booking with VedicTravel. We look forward to being a part of your spiritual journey.\n\n\
         Best regards,\nVedicTravel Team"
    );

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; background-color: #FFF8F3; margin: 0;">
  <div style="max-width: 600px; margin: 0 auto; background: #fff;">
    <div style="background: #FF5722; color: #fff; padding: 30px; text-align: center;">
      <h1>Booking Confirmed!</h1>
      <p>Your sacred journey is officially booked</p>
    </div>
    <div style="padding: 40px 30px;">
      <p><strong>Namaste, {name}!</strong></p>
      <p>We're thrilled to confirm your booking with VedicTravel. Here are your details:</p>
      <p style="font-size: 24px; font-family: monospace; color: #FF5722;">{reference}</p>
      <table style="width: 100%; border-collapse: collapse;">
        <tr><td>Tour / Yatra</td><td>{title}</td></tr>
        <tr><td>Travel Date</td><td>{travel_date}</td></tr>
        <tr><td>Travellers</td><td>{travelers} Person(s)</td></tr>
        <tr><td>Total Paid</td><td>&#8377;{amount}</td></tr>
      </table>
      <p>Our team will contact you within 24 hours with your travel itinerary and further details.</p>
      <p><a href="{frontend_url}/bookings">View My Booking</a></p>
    </div>
  </div>
</body>
</html>"#,
        name = html_escape(name),
        title = html_escape(title),
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Booking Confirmed - {reference} | VedicTravel"),
        html_body,
        text_body,
    }
}

/// Indian digit grouping: `1,07,745` and `12,345.50`.
pub fn format_inr(amount: Decimal) -> String {
    let amount = amount.round_dp(2);
    let whole = amount.trunc().abs().to_string();
    let fraction = amount.fract().abs();

    let grouped = if whole.len() <= 3 {
        whole
    } else {
        let (head, last3) = whole.split_at(whole.len() - 3);
        let mut parts: Vec<&str> = Vec::new();
        let mut rest = head;
        while rest.len() > 2 {
            let (left, right) = rest.split_at(rest.len() - 2);
            parts.push(right);
            rest = left;
        }
        parts.push(rest);
        parts.reverse();
        format!("{},{}", parts.join(","), last3)
    };

    let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };
    if fraction.is_zero() {
        format!("{sign}{grouped}")
    } else {
        let mut cents = fraction;
        cents.rescale(2);
        // "0.50" -> ".50"
        let cents = cents.to_string();
        format!("{sign}{grouped}{}", cents.trim_start_matches('0'))
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
