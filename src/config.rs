use std::env;

use secrecy::Secret;

use crate::services::emi::EmiProvider;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub api_prefix: String,
    pub frontend_url: String,
    pub auth_token_secret: Secret<String>,
    pub gateway: GatewayConfig,
    pub email: EmailConfig,
    pub emi_providers: Vec<EmiProvider>,
}

/// Merchant credentials and endpoints for the hosted payment page.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub merchant_key: String,
    pub merchant_salt: Secret<String>,
    pub base_url: String,
    pub success_url: String,
    pub failure_url: String,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub postmark_api_key: Option<Secret<String>>,
    pub from_email: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);
        let api_prefix = env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string());
        let callback_url = format!("http://localhost:{port}{api_prefix}/payments/verify");

        Self {
            port,
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "tourbook.db".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            auth_token_secret: Secret::new(
                env::var("AUTH_TOKEN_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            ),
            gateway: GatewayConfig {
                merchant_key: env::var("PAYU_MERCHANT_KEY").unwrap_or_default(),
                merchant_salt: Secret::new(env::var("PAYU_MERCHANT_SALT").unwrap_or_default()),
                base_url: env::var("PAYU_BASE_URL")
                    .unwrap_or_else(|_| "https://test.payu.in/_payment".to_string()),
                success_url: env::var("PAYU_SUCCESS_URL").unwrap_or_else(|_| callback_url.clone()),
                failure_url: env::var("PAYU_FAILURE_URL").unwrap_or(callback_url),
            },
            email: EmailConfig {
                postmark_api_key: env::var("POSTMARK_API_KEY")
                    .ok()
                    .filter(|k| !k.is_empty())
                    .map(Secret::new),
                from_email: env::var("POSTMARK_FROM_EMAIL")
                    .unwrap_or_else(|_| "noreply@vedictravel.com".to_string()),
            },
            emi_providers: env::var("EMI_PROVIDERS")
                .ok()
                .map(|v| parse_emi_providers(&v))
                .filter(|p| !p.is_empty())
                .unwrap_or_else(default_emi_providers),
            api_prefix,
        }
    }
}

fn default_emi_providers() -> Vec<EmiProvider> {
    vec![EmiProvider {
        name: "PayU".to_string(),
        annual_rate: 14.0,
    }]
}

/// Parses `name:rate,name:rate`. Malformed entries are skipped with a warning.
pub fn parse_emi_providers(raw: &str) -> Vec<EmiProvider> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let (name, rate) = entry.trim().split_once(':')?;
            match rate.trim().parse::<f64>() {
                Ok(annual_rate) if annual_rate >= 0.0 => Some(EmiProvider {
                    name: name.trim().to_string(),
                    annual_rate,
                }),
                _ => {
                    tracing::warn!(entry, "ignoring malformed EMI provider entry");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_emi_providers() {
        let providers = parse_emi_providers("PayU:14, HDFC:13.5");
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].name, "PayU");
        assert_eq!(providers[1].annual_rate, 13.5);
    }

    #[test]
    fn test_parse_emi_providers_skips_malformed() {
        let providers = parse_emi_providers("PayU:abc,ICICI,SBI:-1,Axis:15");
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name, "Axis");
    }
}
