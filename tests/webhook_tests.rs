mod webhook_tests {
    use databundle_backend::payments::ercaspay::{
        ErcasPayConfig, ErcasPayEnvironment, ErcasPayGateway,
    };
    use databundle_backend::payments::gateway::PaymentGateway;
    use databundle_backend::payments::types::GatewayPaymentStatus;
    use databundle_backend::services::webhook_processor::WebhookProcessorError;
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha512;

    fn gateway(webhook_secret: Option<&str>) -> ErcasPayGateway {
        ErcasPayGateway::new(ErcasPayConfig {
            environment: ErcasPayEnvironment::Sandbox,
            base_url: "https://api-staging.ercaspay.com/api/v1".to_string(),
            secret_key: "sk_test".to_string(),
            public_key: None,
            webhook_secret: webhook_secret.map(String::from),
            timeout_secs: 5,
            max_retries: 1,
        })
        .expect("gateway init")
    }

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn webhook_error_display_is_stable() {
        assert_eq!(
            WebhookProcessorError::InvalidSignature.to_string(),
            "Invalid signature"
        );
        assert_eq!(
            WebhookProcessorError::AlreadyProcessed.to_string(),
            "Already processed"
        );
        assert_eq!(
            WebhookProcessorError::PaymentNotFound("ERC-42".to_string()).to_string(),
            "Payment not found for reference ERC-42"
        );
    }

    #[test]
    fn valid_signature_is_accepted_over_exact_raw_body() {
        let gateway = gateway(Some("whsec_test"));
        let body = br#"{"transactionReference":"ERC-1","paymentStatus":"successful"}"#;

        let signature = sign(body, "whsec_test");
        assert!(gateway.verify_webhook_signature(body, Some(&signature)));

        // Any byte-level change to the body must invalidate the signature
        let tampered = br#"{"transactionReference":"ERC-1","paymentStatus":"failed"}    "#;
        assert!(!gateway.verify_webhook_signature(tampered, Some(&signature)));
    }

    #[test]
    fn signature_with_sha512_prefix_is_accepted() {
        let gateway = gateway(Some("whsec_test"));
        let body = br#"{"transactionReference":"ERC-2","paymentStatus":"successful"}"#;
        let signature = format!("sha512={}", sign(body, "whsec_test"));
        assert!(gateway.verify_webhook_signature(body, Some(&signature)));
    }

    #[test]
    fn missing_secret_skips_verification() {
        let gateway = gateway(None);
        let body = br#"{"transactionReference":"ERC-3"}"#;
        assert!(gateway.verify_webhook_signature(body, None));
        assert!(gateway.verify_webhook_signature(body, Some("whatever")));
    }

    #[test]
    fn payload_parsing_handles_field_name_variants() {
        let gateway = gateway(Some("whsec_test"));

        // camelCase, as the gateway documents
        let camel = json!({
            "transactionReference": "ERC-100",
            "paymentReference": "PAY_abc_1",
            "paymentStatus": "successful",
            "paymentMethod": "card",
            "amount": 1498.00,
            "currency": "NGN"
        });
        let parsed = gateway.parse_webhook_payload(&camel).unwrap();
        assert_eq!(parsed.transaction_reference, "ERC-100");
        assert_eq!(parsed.payment_status, GatewayPaymentStatus::Successful);
        assert_eq!(parsed.payment_method.as_deref(), Some("card"));

        // snake_case fallbacks the gateway has been observed sending
        let snake = json!({
            "reference": "ERC-101",
            "payment_reference": "PAY_abc_2",
            "status": "failed",
            "payment_method": "bank-transfer"
        });
        let parsed = gateway.parse_webhook_payload(&snake).unwrap();
        assert_eq!(parsed.transaction_reference, "ERC-101");
        assert_eq!(parsed.payment_status, GatewayPaymentStatus::Failed);
    }

    #[test]
    fn payload_without_reference_is_rejected() {
        let gateway = gateway(Some("whsec_test"));
        let payload = json!({"paymentStatus": "successful"});
        assert!(gateway.parse_webhook_payload(&payload).is_err());
    }

    #[test]
    fn unfinal_statuses_parse_as_pending_or_unknown() {
        assert_eq!(
            GatewayPaymentStatus::parse("pending"),
            GatewayPaymentStatus::Pending
        );
        assert_eq!(
            GatewayPaymentStatus::parse("initiated"),
            GatewayPaymentStatus::Pending
        );
        assert_eq!(
            GatewayPaymentStatus::parse("abandoned"),
            GatewayPaymentStatus::Unknown
        );
    }
}
