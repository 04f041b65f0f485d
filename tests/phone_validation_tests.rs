mod phone_validation_tests {
    use databundle_backend::validation::{
        detect_network, normalize_phone, validate_phone, Network, PhoneValidationError,
    };

    #[test]
    fn mtn_number_is_accepted_for_mtn() {
        let result = validate_phone("08031234567", Network::Mtn).expect("valid MTN number");
        assert_eq!(result.normalized, "08031234567");
        assert_eq!(result.network, Network::Mtn);
    }

    #[test]
    fn mtn_number_is_rejected_for_airtel_naming_detected_network() {
        let err = validate_phone("08031234567", Network::Airtel).unwrap_err();
        match err {
            PhoneValidationError::NetworkMismatch { detected, selected } => {
                assert_eq!(detected, "MTN");
                assert_eq!(selected, "Airtel");
            }
            other => panic!("expected NetworkMismatch, got {other:?}"),
        }
    }

    #[test]
    fn international_formats_normalize_before_prefix_detection() {
        for input in ["+2348031234567", "2348031234567", "0803 123 4567"] {
            let result = validate_phone(input, Network::Mtn).expect("valid input");
            assert_eq!(result.normalized, "08031234567");
        }
    }

    #[test]
    fn every_network_accepts_each_of_its_prefixes() {
        for network in Network::ALL {
            for prefix in network.prefixes() {
                let phone = format!("{}1234567", prefix);
                let result = validate_phone(&phone, network)
                    .unwrap_or_else(|e| panic!("{phone} should be valid for {network}: {e}"));
                assert_eq!(result.network, network);
            }
        }
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        let err = validate_phone("07001234567", Network::Mtn).unwrap_err();
        assert!(matches!(err, PhoneValidationError::UnknownPrefix { .. }));
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        assert!(validate_phone("0803123456", Network::Mtn).is_err());
        assert!(validate_phone("080312345678", Network::Mtn).is_err());
        assert!(validate_phone("", Network::Mtn).is_err());
    }

    #[test]
    fn normalization_is_digit_only() {
        assert_eq!(
            normalize_phone("(0803) 123-4567").as_deref(),
            Some("08031234567")
        );
    }

    #[test]
    fn detection_without_selection_finds_owner_network() {
        assert_eq!(detect_network("09091234567"), Some(Network::NineMobile));
        assert_eq!(detect_network("09011234567"), Some(Network::Airtel));
        assert_eq!(detect_network("09051234567"), Some(Network::Glo));
    }
}
