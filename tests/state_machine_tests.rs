mod state_machine_tests {
    use databundle_backend::services::data_purchase::TransactionStatus;
    use std::str::FromStr;

    #[test]
    fn payment_confirmation_paths_from_pending() {
        let from_pending = TransactionStatus::Pending.valid_transitions();
        assert!(from_pending.contains(&TransactionStatus::PaymentCompleted));
        assert!(from_pending.contains(&TransactionStatus::PaymentFailed));
        // Synchronous purchase-data may drive a pending transaction straight
        // into processing
        assert!(from_pending.contains(&TransactionStatus::Processing));
    }

    #[test]
    fn delivery_path_is_processing_then_outcome() {
        assert_eq!(
            TransactionStatus::PaymentCompleted.valid_transitions(),
            vec![TransactionStatus::Processing]
        );
        let outcomes = TransactionStatus::Processing.valid_transitions();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.contains(&TransactionStatus::Completed));
        assert!(outcomes.contains(&TransactionStatus::Failed));
    }

    #[test]
    fn completed_is_terminal_and_unretryable() {
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Completed.valid_transitions().is_empty());
        assert!(!TransactionStatus::Completed.allows_retry());
        assert!(!TransactionStatus::Completed.allows_delivery());
    }

    #[test]
    fn failed_is_recoverable_via_payment_completed_reset() {
        assert!(!TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Failed.allows_retry());
        assert_eq!(
            TransactionStatus::Failed.valid_transitions(),
            vec![TransactionStatus::PaymentCompleted]
        );
    }

    #[test]
    fn payment_failed_is_a_dead_end_without_new_payment() {
        assert!(TransactionStatus::PaymentFailed.valid_transitions().is_empty());
        assert!(!TransactionStatus::PaymentFailed.allows_retry());
        assert!(!TransactionStatus::PaymentFailed.allows_delivery());
    }

    #[test]
    fn retry_sources_are_exactly_failed_and_payment_completed() {
        let retryable: Vec<_> = [
            TransactionStatus::Pending,
            TransactionStatus::PaymentCompleted,
            TransactionStatus::PaymentFailed,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ]
        .into_iter()
        .filter(|s| s.allows_retry())
        .collect();

        assert_eq!(
            retryable,
            vec![TransactionStatus::PaymentCompleted, TransactionStatus::Failed]
        );
    }

    #[test]
    fn every_status_round_trips_through_its_db_string() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::PaymentCompleted,
            TransactionStatus::PaymentFailed,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            let parsed = TransactionStatus::from_str(status.as_str());
            assert_eq!(parsed, Ok(status));
        }
    }

    #[test]
    fn unknown_db_strings_do_not_parse() {
        assert!(TransactionStatus::from_str("refunded").is_err());
        assert!(TransactionStatus::from_str("").is_err());
    }
}
