// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::{GslbConfig, GslbConfigSpec, NameserverSpec, ProbeProtocol, RecordSpec, TargetSpec};
    use crate::gslb_errors::ValidationError;
    use crate::store::{validate_config, ObjectId, SpecStore};

    fn target(address: &str) -> TargetSpec {
        TargetSpec {
            address: address.to_string(),
            location: String::new(),
            weight: 1,
            protocol: ProbeProtocol::Tcp,
            port: 6379,
            path: "/".to_string(),
        }
    }

    fn config(namespace: &str, name: &str, domain: &str) -> GslbConfig {
        let spec = GslbConfigSpec {
            domain: domain.to_string(),
            nameservers: vec![NameserverSpec {
                hostname: format!("ns1.{domain}"),
                address: "10.0.0.53".to_string(),
            }],
            records: vec![RecordSpec {
                name: "app".to_string(),
                targets: vec![target("10.0.0.1")],
            }],
        };
        let mut obj = GslbConfig::new(name, spec);
        obj.metadata.namespace = Some(namespace.to_string());
        obj
    }

    #[test]
    fn test_validate_accepts_well_formed_config() {
        let obj = config("default", "app", "cloud.example.com");
        let validated = validate_config(&obj).unwrap();

        assert_eq!(validated.domain, "cloud.example.com");
        assert_eq!(validated.id.to_string(), "default/app");
        assert_eq!(validated.nameservers.len(), 1);
        assert_eq!(validated.records.len(), 1);
        assert_eq!(validated.records[0].targets[0].address.to_string(), "10.0.0.1");
    }

    #[test]
    fn test_validate_normalizes_domain_and_location() {
        let mut obj = config("default", "app", "Cloud.Example.COM.");
        obj.spec.records[0].targets[0].location = "de".to_string();

        let validated = validate_config(&obj).unwrap();
        assert_eq!(validated.domain, "cloud.example.com");
        assert_eq!(validated.records[0].targets[0].location, "DE");
    }

    #[test]
    fn test_validate_rejects_single_label_domain() {
        let obj = config("default", "app", "localhost");
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_missing_namespace() {
        let spec = config("default", "app", "cloud.example.com").spec;
        let obj = GslbConfig::new("app", spec);
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::UnnamedObject)
        ));
    }

    #[test]
    fn test_validate_rejects_empty_nameservers() {
        let mut obj = config("default", "app", "cloud.example.com");
        obj.spec.nameservers.clear();
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::NoNameservers { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_record_names() {
        let mut obj = config("default", "app", "cloud.example.com");
        obj.spec.records.push(RecordSpec {
            name: "app".to_string(),
            targets: vec![target("10.0.0.2")],
        });
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::DuplicateRecordName { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_multi_label_record_name() {
        let mut obj = config("default", "app", "cloud.example.com");
        obj.spec.records[0].name = "app.prod".to_string();
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::InvalidRecordName { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_apex_record() {
        let mut obj = config("default", "app", "cloud.example.com");
        obj.spec.records[0].name = "@".to_string();
        let validated = validate_config(&obj).unwrap();
        assert_eq!(validated.records[0].name, "@");
    }

    #[test]
    fn test_validate_rejects_malformed_address() {
        let mut obj = config("default", "app", "cloud.example.com");
        obj.spec.records[0].targets[0].address = "10.0.0.256".to_string();
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_port_zero() {
        let mut obj = config("default", "app", "cloud.example.com");
        obj.spec.records[0].targets[0].port = 0;
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::InvalidPort { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_weight_zero() {
        let mut obj = config("default", "app", "cloud.example.com");
        obj.spec.records[0].targets[0].weight = 0;
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_relative_probe_path() {
        let mut obj = config("default", "app", "cloud.example.com");
        obj.spec.records[0].targets[0].path = "healthz".to_string();
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_location() {
        let mut obj = config("default", "app", "cloud.example.com");
        obj.spec.records[0].targets[0].location = "EUROPE".to_string();
        assert!(matches!(
            validate_config(&obj),
            Err(ValidationError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn test_apply_and_snapshot() {
        let store = SpecStore::new();
        store.apply(&config("default", "app", "cloud.example.com")).unwrap();
        store.apply(&config("default", "web", "web.example.com")).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        // Snapshot is ordered by object identity.
        assert_eq!(snapshot[0].id.name, "app");
        assert_eq!(snapshot[1].id.name, "web");
    }

    #[test]
    fn test_apply_replaces_same_object() {
        let store = SpecStore::new();
        store.apply(&config("default", "app", "cloud.example.com")).unwrap();

        let mut updated = config("default", "app", "cloud.example.com");
        updated.spec.records[0].targets[0].address = "10.0.0.9".to_string();
        store.apply(&updated).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot[0].records[0].targets[0].address.to_string(),
            "10.0.0.9"
        );
    }

    #[test]
    fn test_domain_collision_first_seen_wins() {
        let store = SpecStore::new();
        store.apply(&config("default", "first", "cloud.example.com")).unwrap();

        let err = store
            .apply(&config("default", "second", "cloud.example.com"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::DomainAlreadyClaimed { .. }));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id.name, "first");
    }

    #[test]
    fn test_domain_claim_released_on_remove() {
        let store = SpecStore::new();
        store.apply(&config("default", "first", "cloud.example.com")).unwrap();
        assert!(store.remove(&ObjectId {
            namespace: "default".to_string(),
            name: "first".to_string(),
        }));

        // The domain is free again.
        store.apply(&config("default", "second", "cloud.example.com")).unwrap();
        assert_eq!(store.snapshot()[0].id.name, "second");
    }

    #[test]
    fn test_domain_claim_released_on_domain_change() {
        let store = SpecStore::new();
        store.apply(&config("default", "app", "cloud.example.com")).unwrap();
        store.apply(&config("default", "app", "other.example.com")).unwrap();

        // The old domain is free for another object.
        store.apply(&config("default", "web", "cloud.example.com")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_absent_object() {
        let store = SpecStore::new();
        assert!(!store.remove(&ObjectId {
            namespace: "default".to_string(),
            name: "ghost".to_string(),
        }));
    }

    #[test]
    fn test_replace_all_swaps_contents_atomically() {
        let store = SpecStore::new();
        store.apply(&config("default", "stale", "stale.example.com")).unwrap();

        let rejected = store.replace_all(&[
            config("default", "app", "cloud.example.com"),
            config("default", "web", "web.example.com"),
        ]);

        assert!(rejected.is_empty());
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|c| c.id.name != "stale"));
    }

    #[test]
    fn test_replace_all_reports_rejections_without_blocking_batch() {
        let store = SpecStore::new();
        let mut bad = config("default", "bad", "bad.example.com");
        bad.spec.records[0].targets[0].port = 0;

        let rejected = store.replace_all(&[
            config("default", "app", "cloud.example.com"),
            bad,
            config("default", "web", "web.example.com"),
        ]);

        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, "default/bad");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_replace_all_first_seen_wins_within_batch() {
        let store = SpecStore::new();
        let rejected = store.replace_all(&[
            config("default", "first", "cloud.example.com"),
            config("default", "second", "cloud.example.com"),
        ]);

        assert_eq!(rejected.len(), 1);
        assert!(matches!(
            rejected[0].1,
            ValidationError::DomainAlreadyClaimed { .. }
        ));
        assert_eq!(store.snapshot()[0].id.name, "first");
    }
}
