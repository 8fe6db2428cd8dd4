// Copyright (c) 2025 Cyberun, cyberun.cloud
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::ProbeProtocol;
    use crate::health::{HealthSnapshot, HealthTable, TargetKey};
    use crate::store::{
        ObjectId, ValidatedConfig, ValidatedNameserver, ValidatedRecord, ValidatedTarget,
    };
    use crate::synth::{parse_soa_serial, Generation, SynthSettings, ZoneSynthesizer};
    use chrono::Utc;
    use std::sync::Arc;

    fn target(address: &str, location: &str, weight: u32) -> ValidatedTarget {
        ValidatedTarget {
            address: address.parse().unwrap(),
            location: location.to_string(),
            weight,
            protocol: ProbeProtocol::Tcp,
            port: 80,
            path: "/".to_string(),
        }
    }

    fn config(
        name: &str,
        domain: &str,
        records: Vec<(&str, Vec<ValidatedTarget>)>,
    ) -> Arc<ValidatedConfig> {
        Arc::new(ValidatedConfig {
            id: ObjectId {
                namespace: "default".to_string(),
                name: name.to_string(),
            },
            domain: domain.to_string(),
            nameservers: vec![ValidatedNameserver {
                hostname: format!("ns1.{domain}"),
                address: "10.0.0.53".parse().unwrap(),
            }],
            records: records
                .into_iter()
                .map(|(record_name, targets)| ValidatedRecord {
                    name: record_name.to_string(),
                    targets,
                })
                .collect(),
        })
    }

    /// Health snapshot with every target up except the listed
    /// `(config-name, record-index, target-index)` exceptions, which stay
    /// unprobed (unknown).
    fn snapshot_with_down(
        specs: &[Arc<ValidatedConfig>],
        down: &[(&str, usize, usize)],
    ) -> HealthSnapshot {
        let mut table = HealthTable::new();
        table.sync_targets(specs);
        let now = Utc::now();
        for spec in specs {
            for (record_index, record) in spec.records.iter().enumerate() {
                for target_index in 0..record.targets.len() {
                    if down
                        .iter()
                        .any(|(name, r, t)| {
                            *name == spec.id.name && *r == record_index && *t == target_index
                        })
                    {
                        continue;
                    }
                    table.record_success(
                        &TargetKey {
                            object: spec.id.clone(),
                            record: record_index,
                            target: target_index,
                        },
                        now,
                    );
                }
            }
        }
        table.snapshot()
    }

    fn all_up(specs: &[Arc<ValidatedConfig>]) -> HealthSnapshot {
        snapshot_with_down(specs, &[])
    }

    fn settings() -> SynthSettings {
        SynthSettings {
            record_ttl: 10,
            geoip_views: true,
            geoip_db_path: "/data/GeoLite2-City.mmdb".to_string(),
            zone_path_prefix: "/etc/coredns/current".to_string(),
            dns_port: 53,
        }
    }

    fn a_lines<'a>(zone: &'a str, name: &str) -> Vec<&'a str> {
        zone.lines()
            .filter(|line| line.starts_with(&format!("{name}\t")) && line.contains("\tA\t"))
            .collect()
    }

    #[test]
    fn test_healthy_fanout_splits_views() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![(
                "app",
                vec![
                    target("8.8.8.8", "XX", 1),
                    target("10.0.0.1", "", 1),
                    target("10.0.0.2", "", 1),
                ],
            )],
        );
        let specs = vec![spec];
        let generation = ZoneSynthesizer::new().synthesize(&specs, &all_up(&specs), &settings());

        let default_zone = &generation.files["cloud.example.com.default.zone"];
        assert!(default_zone.contains("app\t10\tIN\tA\t10.0.0.1"));
        assert!(default_zone.contains("app\t10\tIN\tA\t10.0.0.2"));
        assert!(!default_zone.contains("8.8.8.8"));

        let xx_zone = &generation.files["cloud.example.com.XX.zone"];
        assert!(xx_zone.contains("app\t10\tIN\tA\t8.8.8.8"));
        assert!(!xx_zone.contains("10.0.0.1"));
        assert!(!xx_zone.contains("10.0.0.2"));
    }

    #[test]
    fn test_down_and_unknown_targets_are_excluded() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![(
                "app",
                vec![target("10.0.0.1", "", 1), target("10.0.0.2", "", 1)],
            )],
        );
        let specs = vec![spec];
        let health = snapshot_with_down(&specs, &[("app", 0, 0)]);

        let generation = ZoneSynthesizer::new().synthesize(&specs, &health, &settings());
        let default_zone = &generation.files["cloud.example.com.default.zone"];
        assert!(!default_zone.contains("10.0.0.1"));
        assert!(default_zone.contains("app\t10\tIN\tA\t10.0.0.2"));
    }

    #[test]
    fn test_region_with_no_pool_falls_back_to_default() {
        // One record has a US pool, the other only a default pool. The US
        // view must fall back to the default pool for the second record.
        let spec = config(
            "app",
            "cloud.example.com",
            vec![
                ("api", vec![target("10.1.0.1", "US", 1)]),
                ("web", vec![target("10.2.0.1", "", 1)]),
            ],
        );
        let specs = vec![spec];
        let generation = ZoneSynthesizer::new().synthesize(&specs, &all_up(&specs), &settings());

        // No JP pool exists anywhere, so no JP view is emitted at all.
        assert!(generation.files.get("cloud.example.com.JP.zone").is_none());

        let us_zone = &generation.files["cloud.example.com.US.zone"];
        assert!(us_zone.contains("api\t10\tIN\tA\t10.1.0.1"));
        assert!(us_zone.contains("web\t10\tIN\tA\t10.2.0.1"));

        let default_zone = &generation.files["cloud.example.com.default.zone"];
        assert!(!default_zone.contains("10.1.0.1"));
        assert!(default_zone.contains("web\t10\tIN\tA\t10.2.0.1"));
    }

    #[test]
    fn test_country_pool_excludes_default_targets() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![(
                "app",
                vec![target("10.1.0.1", "US", 1), target("10.2.0.1", "", 1)],
            )],
        );
        let specs = vec![spec];
        let generation = ZoneSynthesizer::new().synthesize(&specs, &all_up(&specs), &settings());

        // Geo preference: the US view contains exactly the US pool.
        let us_zone = &generation.files["cloud.example.com.US.zone"];
        assert_eq!(a_lines(us_zone, "app"), vec!["app\t10\tIN\tA\t10.1.0.1"]);
    }

    #[test]
    fn test_all_down_record_keeps_apex_served() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![("app", vec![target("10.0.0.1", "", 1)])],
        );
        let specs = vec![spec];
        let health = snapshot_with_down(&specs, &[("app", 0, 0)]);

        let generation = ZoneSynthesizer::new().synthesize(&specs, &health, &settings());
        let default_zone = &generation.files["cloud.example.com.default.zone"];

        // NXRRSET for the record, but SOA, NS and glue stay.
        assert!(a_lines(default_zone, "app").is_empty());
        assert!(default_zone.contains("IN\tSOA\tns1.cloud.example.com."));
        assert!(default_zone.contains("@\tIN\tNS\tns1.cloud.example.com."));
        assert!(default_zone.contains("ns1\t10\tIN\tA\t10.0.0.53"));
    }

    #[test]
    fn test_weight_repeats_answer_lines_in_order() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![(
                "app",
                vec![target("10.0.0.1", "", 3), target("10.0.0.2", "", 1)],
            )],
        );
        let specs = vec![spec];
        let generation = ZoneSynthesizer::new().synthesize(&specs, &all_up(&specs), &settings());

        let lines = a_lines(&generation.files["cloud.example.com.default.zone"], "app");
        assert_eq!(
            lines,
            vec![
                "app\t10\tIN\tA\t10.0.0.1",
                "app\t10\tIN\tA\t10.0.0.1",
                "app\t10\tIN\tA\t10.0.0.1",
                "app\t10\tIN\tA\t10.0.0.2",
            ]
        );
    }

    #[test]
    fn test_record_ttl_follows_interval() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![("app", vec![target("10.0.0.1", "", 1)])],
        );
        let specs = vec![spec];
        let mut five_second = settings();
        five_second.record_ttl = 5;

        let generation = ZoneSynthesizer::new().synthesize(&specs, &all_up(&specs), &five_second);
        let default_zone = &generation.files["cloud.example.com.default.zone"];
        assert!(default_zone.contains("$TTL 5\n"));
        assert!(default_zone.contains("app\t5\tIN\tA\t10.0.0.1"));
    }

    #[test]
    fn test_identical_inputs_are_byte_identical() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![("app", vec![target("10.0.0.1", "", 1)])],
        );
        let specs = vec![spec];
        let health = all_up(&specs);
        let mut synthesizer = ZoneSynthesizer::new();

        let first = synthesizer.synthesize(&specs, &health, &settings());
        let second = synthesizer.synthesize(&specs, &health, &settings());
        assert_eq!(first, second);
    }

    #[test]
    fn test_serial_advances_only_on_content_change() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![(
                "app",
                vec![target("10.0.0.1", "", 1), target("10.0.0.2", "", 1)],
            )],
        );
        let specs = vec![spec];
        let mut synthesizer = ZoneSynthesizer::new();

        let first = synthesizer.synthesize(&specs, &all_up(&specs), &settings());
        let serial_before =
            parse_soa_serial(&first.files["cloud.example.com.default.zone"]).unwrap();
        assert_eq!(serial_before, 1);

        // One target goes down: content changes, serial advances.
        let degraded = snapshot_with_down(&specs, &[("app", 0, 0)]);
        let second = synthesizer.synthesize(&specs, &degraded, &settings());
        let serial_after =
            parse_soa_serial(&second.files["cloud.example.com.default.zone"]).unwrap();
        assert_eq!(serial_after, 2);

        // Unchanged again: serial sticks.
        let third = synthesizer.synthesize(&specs, &degraded, &settings());
        assert_eq!(
            parse_soa_serial(&third.files["cloud.example.com.default.zone"]).unwrap(),
            2
        );
    }

    #[test]
    fn test_geoip_disabled_emits_default_only() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![(
                "app",
                vec![target("8.8.8.8", "XX", 1), target("10.0.0.1", "", 1)],
            )],
        );
        let specs = vec![spec];
        let mut no_geo = settings();
        no_geo.geoip_views = false;

        let generation = ZoneSynthesizer::new().synthesize(&specs, &all_up(&specs), &no_geo);
        assert!(generation.files.contains_key("cloud.example.com.default.zone"));
        assert!(generation.files.get("cloud.example.com.XX.zone").is_none());
        assert!(!generation.files["Corefile"].contains("view "));
    }

    #[test]
    fn test_corefile_routes_views_by_country() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![(
                "app",
                vec![target("8.8.8.8", "XX", 1), target("10.0.0.1", "", 1)],
            )],
        );
        let specs = vec![spec];
        let generation = ZoneSynthesizer::new().synthesize(&specs, &all_up(&specs), &settings());

        let corefile = &generation.files["Corefile"];
        assert!(corefile.contains("cloud.example.com:53 {"));
        assert!(corefile.contains("view geo-xx {"));
        assert!(corefile.contains("expr metadata('geoip/country/code') == 'XX'"));
        assert!(corefile.contains("geoip /data/GeoLite2-City.mmdb"));
        assert!(corefile
            .contains("file /etc/coredns/current/cloud.example.com.XX.zone cloud.example.com"));
        assert!(corefile.contains(
            "file /etc/coredns/current/cloud.example.com.default.zone cloud.example.com"
        ));
        // The view block must come before the default catch-all block.
        let view_at = corefile.find("view geo-xx").unwrap();
        let default_at = corefile.find("cloud.example.com.default.zone").unwrap();
        assert!(view_at < default_at);
    }

    #[test]
    fn test_empty_spec_set_emits_corefile_only() {
        let generation =
            ZoneSynthesizer::new().synthesize(&[], &HealthSnapshot::default(), &settings());
        assert_eq!(generation.len(), 1);
        assert!(generation.files.contains_key("Corefile"));
    }

    #[test]
    fn test_failed_config_keeps_previous_files() {
        let good = config(
            "app",
            "cloud.example.com",
            vec![("app", vec![target("10.0.0.1", "", 1)])],
        );
        let specs = vec![good.clone()];
        let mut synthesizer = ZoneSynthesizer::new();
        let first = synthesizer.synthesize(&specs, &all_up(&specs), &settings());
        assert!(first.files.contains_key("cloud.example.com.default.zone"));

        // Same domain, now broken (no nameservers). Built by hand: ingress
        // validation would normally reject this.
        let broken = Arc::new(ValidatedConfig {
            nameservers: Vec::new(),
            ..(*good).clone()
        });
        let broken_specs = vec![broken];
        let second = synthesizer.synthesize(&broken_specs, &all_up(&broken_specs), &settings());
        assert_eq!(
            second.files["cloud.example.com.default.zone"],
            first.files["cloud.example.com.default.zone"]
        );
    }

    #[test]
    fn test_removed_domain_drops_its_files() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![("app", vec![target("10.0.0.1", "", 1)])],
        );
        let specs = vec![spec];
        let mut synthesizer = ZoneSynthesizer::new();
        synthesizer.synthesize(&specs, &all_up(&specs), &settings());

        let generation =
            synthesizer.synthesize(&[], &HealthSnapshot::default(), &settings());
        assert_eq!(generation.len(), 1);
        assert!(generation.files.contains_key("Corefile"));
    }

    #[test]
    fn test_recover_serials_from_published_generation() {
        let spec = config(
            "app",
            "cloud.example.com",
            vec![("app", vec![target("10.0.0.1", "", 1)])],
        );
        let specs = vec![spec];
        let health = all_up(&specs);

        let mut original = ZoneSynthesizer::new();
        let published = original.synthesize(&specs, &health, &settings());

        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in &published.files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }

        // A fresh synthesizer (fresh process) recovers serials and produces
        // identical output for identical inputs.
        let mut restarted = ZoneSynthesizer::new();
        restarted.recover_serials(dir.path());
        let resynthesized = restarted.synthesize(&specs, &health, &settings());
        assert_eq!(resynthesized, published);

        // Changed inputs advance past the recovered serial.
        let degraded = snapshot_with_down(&specs, &[("app", 0, 0)]);
        let next = restarted.synthesize(&specs, &degraded, &settings());
        assert_eq!(
            parse_soa_serial(&next.files["cloud.example.com.default.zone"]).unwrap(),
            2
        );
    }

    #[test]
    fn test_parse_soa_serial() {
        assert_eq!(parse_soa_serial("\t42\t; serial\n"), Some(42));
        assert_eq!(parse_soa_serial("no serial here"), None);

        let generation = ZoneSynthesizer::new().synthesize(
            &[config(
                "app",
                "cloud.example.com",
                vec![("app", vec![target("10.0.0.1", "", 1)])],
            )],
            &HealthSnapshot::default(),
            &settings(),
        );
        assert_eq!(
            parse_soa_serial(&generation.files["cloud.example.com.default.zone"]),
            Some(1)
        );
    }

    #[test]
    fn test_generation_len() {
        let generation = Generation::default();
        assert!(generation.is_empty());
        assert_eq!(generation.len(), 0);
    }
}
