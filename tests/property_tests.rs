//! Property-based tests for the validated types, the fingerprint, the
//! retry schedule, and plan ordering.

use std::collections::HashMap;
use std::time::Duration;

use proptest::prelude::*;

use berth::core::manifest;
use berth::core::types::{Fingerprint, Hostname, ServiceName};
use berth::engine::{compute_plan, RetryPolicy, StateCache};
use berth::provider::{ObservedState, ProviderKind};

fn label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,8}"
}

proptest! {
    #[test]
    fn multi_label_hostnames_validate(labels in prop::collection::vec(label(), 2..5)) {
        let host = labels.join(".");
        prop_assert!(Hostname::new(&host).is_ok());
    }

    #[test]
    fn single_label_hostnames_are_rejected(l in label()) {
        prop_assert!(Hostname::new(&l).is_err());
    }

    #[test]
    fn trailing_dots_are_rejected(labels in prop::collection::vec(label(), 2..4)) {
        let host = format!("{}.", labels.join("."));
        prop_assert!(Hostname::new(&host).is_err());
    }

    #[test]
    fn service_names_reject_leading_digits_and_trailing_dashes(l in label()) {
        prop_assert!(ServiceName::new(&l).is_ok());
        let leading_digit = format!("9{}", l);
        let trailing_dash = format!("{}-", l);
        prop_assert!(ServiceName::new(&leading_digit).is_err());
        prop_assert!(ServiceName::new(&trailing_dash).is_err());
    }

    #[test]
    fn fingerprint_part_boundaries_are_unambiguous(a in "[a-z]{1,6}", b in "[a-z]{1,6}") {
        // ["ab", "c"] must not collide with ["abc"] or ["a", "bc"].
        let joined = format!("{}{}", a, b);
        let split = Fingerprint::compute([a.as_str(), b.as_str()]);
        let whole = Fingerprint::compute([joined.as_str()]);
        prop_assert_ne!(split, whole);
    }

    #[test]
    fn fingerprints_are_deterministic(parts in prop::collection::vec("[ -~]{0,12}", 0..5)) {
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        prop_assert_eq!(
            Fingerprint::compute(refs.iter().copied()),
            Fingerprint::compute(refs.iter().copied())
        );
    }

    #[test]
    fn backoff_never_shrinks_and_never_exceeds_cap(
        base_ms in 1u64..2_000,
        cap_ms in 1u64..60_000,
        retries in 1u32..40,
    ) {
        let policy = RetryPolicy {
            max_retries: retries,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(cap_ms),
        };
        let mut previous = Duration::ZERO;
        for retry in 1..=retries {
            let delay = policy.delay_for(retry);
            prop_assert!(delay >= previous);
            prop_assert!(delay <= policy.max_delay);
            previous = delay;
        }
    }

    #[test]
    fn duplicate_hostnames_never_validate(l in label()) {
        let text = format!(
            r#"
            [project]
            name = "acme"

            [[service]]
            name = "frontend"
            provider = "pages"
            site = "frontend"

            [[binding]]
            hostname = "{l}.example.com"
            service = "frontend"

            [[binding]]
            hostname = "{l}.example.com"
            service = "frontend"
            "#,
        );
        prop_assert!(matches!(
            manifest::parse(&text),
            Err(manifest::ManifestError::DuplicateHostname(_))
        ));
    }

    #[test]
    fn plans_are_dependency_ordered_dags(names in prop::collection::vec(label(), 1..5)) {
        let mut text = String::from("[project]\nname = \"acme\"\n");
        for (i, name) in names.iter().enumerate() {
            text.push_str(&format!(
                "\n[[service]]\nname = \"{name}{i}\"\nprovider = \"containers\"\n\
                 image = \"registry.example.com/acme/{name}{i}:1\"\n"
            ));
            text.push_str(&format!(
                "\n[[binding]]\nhostname = \"{name}{i}.example.com\"\n\
                 service = \"{name}{i}\"\ncertificate = true\n"
            ));
        }
        let manifest = manifest::parse(&text).unwrap();

        let cache = StateCache::from_states([
            (ProviderKind::Dns, ObservedState::default()),
            (
                ProviderKind::Containers,
                ObservedState {
                    endpoint: Some("run.host.invalid".into()),
                    ..ObservedState::default()
                },
            ),
        ]);
        let plan = compute_plan(&manifest, &cache).unwrap();

        // Every dependency is in the plan and ordered before its dependent.
        let index: HashMap<_, _> = plan
            .operations
            .iter()
            .enumerate()
            .map(|(i, op)| (op.id.clone(), i))
            .collect();
        for op in &plan.operations {
            for dep in &op.depends_on {
                let dep_index = index.get(dep);
                prop_assert!(dep_index.is_some(), "{} depends on missing {}", op.id, dep);
                prop_assert!(dep_index.unwrap() < &index[&op.id]);
            }
        }
        prop_assert!(plan.graph().topo_order().is_some());
    }
}
