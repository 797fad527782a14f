//! Routing configuration synthesis.
//!
//! Turns one cycle's container inventory into backend groups and a
//! hostname → stack map.  This step is pure: everything it needs is
//! passed in, and identical input always yields identical output.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::types::{Aliases, Backend, BackendGroups, ContainerRecord, DomainMap};

/// What to do when two different stacks claim the same hostname.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// A stack's own hostname beats another stack's alias; otherwise the
    /// lower stack name wins.  Independent of inventory order.
    #[default]
    Precedence,
    /// Let the later claim in inventory order overwrite the earlier one.
    LastWins,
}

/// Inputs that stay fixed across cycles.
#[derive(Debug, Clone)]
pub struct Settings<'a> {
    pub label: &'a str,
    pub domain: &'a str,
    pub collisions: CollisionPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    pub backends: BackendGroups,
    pub domain_map: DomainMap,
}

/// A stack asking for a hostname, either its own or one of its aliases.
#[derive(Debug, Clone)]
struct Claim<'a> {
    stack: &'a str,
    own: bool,
}

impl Claim<'_> {
    fn outranks(&self, other: &Claim<'_>) -> bool {
        (self.own, std::cmp::Reverse(self.stack)) > (other.own, std::cmp::Reverse(other.stack))
    }
}

pub fn synthesize(
    containers: &[ContainerRecord],
    aliases: &Aliases,
    settings: &Settings<'_>,
) -> Synthesis {
    let mut backends = BackendGroups::default();
    let mut claims: Vec<(String, Claim<'_>)> = Vec::new();

    for container in containers {
        let Some(port) = container.labels.get(settings.label) else {
            continue;
        };

        if container.primary_ip.is_empty() {
            warn!(
                "stack_name: {} container_uuid: {} (state: {}) does not yet have an ip address, skipping this container",
                container.stack_name, container.uuid, container.state
            );
            continue;
        }

        let stack = container.stack_name.as_str();
        if !backends.0.contains_key(stack) {
            claims.push((
                format!("{}.{}", stack, settings.domain),
                Claim { stack, own: true },
            ));
            for alias in aliases.get(stack).into_iter().flatten() {
                claims.push((
                    format!("{}.{}", alias, settings.domain),
                    Claim { stack, own: false },
                ));
            }
        }

        backends.insert(
            stack,
            container.identity_key(),
            Backend {
                address: container.primary_ip.clone(),
                port: port.clone(),
            },
        );
    }

    Synthesis {
        backends,
        domain_map: resolve(claims, settings.collisions),
    }
}

fn resolve<'a>(claims: Vec<(String, Claim<'a>)>, policy: CollisionPolicy) -> DomainMap {
    let mut winners: BTreeMap<String, Claim<'a>> = BTreeMap::new();

    for (fqdn, claim) in claims {
        match winners.entry(fqdn) {
            Entry::Vacant(slot) => {
                slot.insert(claim);
            }
            Entry::Occupied(mut slot) => {
                let held = slot.get_mut();
                if held.stack == claim.stack {
                    held.own |= claim.own;
                    continue;
                }
                let replace = match policy {
                    CollisionPolicy::Precedence => claim.outranks(held),
                    CollisionPolicy::LastWins => true,
                };
                let (kept, dropped) = if replace {
                    (claim.stack, held.stack)
                } else {
                    (held.stack, claim.stack)
                };
                warn!(
                    "hostname {} is claimed by both {} and {}, keeping {}",
                    slot.key(),
                    dropped,
                    kept,
                    kept
                );
                if replace {
                    slot.insert(claim);
                }
            }
        }
    }

    DomainMap(
        winners
            .into_iter()
            .map(|(fqdn, claim)| (fqdn, claim.stack.to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::writer::ConfigFile;

    const LABEL: &str = "lb.port";

    fn settings(domain: &str) -> Settings<'_> {
        Settings {
            label: LABEL,
            domain,
            collisions: CollisionPolicy::Precedence,
        }
    }

    fn container(stack: &str, service: &str, uuid: &str, ip: &str, port: Option<&str>) -> ContainerRecord {
        ContainerRecord {
            stack_name: stack.into(),
            service_name: service.into(),
            uuid: uuid.into(),
            primary_ip: ip.into(),
            state: "running".into(),
            labels: port
                .map(|p| [(LABEL.to_string(), p.to_string())].into_iter().collect())
                .unwrap_or_default(),
        }
    }

    fn aliases(pairs: &[(&str, &[&str])]) -> Aliases {
        pairs
            .iter()
            .map(|(stack, names)| {
                (
                    stack.to_string(),
                    names.iter().map(|n| n.to_string()).collect::<BTreeSet<_>>(),
                )
            })
            .collect()
    }

    #[test]
    fn single_routable_container() {
        let out = synthesize(
            &[container("web", "api", "u1", "10.0.0.1", Some("8080"))],
            &Aliases::new(),
            &settings("svc.local"),
        );

        let mut group = BTreeMap::new();
        group.insert(
            "api-u1".to_string(),
            Backend {
                address: "10.0.0.1".into(),
                port: "8080".into(),
            },
        );
        assert_eq!(out.backends.0, BTreeMap::from([("web".to_string(), group)]));
        assert_eq!(
            out.domain_map.0,
            BTreeMap::from([("web.svc.local".to_string(), "web".to_string())])
        );
    }

    #[test]
    fn unlabelled_containers_are_ignored() {
        let out = synthesize(
            &[container("db", "postgres", "u9", "10.0.0.9", None)],
            &Aliases::new(),
            &settings("svc.local"),
        );
        assert_eq!(out, Synthesis::default());
    }

    #[test]
    fn container_without_address_is_skipped() {
        let out = synthesize(
            &[
                container("web", "api", "u1", "", Some("8080")),
                container("web", "api", "u2", "10.0.0.2", Some("8080")),
            ],
            &Aliases::new(),
            &settings("svc.local"),
        );
        assert_eq!(out.backends.0["web"].len(), 1);
        assert!(out.backends.0["web"].contains_key("api-u2"));

        let only_pending = synthesize(
            &[container("cache", "redis", "u3", "", Some("6379"))],
            &Aliases::new(),
            &settings("svc.local"),
        );
        assert!(only_pending.backends.0.is_empty());
        assert!(only_pending.domain_map.0.is_empty());
    }

    #[test]
    fn aliases_fan_out_to_the_same_stack() {
        let out = synthesize(
            &[container("foo", "app", "u1", "10.0.0.1", Some("80"))],
            &aliases(&[("foo", &["bar"])]),
            &settings("example.com"),
        );
        assert_eq!(out.domain_map.0.get("foo.example.com").map(String::as_str), Some("foo"));
        assert_eq!(out.domain_map.0.get("bar.example.com").map(String::as_str), Some("foo"));
        assert_eq!(out.backends.0.len(), 1);
    }

    #[test]
    fn aliases_of_unroutable_stacks_are_not_emitted() {
        let out = synthesize(
            &[container("foo", "app", "u1", "10.0.0.1", Some("80"))],
            &aliases(&[("other", &["ghost"])]),
            &settings("example.com"),
        );
        assert!(!out.domain_map.0.contains_key("ghost.example.com"));
    }

    #[test]
    fn replicas_share_one_group_with_distinct_keys() {
        let out = synthesize(
            &[
                container("web", "api", "u1", "10.0.0.1", Some("8080")),
                container("web", "api", "u2", "10.0.0.2", Some("8080")),
                container("web", "worker", "u3", "10.0.0.3", Some("9000")),
            ],
            &Aliases::new(),
            &settings("svc.local"),
        );
        let keys: Vec<_> = out.backends.0["web"].keys().cloned().collect();
        assert_eq!(keys, vec!["api-u1", "api-u2", "worker-u3"]);
        assert_eq!(out.domain_map.0.len(), 1);
    }

    #[test]
    fn input_order_does_not_change_output() {
        let a = container("web", "api", "u1", "10.0.0.1", Some("8080"));
        let b = container("blog", "ghost", "u2", "10.0.0.2", Some("2368"));
        let c = container("web", "api", "u3", "10.0.0.3", Some("8080"));
        let aliases = aliases(&[("blog", &["news", "journal"])]);

        let forward = synthesize(&[a.clone(), b.clone(), c.clone()], &aliases, &settings("x.io"));
        let reverse = synthesize(&[c, b, a], &aliases, &settings("x.io"));
        assert_eq!(forward, reverse);
    }

    #[test]
    fn own_hostname_beats_alias_in_either_order() {
        let alpha = container("alpha", "app", "u1", "10.0.0.1", Some("80"));
        let beta = container("beta", "app", "u2", "10.0.0.2", Some("80"));
        let aliases = aliases(&[("beta", &["alpha"])]);

        let forward = synthesize(&[alpha.clone(), beta.clone()], &aliases, &settings("example.com"));
        let reverse = synthesize(&[beta, alpha], &aliases, &settings("example.com"));

        assert_eq!(forward.domain_map.0["alpha.example.com"], "alpha");
        assert_eq!(forward.domain_map.0["beta.example.com"], "beta");
        assert_eq!(forward.domain_map.render(), reverse.domain_map.render());
    }

    #[test]
    fn shared_alias_goes_to_lower_stack_name_in_either_order() {
        let alpha = container("alpha", "app", "u1", "10.0.0.1", Some("80"));
        let beta = container("beta", "app", "u2", "10.0.0.2", Some("80"));
        let aliases = aliases(&[("alpha", &["www"]), ("beta", &["www"])]);

        let forward = synthesize(&[alpha.clone(), beta.clone()], &aliases, &settings("example.com"));
        let reverse = synthesize(&[beta, alpha], &aliases, &settings("example.com"));

        assert_eq!(forward.domain_map.0["www.example.com"], "alpha");
        assert_eq!(forward, reverse);
    }

    #[test]
    fn replicas_claim_aliases_once() {
        let replicas: Vec<_> = (0..3)
            .map(|i| container("web", "api", &format!("u{}", i), &format!("10.0.0.{}", i + 1), Some("80")))
            .collect();
        let out = synthesize(&replicas, &aliases(&[("web", &["www"])]), &settings("example.com"));
        assert_eq!(out.backends.0["web"].len(), 3);
        assert_eq!(out.domain_map.0.len(), 2);
        assert_eq!(out.domain_map.0["www.example.com"], "web");
    }

    #[test]
    fn last_claim_wins_when_configured() {
        let out = synthesize(
            &[
                container("alpha", "app", "u1", "10.0.0.1", Some("80")),
                container("beta", "app", "u2", "10.0.0.2", Some("80")),
            ],
            &aliases(&[("beta", &["alpha"])]),
            &Settings {
                collisions: CollisionPolicy::LastWins,
                ..settings("example.com")
            },
        );
        assert_eq!(out.domain_map.0["alpha.example.com"], "beta");
    }
}
