//! engine::plan
//!
//! Deterministic plan generation.
//!
//! # Architecture
//!
//! The plan is the sole intermediate representation between the validated
//! manifest and provider mutation.
//!
//! Plans are:
//! - **Deterministic**: the same manifest diff always produces the same
//!   operations in the same order
//! - **Previewable**: `berth plan` shows exactly what `apply` would do
//! - **Minimal**: converged parts of the world produce no operations
//! - **A DAG**: dependency edges only point at operations in the plan
//!
//! # Invariants
//!
//! - The planner performs no I/O and mutates nothing
//! - Dependency edges follow the deploy -> bind/route -> certificate chain;
//!   DNS record upserts are independent roots
//! - Removals delete the DNS record before unbinding the domain
//!
//! # Diff rules
//!
//! - A container service is converged when the observed deploy fingerprint
//!   equals the desired one; anything else (missing service, missing
//!   fingerprint, drift) emits a deploy.
//! - A DNS record is converged when a record of the declared type exists
//!   with the routing provider's endpoint as its value.
//! - A binding is converged when the routing provider maps the hostname to
//!   the declared service.
//! - A certificate is converged when Active; Pending is left alone
//!   (issuance is in flight, re-requesting adds nothing), missing or
//!   Failed emits an issue operation.
//! - A binding observed on a manifest-managed service whose hostname is no
//!   longer declared is removed, record first.
//! - A declared hostname that moved to a different provider, or whose
//!   record type changed, has the superseded binding/record removed once
//!   the replacement is in place.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::observe::StateCache;
use crate::core::graph::OpGraph;
use crate::core::manifest::{
    Artifact, DomainBinding, Manifest, RecordType, RouteVia, ScalingBounds, ServiceManifest,
    ServiceTarget,
};
use crate::core::types::{Fingerprint, Hostname, ImageRef, OpId, ServiceName};
use crate::provider::{CertStatus, ProviderKind};

/// Errors from plan computation.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A routing provider reported no endpoint to point DNS records at.
    #[error("{kind} provider reported no endpoint for DNS records")]
    MissingEndpoint { kind: ProviderKind },

    /// The emitted operations formed a cycle. This is a planner bug.
    #[error("operation dependencies form a cycle")]
    Cycle,
}

/// One idempotent unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "snake_case")]
pub enum OpKind {
    /// Create or update a DNS record.
    UpsertRecord {
        name: Hostname,
        record_type: RecordType,
        value: String,
    },
    /// Remove a DNS record.
    DeleteRecord {
        name: Hostname,
        record_type: RecordType,
    },
    /// Deploy a container image.
    DeployContainer {
        service: ServiceName,
        image: ImageRef,
        scaling: ScalingBounds,
    },
    /// Bind a hostname on the serving platform.
    BindDomain {
        hostname: Hostname,
        service: ServiceName,
    },
    /// Remove a hostname binding.
    UnbindDomain { hostname: Hostname },
    /// Request managed certificates.
    IssueCertificate { hostnames: Vec<Hostname> },
    /// Upsert a load-balancer host rule.
    RouteHost {
        hostname: Hostname,
        backend: ServiceName,
    },
}

impl OpKind {
    /// One-line human description for plan output and run reports.
    pub fn describe(&self) -> String {
        match self {
            OpKind::UpsertRecord {
                name,
                record_type,
                value,
            } => format!("upsert {} record {} -> {}", record_type, name, value),
            OpKind::DeleteRecord { name, record_type } => {
                format!("delete {} record {}", record_type, name)
            }
            OpKind::DeployContainer { service, image, .. } => {
                format!("deploy {} from {}", service, image)
            }
            OpKind::BindDomain { hostname, service } => {
                format!("bind {} -> {}", hostname, service)
            }
            OpKind::UnbindDomain { hostname } => format!("unbind {}", hostname),
            OpKind::IssueCertificate { hostnames } => {
                let names: Vec<&str> = hostnames.iter().map(|h| h.as_str()).collect();
                format!("issue certificate for {}", names.join(", "))
            }
            OpKind::RouteHost { hostname, backend } => {
                format!("route {} -> {}", hostname, backend)
            }
        }
    }
}

/// A planned operation with its dependency edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Deterministic slug identifying this operation.
    pub id: OpId,
    /// Which provider executes it.
    pub provider: ProviderKind,
    /// The verb and its parameters.
    pub kind: OpKind,
    /// Desired-state fingerprint of the parameters.
    pub fingerprint: Fingerprint,
    /// Operations that must succeed first.
    pub depends_on: Vec<OpId>,
}

/// A dependency-ordered operation plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Operations in deterministic topological order.
    pub operations: Vec<Operation>,
}

impl Plan {
    /// True when the manifest is already converged.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of planned operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Look up an operation by id.
    pub fn get(&self, id: &OpId) -> Option<&Operation> {
        self.operations.iter().find(|op| &op.id == id)
    }

    /// Build the dependency graph over this plan's operations.
    pub fn graph(&self) -> OpGraph {
        let mut graph = OpGraph::new();
        for op in &self.operations {
            graph.add_node(op.id.clone());
            for dep in &op.depends_on {
                graph.add_edge(op.id.clone(), dep.clone());
            }
        }
        graph
    }
}

/// The deploy fingerprint covers everything a redeploy should react to.
fn deploy_fingerprint(service: &ServiceManifest, image: &ImageRef, scaling: &ScalingBounds) -> Fingerprint {
    let min = scaling.min_instances.to_string();
    let max = scaling.max_instances.to_string();
    let concurrency = scaling.concurrency.to_string();
    let health = service
        .health
        .as_ref()
        .map(|h| format!("{}:{}", h.path, h.timeout_secs))
        .unwrap_or_default();
    Fingerprint::compute([
        service.name.as_str(),
        image.as_str(),
        &min,
        &max,
        &concurrency,
        &health,
    ])
}

/// Which provider kind serves a binding's traffic.
fn routing_kind(binding: &DomainBinding, service: &ServiceManifest) -> ProviderKind {
    match binding.via {
        RouteVia::LoadBalancer => ProviderKind::LoadBalancer,
        RouteVia::Direct => match service.target {
            ServiceTarget::Pages => ProviderKind::Pages,
            ServiceTarget::Containers => ProviderKind::Containers,
        },
    }
}

/// Compute the minimal operation plan moving observed state to the manifest.
///
/// Pure: reads only the manifest and the cache.
pub fn compute_plan(manifest: &Manifest, cache: &StateCache) -> Result<Plan, PlanError> {
    let mut operations: Vec<Operation> = Vec::new();
    let mut deploy_ids: HashMap<ServiceName, OpId> = HashMap::new();
    let managed_services: HashSet<&ServiceName> =
        manifest.services.iter().map(|s| &s.name).collect();

    // Container deploys, in manifest order.
    for service in &manifest.services {
        if service.target != ServiceTarget::Containers {
            continue;
        }
        let Artifact::Image(image) = &service.artifact else {
            continue;
        };
        let scaling = service.scaling.unwrap_or_default();
        let desired = deploy_fingerprint(service, image, &scaling);
        let observed = cache
            .state(ProviderKind::Containers)
            .service(&service.name)
            .and_then(|s| s.fingerprint.clone());
        if observed.as_ref() == Some(&desired) {
            continue;
        }
        let id = OpId::new(format!("deploy/{}", service.name));
        deploy_ids.insert(service.name.clone(), id.clone());
        operations.push(Operation {
            id,
            provider: ProviderKind::Containers,
            kind: OpKind::DeployContainer {
                service: service.name.clone(),
                image: image.clone(),
                scaling,
            },
            fingerprint: desired,
            depends_on: Vec::new(),
        });
    }

    // Records, bindings, and certificates, in manifest order.
    for binding in &manifest.bindings {
        let service = manifest
            .service(&binding.service)
            .expect("binding target validated against services");
        let route = routing_kind(binding, service);
        let endpoint = cache
            .state(route)
            .endpoint
            .clone()
            .ok_or(PlanError::MissingEndpoint { kind: route })?;

        // DNS record: an independent root of the DAG.
        let record_converged = cache
            .state(ProviderKind::Dns)
            .record(&binding.hostname, binding.record)
            .is_some_and(|r| r.value == endpoint);
        let mut record_op_id = None;
        if !record_converged {
            let id = OpId::new(format!(
                "record/{}/{}",
                binding.hostname,
                binding.record.as_str()
            ));
            record_op_id = Some(id.clone());
            operations.push(Operation {
                id,
                provider: ProviderKind::Dns,
                kind: OpKind::UpsertRecord {
                    name: binding.hostname.clone(),
                    record_type: binding.record,
                    value: endpoint.clone(),
                },
                fingerprint: Fingerprint::compute([
                    "record",
                    binding.hostname.as_str(),
                    binding.record.as_str(),
                    &endpoint,
                ]),
                depends_on: Vec::new(),
            });
        }

        // Domain binding or load-balancer host rule.
        let bound = cache
            .state(route)
            .binding(&binding.hostname)
            .is_some_and(|b| b.service == binding.service);
        let mut bind_op_id = None;
        if !bound {
            let mut depends_on = Vec::new();
            if let Some(deploy_id) = deploy_ids.get(&binding.service) {
                depends_on.push(deploy_id.clone());
            }
            let (id, kind) = match route {
                ProviderKind::LoadBalancer => (
                    OpId::new(format!("route/{}", binding.hostname)),
                    OpKind::RouteHost {
                        hostname: binding.hostname.clone(),
                        backend: binding.service.clone(),
                    },
                ),
                _ => (
                    OpId::new(format!("bind/{}", binding.hostname)),
                    OpKind::BindDomain {
                        hostname: binding.hostname.clone(),
                        service: binding.service.clone(),
                    },
                ),
            };
            bind_op_id = Some(id.clone());
            operations.push(Operation {
                id,
                provider: route,
                kind,
                fingerprint: Fingerprint::compute([
                    "bind",
                    binding.hostname.as_str(),
                    binding.service.as_str(),
                ]),
                depends_on,
            });
        }

        // Managed certificate.
        if binding.certificate {
            let needs_issue = match cache
                .state(route)
                .certificate(&binding.hostname)
                .map(|c| &c.status)
            {
                Some(CertStatus::Active) | Some(CertStatus::Pending) => false,
                Some(CertStatus::Failed { .. }) | None => true,
            };
            if needs_issue {
                let depends_on = bind_op_id.iter().cloned().collect();
                operations.push(Operation {
                    id: OpId::new(format!("cert/{}", binding.hostname)),
                    provider: route,
                    kind: OpKind::IssueCertificate {
                        hostnames: vec![binding.hostname.clone()],
                    },
                    fingerprint: Fingerprint::compute(["cert", binding.hostname.as_str()]),
                    depends_on,
                });
            }
        }

        // Superseded entries: the hostname stays declared but moved to a
        // different provider or record type. The leftover is removed only
        // after the replacement is in place.
        for kind in [
            ProviderKind::Pages,
            ProviderKind::Containers,
            ProviderKind::LoadBalancer,
        ] {
            if kind == route {
                continue;
            }
            let superseded = cache
                .state(kind)
                .binding(&binding.hostname)
                .is_some_and(|b| managed_services.contains(&b.service));
            if superseded {
                operations.push(Operation {
                    id: OpId::new(format!("unbind/{}/{}", kind, binding.hostname)),
                    provider: kind,
                    kind: OpKind::UnbindDomain {
                        hostname: binding.hostname.clone(),
                    },
                    fingerprint: Fingerprint::compute([
                        "unbind",
                        kind.name(),
                        binding.hostname.as_str(),
                    ]),
                    depends_on: bind_op_id.iter().cloned().collect(),
                });
            }
        }
        for record in &cache.state(ProviderKind::Dns).records {
            if record.name != binding.hostname || record.record_type == binding.record {
                continue;
            }
            operations.push(Operation {
                id: OpId::new(format!(
                    "delete-record/{}/{}",
                    binding.hostname,
                    record.record_type.as_str()
                )),
                provider: ProviderKind::Dns,
                kind: OpKind::DeleteRecord {
                    name: binding.hostname.clone(),
                    record_type: record.record_type,
                },
                fingerprint: Fingerprint::compute([
                    "delete-record",
                    binding.hostname.as_str(),
                    record.record_type.as_str(),
                ]),
                depends_on: record_op_id.iter().cloned().collect(),
            });
        }
    }

    // Removals: bindings on manifest-managed services whose hostname is no
    // longer declared. Unmanaged entries are never touched.
    let declared_hosts: HashSet<&Hostname> =
        manifest.bindings.iter().map(|b| &b.hostname).collect();

    let mut stale: Vec<(ProviderKind, Hostname)> = Vec::new();
    for kind in [
        ProviderKind::Pages,
        ProviderKind::Containers,
        ProviderKind::LoadBalancer,
    ] {
        for observed in &cache.state(kind).bindings {
            if managed_services.contains(&observed.service)
                && !declared_hosts.contains(&observed.hostname)
            {
                stale.push((kind, observed.hostname.clone()));
            }
        }
    }
    // Observed order is provider-defined; sort for determinism.
    stale.sort_by(|a, b| (a.1.as_str(), a.0.name()).cmp(&(b.1.as_str(), b.0.name())));

    for (kind, hostname) in stale {
        // Stop publishing the name before tearing the binding down.
        let record_dep = cache
            .state(ProviderKind::Dns)
            .records
            .iter()
            .find(|r| r.name == hostname)
            .map(|record| {
                let id = OpId::new(format!(
                    "delete-record/{}/{}",
                    hostname,
                    record.record_type.as_str()
                ));
                if operations.iter().all(|op| op.id != id) {
                    operations.push(Operation {
                        id: id.clone(),
                        provider: ProviderKind::Dns,
                        kind: OpKind::DeleteRecord {
                            name: hostname.clone(),
                            record_type: record.record_type,
                        },
                        fingerprint: Fingerprint::compute([
                            "delete-record",
                            hostname.as_str(),
                            record.record_type.as_str(),
                        ]),
                        depends_on: Vec::new(),
                    });
                }
                id
            });

        operations.push(Operation {
            id: OpId::new(format!("unbind/{}/{}", kind, hostname)),
            provider: kind,
            kind: OpKind::UnbindDomain {
                hostname: hostname.clone(),
            },
            fingerprint: Fingerprint::compute(["unbind", kind.name(), hostname.as_str()]),
            depends_on: record_dep.into_iter().collect(),
        });
    }

    // Order deterministically and assert the DAG invariant.
    let mut plan = Plan { operations };
    let order = plan.graph().topo_order().ok_or(PlanError::Cycle)?;
    let index: HashMap<&OpId, usize> = order.iter().enumerate().map(|(i, id)| (id, i)).collect();
    plan.operations.sort_by_key(|op| index[&op.id]);
    Ok(plan)
}
