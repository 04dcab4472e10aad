//! # Watch Mapping
//!
//! Maps StatefulSet events back to the PostgresSync resources that reference
//! them, so readiness transitions re-trigger the gate without polling.

use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use kube_runtime::reflector::{ObjectRef, Store};

use crate::crd::PostgresSync;

/// Whether a PostgresSync references the given StatefulSet.
///
/// The reference is by name within the resource's own namespace.
#[must_use]
pub fn references_stateful_set(sync: &PostgresSync, sts_name: &str, sts_namespace: &str) -> bool {
    sync.spec.stateful_set_ref.name == sts_name
        && sync.metadata.namespace.as_deref() == Some(sts_namespace)
}

/// Resolve the PostgresSync resources affected by a StatefulSet event.
pub fn syncs_for_stateful_set(
    store: &Store<PostgresSync>,
    stateful_set: &StatefulSet,
) -> Vec<ObjectRef<PostgresSync>> {
    let sts_name = stateful_set.name_any();
    let Some(sts_namespace) = stateful_set.namespace() else {
        return Vec::new();
    };

    store
        .state()
        .iter()
        .filter(|sync| references_stateful_set(sync, &sts_name, &sts_namespace))
        .map(|sync| ObjectRef::from_obj(sync.as_ref()))
        .collect()
}
