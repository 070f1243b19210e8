//! # Finalizer
//!
//! Every federation resource carries `federation.mesh.io/cleanup` so the
//! style's `remove_*` runs before the object disappears.

use crate::constants::FEDERATION_FINALIZER;
use crate::controller::resolver::ResolveError;
use crate::store::{IntentKind, MeshStore, StoreError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;

#[must_use]
pub fn has_finalizer(meta: &ObjectMeta) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == FEDERATION_FINALIZER))
}

#[must_use]
pub fn is_deleting(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some()
}

pub async fn add_finalizer(
    store: &dyn MeshStore,
    kind: IntentKind,
    meta: &ObjectMeta,
) -> Result<(), StoreError> {
    let mut finalizers = meta.finalizers.clone().unwrap_or_default();
    finalizers.push(FEDERATION_FINALIZER.to_string());
    store.patch_finalizers(kind, meta, finalizers).await?;
    debug!("Added finalizer {}", FEDERATION_FINALIZER);
    Ok(())
}

/// Drop our finalizer. An object that is already gone counts as released.
pub async fn remove_finalizer(
    store: &dyn MeshStore,
    kind: IntentKind,
    meta: &ObjectMeta,
) -> Result<(), StoreError> {
    let finalizers: Vec<String> = meta
        .finalizers
        .iter()
        .flatten()
        .filter(|name| *name != FEDERATION_FINALIZER)
        .cloned()
        .collect();
    match store.patch_finalizers(kind, meta, finalizers).await {
        Ok(()) => {
            debug!("Removed finalizer {}", FEDERATION_FINALIZER);
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Deleting an intent whose config cannot be resolved any more still releases
/// it. Its derived objects go with it through owner references.
#[must_use]
pub fn release_without_config(err: &ResolveError) -> bool {
    matches!(
        err,
        ResolveError::ConfigNotFound { .. } | ResolveError::InvalidSelector { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_finalizer() {
        let mut meta = ObjectMeta::default();
        assert!(!has_finalizer(&meta));

        meta.finalizers = Some(vec!["other.io/keep".to_string()]);
        assert!(!has_finalizer(&meta));

        meta.finalizers
            .get_or_insert_with(Vec::new)
            .push(FEDERATION_FINALIZER.to_string());
        assert!(has_finalizer(&meta));
    }

    #[test]
    fn test_release_without_config() {
        assert!(release_without_config(&ResolveError::ConfigNotFound {
            selector: "team=east".into()
        }));
        assert!(!release_without_config(&ResolveError::AmbiguousConfig {
            selector: "team=east".into(),
            matches: vec!["a/east".into(), "b/east".into()],
        }));
        assert!(!release_without_config(&ResolveError::Store(
            StoreError::Api("timeout".into())
        )));
    }
}
