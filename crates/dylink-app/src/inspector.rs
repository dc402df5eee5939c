//! Attachment status inspection
//!
//! Inspection is advisory: any failure to open the bundle or list its
//! libraries is logged and reads as "not attached".

use std::path::{Path, PathBuf};

use dylink_core::prelude::*;
use dylink_core::{AttachmentStatus, AttachmentTarget};
use dylink_patcher::{BinaryPatcher, PatcherFactory};

use crate::catalog::Catalog;

/// Libraries currently attached to `bundle`
pub async fn attached_libraries<F: PatcherFactory>(
    factory: &F,
    bundle: &Path,
) -> Result<Vec<PathBuf>> {
    let patcher = factory
        .open(bundle)
        .map_err(|e| Error::status_inspection(format!("could not open bundle: {}", e)))?;

    patcher
        .attached_libraries(bundle)
        .await
        .map_err(|e| Error::status_inspection(format!("could not list libraries: {}", e)))
}

/// Whether `target` is attached to `bundle`; never fails
pub async fn inspect_status<F: PatcherFactory>(
    factory: &F,
    bundle: &Path,
    target: &AttachmentTarget,
) -> AttachmentStatus {
    match attached_libraries(factory, bundle).await {
        Ok(libraries) => {
            let attached = libraries.iter().any(|path| target.matches(path));
            debug!(
                "{} of {} attached libraries match {}",
                usize::from(attached),
                libraries.len(),
                target
            );
            AttachmentStatus::from_attached(attached)
        }
        Err(e) => {
            warn!("Status inspection for {:?} failed: {}", bundle, e);
            AttachmentStatus::NotAttached
        }
    }
}

/// Resolve `bid` and inspect it; `None` when the app is not installed
pub async fn inspect_target<F: PatcherFactory>(
    catalog: &Catalog,
    factory: &F,
    bid: &str,
    target: &AttachmentTarget,
) -> Option<AttachmentStatus> {
    let Some(app) = catalog.resolve(bid) else {
        info!("{} is not installed; nothing to inspect", bid);
        return None;
    };
    Some(inspect_status(factory, &app.bundle_path, target).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dylink_core::Application;
    use dylink_patcher::test_utils::FakePatcherFactory;

    fn target() -> AttachmentTarget {
        AttachmentTarget::default()
    }

    #[tokio::test]
    async fn test_attached_when_final_segment_matches() {
        let factory = FakePatcherFactory::with_attached(&[
            "/Apps/Game.app/Frameworks/Other.dylib",
            "@rpath/FIle.dylib",
        ]);

        let status = inspect_status(&factory, Path::new("/Apps/Game.app"), &target()).await;
        assert_eq!(status, AttachmentStatus::Attached);
    }

    #[tokio::test]
    async fn test_name_must_match_exactly() {
        let factory = FakePatcherFactory::with_attached(&[
            "/Apps/Game.app/Frameworks/FIle.dylib.bak",
            "/Apps/Game.app/Frameworks/file.dylib",
            "/Apps/Game.app/FIle.dylib/Inner",
        ]);

        let status = inspect_status(&factory, Path::new("/Apps/Game.app"), &target()).await;
        assert_eq!(status, AttachmentStatus::NotAttached);
    }

    #[tokio::test]
    async fn test_open_failure_reads_not_attached() {
        let factory = FakePatcherFactory::with_attached(&["/x/FIle.dylib"]);
        factory.state().fail_open = Some("unsupported".to_string());

        let status = inspect_status(&factory, Path::new("/Apps/Game.app"), &target()).await;
        assert_eq!(status, AttachmentStatus::NotAttached);
    }

    #[tokio::test]
    async fn test_list_failure_reads_not_attached() {
        let factory = FakePatcherFactory::with_attached(&["/x/FIle.dylib"]);
        factory.state().fail_list = Some("corrupt load commands".to_string());

        let status = inspect_status(&factory, Path::new("/Apps/Game.app"), &target()).await;
        assert_eq!(status, AttachmentStatus::NotAttached);
    }

    #[tokio::test]
    async fn test_missing_target_never_opens_patcher() {
        let factory = FakePatcherFactory::new();
        let catalog = Catalog::new(vec![Application::new("com.example.notes", "/Apps/Notes.app")]);

        let status = inspect_target(&catalog, &factory, "com.dts.freefireth", &target()).await;
        assert!(status.is_none());
        assert_eq!(factory.open_count(), 0);
    }
}
